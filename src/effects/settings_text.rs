//! Text form of effect settings.
//!
//! Every settings record prints as `Name;key=value;...` and parses back from
//! the same form, e.g. `BassBoost;strength=500` or
//! `Equalizer;curPreset=-1;numBands=2;band1Level=0;band2Level=300`.

use std::fmt;
use std::str::FromStr;

use crate::effects::kinds::{
    BassBoostSettings, EnvironmentalReverbSettings, EqualizerSettings, LoudnessEnhancerSettings,
    PreAmpSettings, PresetReverbSettings, ReverbPreset, SettingsRecord, VirtualizerSettings,
};
use crate::error::EffectError;

fn invalid(reason: String) -> EffectError {
    EffectError::InvalidArgument { reason }
}

/// Cursor over the `key=value` pairs following a settings header.
struct Fields<'a> {
    name: &'static str,
    pairs: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    fn open(input: &'a str, name: &'static str) -> Result<Self, EffectError> {
        let mut pairs = input.split(';');
        match pairs.next() {
            Some(header) if header == name => Ok(Self { name, pairs }),
            _ => Err(invalid(format!("invalid settings for {}: {}", name, input))),
        }
    }

    fn take<T: FromStr>(&mut self, key: &str) -> Result<T, EffectError> {
        let pair = self
            .pairs
            .next()
            .ok_or_else(|| invalid(format!("{}: missing {}", self.name, key)))?;
        let (found, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("{}: malformed pair {:?}", self.name, pair)))?;
        if found != key {
            return Err(invalid(format!("{}: invalid key name {}", self.name, found)));
        }
        value
            .parse()
            .map_err(|_| invalid(format!("{}: invalid value for key {}", self.name, key)))
    }

    fn finish(mut self) -> Result<(), EffectError> {
        match self.pairs.next() {
            None => Ok(()),
            Some(extra) => Err(invalid(format!("{}: unexpected {:?}", self.name, extra))),
        }
    }
}

impl fmt::Display for BassBoostSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BassBoost;strength={}", self.strength)
    }
}

impl FromStr for BassBoostSettings {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::open(s, "BassBoost")?;
        let strength = fields.take("strength")?;
        fields.finish()?;
        Ok(Self { strength })
    }
}

impl fmt::Display for VirtualizerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Virtualizer;strength={}", self.strength)
    }
}

impl FromStr for VirtualizerSettings {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::open(s, "Virtualizer")?;
        let strength = fields.take("strength")?;
        fields.finish()?;
        Ok(Self { strength })
    }
}

impl fmt::Display for EqualizerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Equalizer;curPreset={};numBands={}",
            self.current_preset,
            self.band_levels.len()
        )?;
        for (index, level) in self.band_levels.iter().enumerate() {
            write!(f, ";band{}Level={}", index + 1, level)?;
        }
        Ok(())
    }
}

impl FromStr for EqualizerSettings {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::open(s, "Equalizer")?;
        let current_preset = fields.take("curPreset")?;
        let bands: u16 = fields.take("numBands")?;
        let band_levels = (1..=bands)
            .map(|band| fields.take(&format!("band{}Level", band)))
            .collect::<Result<Vec<i16>, _>>()?;
        fields.finish()?;
        Ok(Self {
            current_preset,
            band_levels,
        })
    }
}

impl fmt::Display for PresetReverbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PresetReverb;preset={}", self.preset.raw())
    }
}

impl FromStr for PresetReverbSettings {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::open(s, "PresetReverb")?;
        let raw: i16 = fields.take("preset")?;
        fields.finish()?;
        let preset = ReverbPreset::from_raw(raw)
            .ok_or_else(|| invalid(format!("PresetReverb: unknown preset {}", raw)))?;
        Ok(Self { preset })
    }
}

impl fmt::Display for EnvironmentalReverbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EnvironmentalReverb;roomLevel={};roomHFLevel={};decayTime={};decayHFRatio={};\
             reflectionsLevel={};reflectionsDelay={};reverbLevel={};reverbDelay={};\
             diffusion={};density={}",
            self.room_level,
            self.room_hf_level,
            self.decay_time,
            self.decay_hf_ratio,
            self.reflections_level,
            self.reflections_delay,
            self.reverb_level,
            self.reverb_delay,
            self.diffusion,
            self.density
        )
    }
}

impl FromStr for EnvironmentalReverbSettings {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::open(s, "EnvironmentalReverb")?;
        let settings = Self {
            room_level: fields.take("roomLevel")?,
            room_hf_level: fields.take("roomHFLevel")?,
            decay_time: fields.take("decayTime")?,
            decay_hf_ratio: fields.take("decayHFRatio")?,
            reflections_level: fields.take("reflectionsLevel")?,
            reflections_delay: fields.take("reflectionsDelay")?,
            reverb_level: fields.take("reverbLevel")?,
            reverb_delay: fields.take("reverbDelay")?,
            diffusion: fields.take("diffusion")?,
            density: fields.take("density")?,
        };
        fields.finish()?;
        Ok(settings)
    }
}

impl fmt::Display for LoudnessEnhancerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoudnessEnhancer;targetGainmB={}", self.target_gain_mb)
    }
}

impl FromStr for LoudnessEnhancerSettings {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::open(s, "LoudnessEnhancer")?;
        let target_gain_mb = fields.take("targetGainmB")?;
        fields.finish()?;
        Ok(Self { target_gain_mb })
    }
}

impl fmt::Display for PreAmpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug keeps the fractional part of whole values: "1.0", not "1"
        write!(f, "PreAmp;level={:?}", self.level)
    }
}

impl FromStr for PreAmpSettings {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::open(s, "PreAmp")?;
        let level = fields.take("level")?;
        fields.finish()?;
        Ok(Self { level })
    }
}

impl fmt::Display for SettingsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsRecord::BassBoost(settings) => fmt::Display::fmt(settings, f),
            SettingsRecord::Virtualizer(settings) => fmt::Display::fmt(settings, f),
            SettingsRecord::Equalizer(settings) => fmt::Display::fmt(settings, f),
            SettingsRecord::PresetReverb(settings) => fmt::Display::fmt(settings, f),
            SettingsRecord::EnvironmentalReverb(settings) => fmt::Display::fmt(settings, f),
            SettingsRecord::LoudnessEnhancer(settings) => fmt::Display::fmt(settings, f),
            SettingsRecord::PreAmp(settings) => fmt::Display::fmt(settings, f),
        }
    }
}

impl FromStr for SettingsRecord {
    type Err = EffectError;

    /// Dispatch on the leading effect name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.split(';').next().unwrap_or_default();
        match name {
            "BassBoost" => s.parse().map(SettingsRecord::BassBoost),
            "Virtualizer" => s.parse().map(SettingsRecord::Virtualizer),
            "Equalizer" => s.parse().map(SettingsRecord::Equalizer),
            "PresetReverb" => s.parse().map(SettingsRecord::PresetReverb),
            "EnvironmentalReverb" => s.parse().map(SettingsRecord::EnvironmentalReverb),
            "LoudnessEnhancer" => s.parse().map(SettingsRecord::LoudnessEnhancer),
            "PreAmp" => s.parse().map(SettingsRecord::PreAmp),
            other => Err(invalid(format!("unknown effect settings {:?}", other))),
        }
    }
}
