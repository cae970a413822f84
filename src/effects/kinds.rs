//! Effect categories and their typed settings records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::effects::band_corrector::{Band, BandRangeCorrector, BandTable};
use crate::error::EffectError;

/// Effect categories an [`EffectSession`](crate::effects::EffectSession) can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCategory {
    BassBoost,
    Virtualizer,
    Equalizer,
    PresetReverb,
    EnvironmentalReverb,
    LoudnessEnhancer,
    PreAmp,
}

impl EffectCategory {
    pub const ALL: [EffectCategory; 7] = [
        EffectCategory::BassBoost,
        EffectCategory::Virtualizer,
        EffectCategory::Equalizer,
        EffectCategory::PresetReverb,
        EffectCategory::EnvironmentalReverb,
        EffectCategory::LoudnessEnhancer,
        EffectCategory::PreAmp,
    ];
}

/// Strength bounds shared by bass boost and virtualizer.
pub const MIN_STRENGTH: i16 = 0;
pub const MAX_STRENGTH: i16 = 1000;

/// Equalizer preset index meaning "custom band levels".
pub const PRESET_UNDEFINED: i16 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BassBoostSettings {
    pub strength: i16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualizerSettings {
    pub strength: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualizerSettings {
    pub current_preset: i16,
    pub band_levels: Vec<i16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverbPreset {
    #[default]
    None,
    SmallRoom,
    MediumRoom,
    LargeRoom,
    MediumHall,
    LargeHall,
    Plate,
}

impl ReverbPreset {
    pub const ALL: [ReverbPreset; 7] = [
        ReverbPreset::None,
        ReverbPreset::SmallRoom,
        ReverbPreset::MediumRoom,
        ReverbPreset::LargeRoom,
        ReverbPreset::MediumHall,
        ReverbPreset::LargeHall,
        ReverbPreset::Plate,
    ];

    /// Platform preset number.
    pub fn raw(self) -> i16 {
        self as i16
    }

    pub fn from_raw(raw: i16) -> Option<Self> {
        Self::ALL.get(usize::try_from(raw).ok()?).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetReverbSettings {
    pub preset: ReverbPreset,
}

/// Parameter bounds of the environmental reverb engine.
///
/// Reflections and reverb delay are fixed at zero by the engine.
pub mod reverb_limits {
    pub const ROOM_LEVEL: (i16, i16) = (-9000, 0);
    pub const ROOM_HF_LEVEL: (i16, i16) = (-9000, 0);
    pub const DECAY_TIME: (i32, i32) = (100, 7000);
    pub const DECAY_HF_RATIO: (i16, i16) = (100, 2000);
    pub const REFLECTIONS_LEVEL: (i16, i16) = (0, 0);
    pub const REFLECTIONS_DELAY: (i32, i32) = (0, 0);
    pub const REVERB_LEVEL: (i16, i16) = (-9000, 2000);
    pub const REVERB_DELAY: (i32, i32) = (0, 0);
    pub const DIFFUSION: (i16, i16) = (0, 1000);
    pub const DENSITY: (i16, i16) = (0, 1000);
}

/// I3DL2 reverb parameters. Levels in millibels, times in milliseconds,
/// ratio, diffusion and density in permille.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentalReverbSettings {
    pub room_level: i16,
    pub room_hf_level: i16,
    pub decay_time: i32,
    pub decay_hf_ratio: i16,
    pub reflections_level: i16,
    pub reflections_delay: i32,
    pub reverb_level: i16,
    pub reverb_delay: i32,
    pub diffusion: i16,
    pub density: i16,
}

impl Default for EnvironmentalReverbSettings {
    fn default() -> Self {
        EnvironmentalReverbPreset::Default.settings()
    }
}

impl EnvironmentalReverbSettings {
    /// Build from raw I3DL2 values, clipped to what the engine accepts.
    pub fn clipped(values: [i32; 10]) -> Self {
        use reverb_limits::*;

        fn short(value: i32, (min, max): (i16, i16)) -> i16 {
            value.clamp(i32::from(min), i32::from(max)) as i16
        }

        Self {
            room_level: short(values[0], ROOM_LEVEL),
            room_hf_level: short(values[1], ROOM_HF_LEVEL),
            decay_time: values[2].clamp(DECAY_TIME.0, DECAY_TIME.1),
            decay_hf_ratio: short(values[3], DECAY_HF_RATIO),
            reflections_level: short(values[4], REFLECTIONS_LEVEL),
            reflections_delay: values[5].clamp(REFLECTIONS_DELAY.0, REFLECTIONS_DELAY.1),
            reverb_level: short(values[6], REVERB_LEVEL),
            reverb_delay: values[7].clamp(REVERB_DELAY.0, REVERB_DELAY.1),
            diffusion: short(values[8], DIFFUSION),
            density: short(values[9], DENSITY),
        }
    }
}

/// Standard I3DL2 environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentalReverbPreset {
    Default,
    Generic,
    PaddedCell,
    Room,
    Bathroom,
    LivingRoom,
    StoneRoom,
    Auditorium,
    ConcertHall,
    Cave,
    Arena,
    Hangar,
    CarpetedHallway,
    Hallway,
    StoneCorridor,
    Alley,
    Forest,
    City,
    Mountains,
    Quarry,
    Plain,
    ParkingLot,
    SewerPipe,
    Underwater,
    SmallRoom,
    MediumRoom,
    LargeRoom,
    MediumHall,
    LargeHall,
    Plate,
}

impl EnvironmentalReverbPreset {
    pub fn settings(self) -> EnvironmentalReverbSettings {
        use EnvironmentalReverbPreset::*;

        let values = match self {
            Default => [-32768, 0, 1000, 500, -32768, 20, -32768, 40, 1000, 1000],
            Generic => [-1000, -100, 1490, 830, -2602, 7, 200, 11, 1000, 1000],
            PaddedCell => [-1000, -6000, 170, 100, -1204, 1, 207, 2, 1000, 1000],
            Room => [-1000, -454, 400, 830, -1646, 2, 53, 3, 1000, 1000],
            Bathroom => [-1000, -1200, 1490, 540, -370, 7, 1030, 11, 1000, 600],
            LivingRoom => [-1000, -6000, 500, 100, -1376, 3, -1104, 4, 1000, 1000],
            StoneRoom => [-1000, -300, 2310, 640, -711, 12, 83, 17, 1000, 1000],
            Auditorium => [-1000, -476, 4320, 590, -789, 20, -289, 30, 1000, 1000],
            ConcertHall => [-1000, -500, 3920, 700, -1230, 20, -2, 29, 1000, 1000],
            Cave => [-1000, 0, 2910, 1300, -602, 15, -302, 22, 1000, 1000],
            Arena => [-1000, -698, 7240, 330, -1166, 20, 16, 30, 1000, 1000],
            Hangar => [-1000, -1000, 10050, 230, -602, 20, 198, 30, 1000, 1000],
            CarpetedHallway => [-1000, -4000, 300, 100, -1831, 2, -1630, 30, 1000, 1000],
            Hallway => [-1000, -300, 1490, 590, -1219, 7, 441, 11, 1000, 1000],
            StoneCorridor => [-1000, -237, 2700, 790, -1214, 13, 395, 20, 1000, 1000],
            Alley => [-1000, -270, 1490, 860, -1204, 7, -4, 11, 1000, 1000],
            Forest => [-1000, -3300, 1490, 540, -2560, 162, -613, 88, 790, 1000],
            City => [-1000, -800, 1490, 670, -2273, 7, -2217, 11, 500, 1000],
            Mountains => [-1000, -2500, 1490, 210, -2780, 300, -2014, 100, 270, 1000],
            Quarry => [-1000, -1000, 1490, 830, -32768, 61, 500, 25, 1000, 1000],
            Plain => [-1000, -2000, 1490, 500, -2466, 179, -2514, 100, 210, 1000],
            ParkingLot => [-1000, 0, 1650, 1500, -1363, 8, -1153, 12, 1000, 1000],
            SewerPipe => [-1000, -1000, 2810, 140, 429, 14, 648, 21, 800, 600],
            Underwater => [-1000, -4000, 1490, 100, -449, 7, 1700, 11, 1000, 1000],
            SmallRoom => [-1000, -600, 1100, 830, -400, 5, 500, 10, 1000, 1000],
            MediumRoom => [-1000, -600, 1300, 830, -1000, 20, -200, 20, 1000, 1000],
            LargeRoom => [-1000, -600, 1500, 830, -1600, 5, -1000, 40, 1000, 1000],
            MediumHall => [-1000, -600, 1800, 700, -1300, 15, -800, 30, 1000, 1000],
            LargeHall => [-1000, -600, 1800, 700, -2000, 30, -1400, 60, 1000, 1000],
            Plate => [-1000, -200, 1300, 900, 0, 2, 0, 10, 1000, 750],
        };
        EnvironmentalReverbSettings::clipped(values)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoudnessEnhancerSettings {
    /// Target gain in millibels.
    pub target_gain_mb: i32,
}

/// Pre-amplifier gain bounds, as a linear factor.
pub const PREAMP_LEVEL_RANGE: (f32, f32) = (0.0, 2.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreAmpSettings {
    pub level: f32,
}

impl Default for PreAmpSettings {
    fn default() -> Self {
        Self { level: 1.0 }
    }
}

/// Settings of any category, as stored in a control ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "settings", rename_all = "snake_case")]
pub enum SettingsRecord {
    BassBoost(BassBoostSettings),
    Virtualizer(VirtualizerSettings),
    Equalizer(EqualizerSettings),
    PresetReverb(PresetReverbSettings),
    EnvironmentalReverb(EnvironmentalReverbSettings),
    LoudnessEnhancer(LoudnessEnhancerSettings),
    PreAmp(PreAmpSettings),
}

/// A named equalizer preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualizerPreset {
    pub name: String,
    pub band_levels: Vec<i16>,
}

impl EqualizerPreset {
    fn new(name: &str, band_levels: [i16; 5]) -> Self {
        Self {
            name: name.to_string(),
            band_levels: band_levels.to_vec(),
        }
    }
}

/// Equalizer capabilities reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualizerProfile {
    pub bands: BandTable,
    /// Band level bounds in millibels.
    pub level_range: (i16, i16),
    pub presets: Vec<EqualizerPreset>,
}

impl Default for EqualizerProfile {
    /// Five-band layout of the stock platform equalizer with its ten presets.
    ///
    /// The last band is reported with the defective upper bound that the
    /// corrector repairs.
    fn default() -> Self {
        Self {
            bands: BandTable::new(vec![
                Band::new(60_000, 30_000, 120_000),
                Band::new(230_000, 120_001, 460_000),
                Band::new(910_000, 460_001, 1_800_000),
                Band::new(3_600_000, 1_800_001, 7_000_000),
                Band::new(14_000_000, 7_000_001, 1),
            ]),
            level_range: (-1500, 1500),
            presets: vec![
                EqualizerPreset::new("Normal", [300, 0, 0, 0, 300]),
                EqualizerPreset::new("Classical", [500, 300, -200, 400, 400]),
                EqualizerPreset::new("Dance", [600, 0, 200, 400, 100]),
                EqualizerPreset::new("Flat", [0, 0, 0, 0, 0]),
                EqualizerPreset::new("Folk", [300, 0, 0, 200, -100]),
                EqualizerPreset::new("Heavy Metal", [400, 100, 900, 300, 0]),
                EqualizerPreset::new("Hip Hop", [500, 300, 0, 100, 300]),
                EqualizerPreset::new("Jazz", [400, 200, -200, 200, 500]),
                EqualizerPreset::new("Pop", [-100, 200, 500, 100, -200]),
                EqualizerPreset::new("Rock", [500, 300, -100, 300, 50]),
            ],
        }
    }
}

impl EqualizerProfile {
    /// Copy of this profile with its band table repaired.
    ///
    /// Falls back to the reported table when it cannot be repaired.
    pub fn corrected(&self, corrector: &BandRangeCorrector) -> Self {
        let bands = match corrector.correct(&self.bands) {
            Ok(bands) => bands,
            Err(err) => {
                log::warn!(
                    "[EffectArbiter] Keeping reported equalizer bands: {}",
                    err
                );
                self.bands.clone()
            }
        };
        Self {
            bands,
            ..self.clone()
        }
    }

    pub fn number_of_bands(&self) -> usize {
        self.bands.len()
    }
}

/// Capabilities of the effect engine behind an arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectProfile {
    pub supported: Vec<EffectCategory>,
    pub equalizer: EqualizerProfile,
}

impl Default for EffectProfile {
    fn default() -> Self {
        Self {
            supported: EffectCategory::ALL.to_vec(),
            equalizer: EqualizerProfile::default(),
        }
    }
}

impl EffectProfile {
    pub fn supports(&self, category: EffectCategory) -> bool {
        self.supported.contains(&category)
    }
}

/// Static description of one effect category.
pub trait EffectKind: Send + Sync + 'static {
    const CATEGORY: EffectCategory;

    type Settings: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    fn default_settings(profile: &EffectProfile) -> Self::Settings;

    fn validate(settings: &Self::Settings, profile: &EffectProfile) -> Result<(), EffectError>;

    fn wrap(settings: Self::Settings) -> SettingsRecord;

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings>;
}

fn check_strength(strength: i16) -> Result<(), EffectError> {
    if (MIN_STRENGTH..=MAX_STRENGTH).contains(&strength) {
        Ok(())
    } else {
        Err(EffectError::InvalidArgument {
            reason: format!(
                "strength {} outside {}..={}",
                strength, MIN_STRENGTH, MAX_STRENGTH
            ),
        })
    }
}

pub struct BassBoost;

impl EffectKind for BassBoost {
    const CATEGORY: EffectCategory = EffectCategory::BassBoost;
    type Settings = BassBoostSettings;

    fn default_settings(_profile: &EffectProfile) -> Self::Settings {
        BassBoostSettings::default()
    }

    fn validate(settings: &Self::Settings, _profile: &EffectProfile) -> Result<(), EffectError> {
        check_strength(settings.strength)
    }

    fn wrap(settings: Self::Settings) -> SettingsRecord {
        SettingsRecord::BassBoost(settings)
    }

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings> {
        match record {
            SettingsRecord::BassBoost(settings) => Some(settings),
            _ => None,
        }
    }
}

pub struct Virtualizer;

impl EffectKind for Virtualizer {
    const CATEGORY: EffectCategory = EffectCategory::Virtualizer;
    type Settings = VirtualizerSettings;

    fn default_settings(_profile: &EffectProfile) -> Self::Settings {
        VirtualizerSettings::default()
    }

    fn validate(settings: &Self::Settings, _profile: &EffectProfile) -> Result<(), EffectError> {
        check_strength(settings.strength)
    }

    fn wrap(settings: Self::Settings) -> SettingsRecord {
        SettingsRecord::Virtualizer(settings)
    }

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings> {
        match record {
            SettingsRecord::Virtualizer(settings) => Some(settings),
            _ => None,
        }
    }
}

pub struct Equalizer;

impl EffectKind for Equalizer {
    const CATEGORY: EffectCategory = EffectCategory::Equalizer;
    type Settings = EqualizerSettings;

    fn default_settings(profile: &EffectProfile) -> Self::Settings {
        EqualizerSettings {
            current_preset: PRESET_UNDEFINED,
            band_levels: vec![0; profile.equalizer.number_of_bands()],
        }
    }

    fn validate(settings: &Self::Settings, profile: &EffectProfile) -> Result<(), EffectError> {
        let eq = &profile.equalizer;
        if settings.band_levels.len() != eq.number_of_bands() {
            return Err(EffectError::InvalidArgument {
                reason: format!(
                    "expected {} band levels, got {}",
                    eq.number_of_bands(),
                    settings.band_levels.len()
                ),
            });
        }

        let (low, high) = eq.level_range;
        if let Some(level) = settings
            .band_levels
            .iter()
            .find(|level| !(low..=high).contains(*level))
        {
            return Err(EffectError::InvalidArgument {
                reason: format!("band level {} outside {}..={}", level, low, high),
            });
        }

        let preset_known = settings.current_preset == PRESET_UNDEFINED
            || (settings.current_preset >= 0
                && (settings.current_preset as usize) < eq.presets.len());
        if !preset_known {
            return Err(EffectError::InvalidArgument {
                reason: format!("unknown preset {}", settings.current_preset),
            });
        }

        Ok(())
    }

    fn wrap(settings: Self::Settings) -> SettingsRecord {
        SettingsRecord::Equalizer(settings)
    }

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings> {
        match record {
            SettingsRecord::Equalizer(settings) => Some(settings),
            _ => None,
        }
    }
}

pub struct PresetReverb;

impl EffectKind for PresetReverb {
    const CATEGORY: EffectCategory = EffectCategory::PresetReverb;
    type Settings = PresetReverbSettings;

    fn default_settings(_profile: &EffectProfile) -> Self::Settings {
        PresetReverbSettings::default()
    }

    fn validate(_settings: &Self::Settings, _profile: &EffectProfile) -> Result<(), EffectError> {
        Ok(())
    }

    fn wrap(settings: Self::Settings) -> SettingsRecord {
        SettingsRecord::PresetReverb(settings)
    }

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings> {
        match record {
            SettingsRecord::PresetReverb(settings) => Some(settings),
            _ => None,
        }
    }
}

fn check_range<T>(name: &str, value: T, (min, max): (T, T)) -> Result<(), EffectError>
where
    T: PartialOrd + fmt::Display,
{
    if min <= value && value <= max {
        Ok(())
    } else {
        Err(EffectError::InvalidArgument {
            reason: format!("{} {} outside {}..={}", name, value, min, max),
        })
    }
}

pub struct EnvironmentalReverb;

impl EffectKind for EnvironmentalReverb {
    const CATEGORY: EffectCategory = EffectCategory::EnvironmentalReverb;
    type Settings = EnvironmentalReverbSettings;

    fn default_settings(_profile: &EffectProfile) -> Self::Settings {
        EnvironmentalReverbSettings::default()
    }

    fn validate(settings: &Self::Settings, _profile: &EffectProfile) -> Result<(), EffectError> {
        use reverb_limits::*;

        check_range("room level", settings.room_level, ROOM_LEVEL)?;
        check_range("room HF level", settings.room_hf_level, ROOM_HF_LEVEL)?;
        check_range("decay time", settings.decay_time, DECAY_TIME)?;
        check_range("decay HF ratio", settings.decay_hf_ratio, DECAY_HF_RATIO)?;
        check_range("reflections level", settings.reflections_level, REFLECTIONS_LEVEL)?;
        check_range("reflections delay", settings.reflections_delay, REFLECTIONS_DELAY)?;
        check_range("reverb level", settings.reverb_level, REVERB_LEVEL)?;
        check_range("reverb delay", settings.reverb_delay, REVERB_DELAY)?;
        check_range("diffusion", settings.diffusion, DIFFUSION)?;
        check_range("density", settings.density, DENSITY)
    }

    fn wrap(settings: Self::Settings) -> SettingsRecord {
        SettingsRecord::EnvironmentalReverb(settings)
    }

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings> {
        match record {
            SettingsRecord::EnvironmentalReverb(settings) => Some(settings),
            _ => None,
        }
    }
}

pub struct PreAmp;

impl EffectKind for PreAmp {
    const CATEGORY: EffectCategory = EffectCategory::PreAmp;
    type Settings = PreAmpSettings;

    fn default_settings(_profile: &EffectProfile) -> Self::Settings {
        PreAmpSettings::default()
    }

    fn validate(settings: &Self::Settings, _profile: &EffectProfile) -> Result<(), EffectError> {
        // NaN fails both comparisons
        check_range("pre-amp level", settings.level, PREAMP_LEVEL_RANGE)
    }

    fn wrap(settings: Self::Settings) -> SettingsRecord {
        SettingsRecord::PreAmp(settings)
    }

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings> {
        match record {
            SettingsRecord::PreAmp(settings) => Some(settings),
            _ => None,
        }
    }
}

pub struct LoudnessEnhancer;

impl EffectKind for LoudnessEnhancer {
    const CATEGORY: EffectCategory = EffectCategory::LoudnessEnhancer;
    type Settings = LoudnessEnhancerSettings;

    fn default_settings(_profile: &EffectProfile) -> Self::Settings {
        LoudnessEnhancerSettings::default()
    }

    fn validate(_settings: &Self::Settings, _profile: &EffectProfile) -> Result<(), EffectError> {
        Ok(())
    }

    fn wrap(settings: Self::Settings) -> SettingsRecord {
        SettingsRecord::LoudnessEnhancer(settings)
    }

    fn unwrap(record: &SettingsRecord) -> Option<&Self::Settings> {
        match record {
            SettingsRecord::LoudnessEnhancer(settings) => Some(settings),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_repairs_last_band() {
        let profile = EqualizerProfile::default();
        let corrected = profile.corrected(&BandRangeCorrector::default());
        assert_eq!(corrected.number_of_bands(), 5);
        assert_eq!(corrected.bands.bands[4].max, 24_000_000);
        assert_eq!(corrected.presets.len(), 10);
        assert!(corrected
            .presets
            .iter()
            .all(|preset| preset.band_levels.len() == 5));
    }

    #[test]
    fn strength_validation() {
        let profile = EffectProfile::default();
        assert!(BassBoost::validate(&BassBoostSettings { strength: 1000 }, &profile).is_ok());
        assert!(BassBoost::validate(&BassBoostSettings { strength: 1001 }, &profile).is_err());
        assert!(
            Virtualizer::validate(&VirtualizerSettings { strength: -1 }, &profile).is_err()
        );
    }

    #[test]
    fn equalizer_validation() {
        let profile = EffectProfile::default();
        let mut settings = Equalizer::default_settings(&profile);
        assert_eq!(settings.band_levels, vec![0; 5]);
        assert_eq!(settings.current_preset, PRESET_UNDEFINED);
        assert!(Equalizer::validate(&settings, &profile).is_ok());

        settings.band_levels[2] = 2000;
        assert!(Equalizer::validate(&settings, &profile).is_err());

        settings.band_levels = vec![0; 3];
        assert!(Equalizer::validate(&settings, &profile).is_err());

        let settings = EqualizerSettings {
            current_preset: 10,
            band_levels: vec![0; 5],
        };
        assert!(Equalizer::validate(&settings, &profile).is_err());
    }

    #[test]
    fn reverb_presets_are_clipped_to_engine_limits() {
        let profile = EffectProfile::default();
        let defaults = EnvironmentalReverb::default_settings(&profile);
        assert_eq!(defaults.room_level, -9000);
        assert_eq!(defaults.reflections_delay, 0);
        assert!(EnvironmentalReverb::validate(&defaults, &profile).is_ok());

        let hangar = EnvironmentalReverbPreset::Hangar.settings();
        assert_eq!(hangar.decay_time, 7000);
        assert!(EnvironmentalReverb::validate(&hangar, &profile).is_ok());

        let too_dense = EnvironmentalReverbSettings {
            density: 1001,
            ..defaults
        };
        assert!(EnvironmentalReverb::validate(&too_dense, &profile).is_err());
    }

    #[test]
    fn preamp_level_validation() {
        let profile = EffectProfile::default();
        assert!(PreAmp::validate(&PreAmpSettings::default(), &profile).is_ok());
        assert!(PreAmp::validate(&PreAmpSettings { level: 2.5 }, &profile).is_err());
        assert!(PreAmp::validate(&PreAmpSettings { level: f32::NAN }, &profile).is_err());
    }

    #[test]
    fn reverb_preset_numbers() {
        assert_eq!(ReverbPreset::Plate.raw(), 6);
        assert_eq!(ReverbPreset::from_raw(3), Some(ReverbPreset::LargeRoom));
        assert_eq!(ReverbPreset::from_raw(7), None);
        assert_eq!(ReverbPreset::from_raw(-1), None);
    }

    #[test]
    fn records_unwrap_only_their_own_category() {
        let record = BassBoost::wrap(BassBoostSettings { strength: 10 });
        assert_eq!(
            BassBoost::unwrap(&record),
            Some(&BassBoostSettings { strength: 10 })
        );
        assert!(Virtualizer::unwrap(&record).is_none());
    }
}
