//! Typed effect handles.
//!
//! A handle is one application-side object for an effect category on an
//! acoustic session. Several handles may share a category; the arbiter
//! decides which one may change the shared parameters. Reads always return
//! the parameters currently in force, whichever handle set them.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::effects::arbiter::{EffectSession, EffectStatus, HandleId};
use crate::effects::band_corrector::Band;
use crate::effects::kinds::{
    BassBoost, EffectKind, EnvironmentalReverb, EnvironmentalReverbPreset, Equalizer,
    LoudnessEnhancer, PreAmp, PresetReverb, ReverbPreset, Virtualizer, PRESET_UNDEFINED,
};
use crate::error::EffectError;

/// Handle to one effect of kind `K`.
///
/// Released explicitly with [`EffectHandle::release`] or on drop. Every call
/// on a released handle fails with [`EffectError::Released`].
pub struct EffectHandle<K: EffectKind> {
    id: HandleId,
    session: Option<Arc<EffectSession>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: EffectKind> std::fmt::Debug for EffectHandle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("category", &K::CATEGORY)
            .field("id", &self.id)
            .field("released", &self.session.is_none())
            .finish()
    }
}

impl<K: EffectKind> EffectHandle<K> {
    pub(crate) fn attach(session: Arc<EffectSession>) -> Result<Self, EffectError> {
        let profile = session.profile().clone();
        let id = session.admit(K::CATEGORY, || K::wrap(K::default_settings(&profile)))?;
        Ok(Self {
            id,
            session: Some(session),
            _kind: PhantomData,
        })
    }

    fn session(&self) -> Result<&Arc<EffectSession>, EffectError> {
        self.session.as_ref().ok_or(EffectError::Released)
    }

    pub fn is_released(&self) -> bool {
        self.session.is_none()
    }

    /// Engine-side effect id, shared by all handles of the category.
    pub fn id(&self) -> Result<i32, EffectError> {
        self.session()?.effect_id(K::CATEGORY)
    }

    pub fn audio_session_id(&self) -> Result<i32, EffectError> {
        Ok(self.session()?.audio_session_id())
    }

    pub fn has_control(&self) -> Result<bool, EffectError> {
        self.session()?.has_control(K::CATEGORY, self.id)
    }

    pub fn enabled(&self) -> Result<bool, EffectError> {
        self.session()?.enabled(K::CATEGORY)
    }

    /// Enable or disable the effect.
    ///
    /// A handle without control gets [`EffectStatus::InvalidOperation`]
    /// rather than an error.
    pub fn set_enabled(&self, enabled: bool) -> Result<EffectStatus, EffectError> {
        self.session()?.set_enabled(K::CATEGORY, self.id, enabled)
    }

    pub fn properties(&self) -> Result<K::Settings, EffectError> {
        let record = self.session()?.settings(K::CATEGORY)?;
        K::unwrap(&record).cloned().ok_or(EffectError::Released)
    }

    /// Replace all parameters. Requires control.
    pub fn set_properties(&self, settings: K::Settings) -> Result<(), EffectError> {
        self.commit("set_properties", settings)
    }

    fn commit(&self, operation: &'static str, settings: K::Settings) -> Result<(), EffectError> {
        let session = self.session()?;
        K::validate(&settings, session.profile())?;
        session.set_settings(K::CATEGORY, self.id, operation, K::wrap(settings))
    }

    /// Read-modify-write of the shared parameters. Requires control.
    fn update(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut K::Settings) -> Result<(), EffectError>,
    ) -> Result<(), EffectError> {
        let mut settings = self.properties()?;
        apply(&mut settings)?;
        self.commit(operation, settings)
    }

    pub fn set_control_status_listener<F>(&self, listener: Option<F>) -> Result<(), EffectError>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let listener = listener.map(|f| Arc::new(f) as Arc<dyn Fn(bool) + Send + Sync>);
        self.session()?.set_listener(K::CATEGORY, self.id, listener)
    }

    /// Release the handle. Idempotent.
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            session.withdraw(K::CATEGORY, self.id);
        }
    }
}

impl<K: EffectKind> Drop for EffectHandle<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl EffectHandle<BassBoost> {
    pub fn strength_supported(&self) -> Result<bool, EffectError> {
        self.session()?;
        Ok(true)
    }

    pub fn rounded_strength(&self) -> Result<i16, EffectError> {
        Ok(self.properties()?.strength)
    }

    pub fn set_strength(&self, strength: i16) -> Result<(), EffectError> {
        self.update("set_strength", |settings| {
            settings.strength = strength;
            Ok(())
        })
    }
}

impl EffectHandle<Virtualizer> {
    pub fn strength_supported(&self) -> Result<bool, EffectError> {
        self.session()?;
        Ok(true)
    }

    pub fn rounded_strength(&self) -> Result<i16, EffectError> {
        Ok(self.properties()?.strength)
    }

    pub fn set_strength(&self, strength: i16) -> Result<(), EffectError> {
        self.update("set_strength", |settings| {
            settings.strength = strength;
            Ok(())
        })
    }
}

impl EffectHandle<Equalizer> {
    fn band(&self, band: usize) -> Result<Band, EffectError> {
        let session = self.session()?;
        session
            .profile()
            .equalizer
            .bands
            .bands
            .get(band)
            .copied()
            .ok_or_else(|| EffectError::InvalidArgument {
                reason: format!("band {} does not exist", band),
            })
    }

    pub fn number_of_bands(&self) -> Result<usize, EffectError> {
        Ok(self.session()?.profile().equalizer.number_of_bands())
    }

    pub fn band_level_range(&self) -> Result<(i16, i16), EffectError> {
        Ok(self.session()?.profile().equalizer.level_range)
    }

    pub fn center_freq(&self, band: usize) -> Result<i32, EffectError> {
        Ok(self.band(band)?.center)
    }

    pub fn band_freq_range(&self, band: usize) -> Result<(i32, i32), EffectError> {
        let band = self.band(band)?;
        Ok((band.min, band.max))
    }

    /// Band covering `frequency` (milli-Hertz) in the corrected table.
    pub fn band_for_frequency(&self, frequency: i32) -> Result<usize, EffectError> {
        self.session()?
            .profile()
            .equalizer
            .bands
            .band_for_frequency(frequency)
            .ok_or_else(|| EffectError::InvalidArgument {
                reason: "equalizer has no bands".to_string(),
            })
    }

    pub fn band_level(&self, band: usize) -> Result<i16, EffectError> {
        self.band(band)?;
        let settings = self.properties()?;
        settings
            .band_levels
            .get(band)
            .copied()
            .ok_or(EffectError::Released)
    }

    /// Set one band level; the current preset becomes undefined.
    pub fn set_band_level(&self, band: usize, level: i16) -> Result<(), EffectError> {
        self.band(band)?;
        self.update("set_band_level", |settings| {
            settings.band_levels[band] = level;
            settings.current_preset = PRESET_UNDEFINED;
            Ok(())
        })
    }

    pub fn number_of_presets(&self) -> Result<usize, EffectError> {
        Ok(self.session()?.profile().equalizer.presets.len())
    }

    pub fn preset_name(&self, preset: usize) -> Result<String, EffectError> {
        self.session()?
            .profile()
            .equalizer
            .presets
            .get(preset)
            .map(|preset| preset.name.clone())
            .ok_or_else(|| EffectError::InvalidArgument {
                reason: format!("preset {} does not exist", preset),
            })
    }

    pub fn current_preset(&self) -> Result<i16, EffectError> {
        Ok(self.properties()?.current_preset)
    }

    /// Apply a preset's band levels.
    pub fn use_preset(&self, preset: usize) -> Result<(), EffectError> {
        let levels = self
            .session()?
            .profile()
            .equalizer
            .presets
            .get(preset)
            .map(|preset| preset.band_levels.clone())
            .ok_or_else(|| EffectError::InvalidArgument {
                reason: format!("preset {} does not exist", preset),
            })?;
        let index = i16::try_from(preset).map_err(|_| EffectError::InvalidArgument {
            reason: format!("preset {} out of range", preset),
        })?;

        self.update("use_preset", move |settings| {
            settings.band_levels = levels;
            settings.current_preset = index;
            Ok(())
        })
    }
}

impl EffectHandle<PresetReverb> {
    pub fn preset(&self) -> Result<ReverbPreset, EffectError> {
        Ok(self.properties()?.preset)
    }

    pub fn set_preset(&self, preset: ReverbPreset) -> Result<(), EffectError> {
        self.update("set_preset", |settings| {
            settings.preset = preset;
            Ok(())
        })
    }
}

/// Getter and setter pairs over single reverb parameters.
macro_rules! reverb_parameters {
    ($($field:ident, $setter:ident: $ty:ty;)*) => {
        impl EffectHandle<EnvironmentalReverb> {
            $(
                pub fn $field(&self) -> Result<$ty, EffectError> {
                    Ok(self.properties()?.$field)
                }

                pub fn $setter(&self, value: $ty) -> Result<(), EffectError> {
                    self.update(stringify!($setter), |settings| {
                        settings.$field = value;
                        Ok(())
                    })
                }
            )*
        }
    };
}

reverb_parameters! {
    room_level, set_room_level: i16;
    room_hf_level, set_room_hf_level: i16;
    decay_time, set_decay_time: i32;
    decay_hf_ratio, set_decay_hf_ratio: i16;
    reflections_level, set_reflections_level: i16;
    reflections_delay, set_reflections_delay: i32;
    reverb_level, set_reverb_level: i16;
    reverb_delay, set_reverb_delay: i32;
    diffusion, set_diffusion: i16;
    density, set_density: i16;
}

impl EffectHandle<EnvironmentalReverb> {
    /// Replace every parameter with a standard environment.
    pub fn load_preset(&self, preset: EnvironmentalReverbPreset) -> Result<(), EffectError> {
        self.commit("load_preset", preset.settings())
    }
}

impl EffectHandle<PreAmp> {
    /// Linear gain applied before the effect chain.
    pub fn level(&self) -> Result<f32, EffectError> {
        Ok(self.properties()?.level)
    }

    pub fn set_level(&self, level: f32) -> Result<(), EffectError> {
        self.update("set_level", |settings| {
            settings.level = level;
            Ok(())
        })
    }
}

impl EffectHandle<LoudnessEnhancer> {
    pub fn target_gain(&self) -> Result<i32, EffectError> {
        Ok(self.properties()?.target_gain_mb)
    }

    pub fn set_target_gain(&self, gain_mb: i32) -> Result<(), EffectError> {
        self.update("set_target_gain", |settings| {
            settings.target_gain_mb = gain_mb;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::arbiter::EffectControlArbiter;
    use crate::effects::kinds::{BassBoostSettings, EqualizerSettings};

    #[test]
    fn released_handle_fails_every_call() {
        let arbiter = EffectControlArbiter::default();
        let mut handle = arbiter.create::<BassBoost>(1).unwrap();
        handle.release();
        handle.release();

        assert!(handle.is_released());
        assert_eq!(handle.id(), Err(EffectError::Released));
        assert_eq!(handle.has_control(), Err(EffectError::Released));
        assert_eq!(handle.enabled(), Err(EffectError::Released));
        assert_eq!(handle.set_enabled(true), Err(EffectError::Released));
        assert_eq!(handle.properties(), Err(EffectError::Released));
        assert_eq!(handle.set_strength(10), Err(EffectError::Released));
        assert_eq!(handle.strength_supported(), Err(EffectError::Released));
    }

    #[test]
    fn strength_out_of_range_is_rejected_before_commit() {
        let arbiter = EffectControlArbiter::default();
        let handle = arbiter.create::<Virtualizer>(1).unwrap();
        assert!(matches!(
            handle.set_strength(1001),
            Err(EffectError::InvalidArgument { .. })
        ));
        assert_eq!(handle.rounded_strength().unwrap(), 0);
    }

    #[test]
    fn equalizer_uses_corrected_band_table() {
        let arbiter = EffectControlArbiter::default();
        let eq = arbiter.create::<Equalizer>(2).unwrap();

        assert_eq!(eq.number_of_bands().unwrap(), 5);
        assert_eq!(eq.band_freq_range(4).unwrap(), (7_000_001, 24_000_000));
        assert_eq!(eq.center_freq(0).unwrap(), 60_000);
        assert_eq!(eq.band_for_frequency(14_000_000).unwrap(), 4);
        assert_eq!(eq.band_for_frequency(1_000).unwrap(), 0);
        assert!(eq.band_freq_range(5).is_err());
    }

    #[test]
    fn equalizer_presets_and_band_levels() {
        let arbiter = EffectControlArbiter::default();
        let eq = arbiter.create::<Equalizer>(2).unwrap();

        assert_eq!(eq.number_of_presets().unwrap(), 10);
        assert_eq!(eq.preset_name(9).unwrap(), "Rock");

        eq.use_preset(1).unwrap();
        assert_eq!(eq.current_preset().unwrap(), 1);
        assert_eq!(eq.band_level(2).unwrap(), -200);

        eq.set_band_level(2, 150).unwrap();
        assert_eq!(eq.current_preset().unwrap(), PRESET_UNDEFINED);
        assert_eq!(
            eq.properties().unwrap(),
            EqualizerSettings {
                current_preset: PRESET_UNDEFINED,
                band_levels: vec![500, 300, 150, 400, 400],
            }
        );
        assert!(eq.use_preset(10).is_err());
    }

    #[test]
    fn drop_releases_control() {
        let arbiter = EffectControlArbiter::default();
        let first = arbiter.create::<BassBoost>(4).unwrap();
        {
            let second = arbiter.create::<BassBoost>(4).unwrap();
            assert!(second.has_control().unwrap());
            assert!(!first.has_control().unwrap());
        }
        assert!(first.has_control().unwrap());
        first
            .set_properties(BassBoostSettings { strength: 5 })
            .unwrap();
    }

    #[test]
    fn reverb_and_loudness_settings() {
        let arbiter = EffectControlArbiter::default();
        let reverb = arbiter.create::<PresetReverb>(6).unwrap();
        reverb.set_preset(ReverbPreset::LargeHall).unwrap();
        assert_eq!(reverb.preset().unwrap(), ReverbPreset::LargeHall);

        let loudness = arbiter.create::<LoudnessEnhancer>(6).unwrap();
        loudness.set_target_gain(600).unwrap();
        assert_eq!(loudness.target_gain().unwrap(), 600);
    }
}
