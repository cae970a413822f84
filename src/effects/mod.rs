//! Audio effects bound to acoustic sessions.
//!
//! [`EffectControlArbiter`] keeps one ledger per (session, category) and
//! decides which [`EffectHandle`] controls the shared parameters.
//! [`band_corrector`] repairs equalizer band tables reported by the platform.
//! Settings records print and parse in a `Name;key=value` text form.

pub mod arbiter;
pub mod band_corrector;
pub mod handle;
pub mod kinds;
pub mod settings_text;

pub use arbiter::{
    ControlListener, EffectControlArbiter, EffectParameterSink, EffectSession, EffectStatus,
    HandleId,
};
pub use band_corrector::{Band, BandRangeCorrector, BandTable, Violations};
pub use handle::EffectHandle;
pub use kinds::{
    BassBoost, BassBoostSettings, EffectCategory, EffectKind, EffectProfile,
    EnvironmentalReverb, EnvironmentalReverbPreset, EnvironmentalReverbSettings, Equalizer,
    EqualizerPreset, EqualizerProfile, EqualizerSettings, LoudnessEnhancer,
    LoudnessEnhancerSettings, PreAmp, PreAmpSettings, PresetReverb, PresetReverbSettings,
    ReverbPreset, SettingsRecord, Virtualizer, VirtualizerSettings, PREAMP_LEVEL_RANGE,
    PRESET_UNDEFINED,
};
