//! Configuration management for backend selection and platform quirks
//!
//! This module provides runtime configuration loading from JSON files, so
//! backend preference, decoder compatibility overrides and the equalizer
//! band-table ceiling can be adjusted without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::effects::BandRangeCorrector;
use crate::engine::backend::DecoderQuirks;

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV_VAR: &str = "HYBRID_PLAYER_CONFIG";

/// Config file read by [`PlayerConfig::load`] when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "hybrid_player.json";

/// Complete player configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub backend: BackendConfig,
    pub compat: CompatConfig,
    pub equalizer: EqualizerConfig,
}

/// Which backend new sessions use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Native engine when it loaded, stock decoder otherwise
    #[default]
    Auto,
    Stock,
    Native,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub preference: BackendPreference,
}

/// Decoder compatibility overrides
///
/// Unset fields keep what the decoder reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Platform API level used to derive loop and chaining quirks
    pub api_level: Option<u32>,
    /// Whether the platform decoder is NuPlayer
    pub uses_nuplayer: Option<bool>,
    /// Force decoder-side successor chaining on or off
    pub native_chaining: Option<bool>,
}

impl CompatConfig {
    /// Apply the overrides on top of a decoder's own quirk profile.
    pub fn apply(&self, reported: DecoderQuirks) -> DecoderQuirks {
        let mut quirks = if self.api_level.is_some() || self.uses_nuplayer.is_some() {
            DecoderQuirks::detect(
                self.api_level.unwrap_or(reported.api_level),
                self.uses_nuplayer.unwrap_or(reported.uses_nuplayer),
            )
        } else {
            reported
        };
        if let Some(chaining) = self.native_chaining {
            quirks.native_next_player = chaining;
        }
        quirks
    }
}

/// Equalizer band-table correction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerConfig {
    /// Output sample rate; half of it is the band ceiling
    pub sample_rate_hz: u32,
    /// Significant figures kept when rounding corrected frequencies
    pub significant_figures: u32,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            significant_figures: 2,
        }
    }
}

impl EqualizerConfig {
    pub fn corrector(&self) -> BandRangeCorrector {
        BandRangeCorrector::for_sample_rate(self.sample_rate_hz, self.significant_figures)
    }
}

impl PlayerConfig {
    /// Load configuration from JSON file
    ///
    /// Missing or malformed files fall back to the defaults with a warning.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration on Android
    ///
    /// The host passes settings through JNI rather than files, so this
    /// starts from the defaults.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration for non-Android platforms
    #[cfg(not(target_os = "android"))]
    pub fn load() -> Self {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::load_from_file(path),
            _ => Self::load_from_file(DEFAULT_CONFIG_FILE),
        }
    }
}
