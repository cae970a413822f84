//! Process-wide native engine capability flag.
//!
//! The flag is set at most once, when the host loads (or fails to load) the
//! native engine library, and is read-only afterwards.

use once_cell::sync::OnceCell;

use crate::telemetry::{self, LifecyclePhase};

static NATIVE_ENGINE: OnceCell<bool> = OnceCell::new();

/// Record whether the native engine library loaded.
///
/// Returns `false` if the flag had already been set; the first value wins.
pub fn mark_native_engine_loaded(available: bool) -> bool {
    let first = NATIVE_ENGINE.set(available).is_ok();
    if first {
        let phase = if available {
            LifecyclePhase::NativeEngineAvailable
        } else {
            LifecyclePhase::NativeEngineUnavailable
        };
        telemetry::hub().record_lifecycle(phase);
        log::info!("[Capability] Native engine available: {}", available);
    } else {
        log::warn!("[Capability] Native engine flag already set; ignoring {}", available);
    }
    first
}

/// Whether the native engine can be used in this process.
///
/// Before the host reports a load result, desktop builds assume the bundled
/// stub engine and Android assumes nothing is loaded.
pub fn native_engine_available() -> bool {
    *NATIVE_ENGINE.get_or_init(default_availability)
}

fn default_availability() -> bool {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_stable_once_read() {
        let first = native_engine_available();
        assert!(!mark_native_engine_loaded(!first));
        assert_eq!(native_engine_available(), first);
    }
}
