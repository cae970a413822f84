// Hybrid Player Core - Rust playback engine
// Lifecycle-checked playback over stock and native backends with shared audio effects

// Module declarations
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod state;
pub mod telemetry;

// Re-exports for convenience
pub use config::PlayerConfig;
pub use effects::{EffectControlArbiter, EffectHandle};
pub use engine::{BackendKind, DataSource, PlaybackSession, PlayerFactory, Subscription};
pub use error::{EffectError, ErrorCode, PlaybackError};
pub use state::PlaybackState;

use log::info;

/// Install the process-wide log sink.
///
/// Safe to call more than once; later calls keep the first subscriber.
#[cfg(target_os = "android")]
pub fn init_logging() {
    use tracing_subscriber::prelude::*;

    match tracing_android::layer("HybridPlayer") {
        Ok(layer) => {
            let _ = tracing_subscriber::registry().with(layer).try_init();
        }
        Err(err) => eprintln!("[HybridPlayer] logcat unavailable: {}", err),
    }
}

/// Install the process-wide log sink.
///
/// Safe to call more than once; later calls keep the first subscriber.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// JNI_OnLoad is called when the native library is loaded by Android.
/// Loading this library is what makes the native engine available.
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    _vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    init_logging();

    info!("JNI_OnLoad called - hybrid player {}", env!("CARGO_PKG_VERSION"));
    telemetry::hub().record_lifecycle(telemetry::LifecyclePhase::LibraryLoaded);
    engine::mark_native_engine_loaded(true);

    jni::sys::JNI_VERSION_1_6
}

/// Log build information once logging is up.
pub fn log_build_info() {
    info!(
        "hybrid_player {} (native engine available: {})",
        env!("CARGO_PKG_VERSION"),
        engine::native_engine_available()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log_build_info();
    }
}
