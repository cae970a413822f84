// Error types for the hybrid player
//
// This module defines error types for playback, effect arbitration and band
// table correction, each carrying a stable numeric code for FFI consumers.

mod band;
mod effect;
mod playback;
mod result_code;

pub use band::{BandTableError, BandTableErrorCodes};
pub use effect::{log_effect_error, EffectError, EffectErrorCodes};
pub use playback::{log_playback_error, PlaybackError, PlaybackErrorCodes};
pub use result_code::{ResultClass, ResultCode};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
