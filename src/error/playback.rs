// Playback error types and constants

use log::error;
use thiserror::Error;

use crate::error::{ErrorCode, ResultCode};
use crate::state::PlaybackState;

/// Playback error code constants exposed across the FFI boundary.
///
/// Error code range: 2001-2008
pub struct PlaybackErrorCodes {}

impl PlaybackErrorCodes {
    /// Session has already been released
    pub const RELEASED: i32 = 2001;

    /// Call is not legal in the current state
    pub const ILLEGAL_STATE: i32 = 2002;

    /// Argument rejected before reaching the substrate
    pub const INVALID_ARGUMENT: i32 = 2003;

    /// Retryable I/O failure reported by the substrate
    pub const IO_FAILURE: i32 = 2004;

    /// State-class failure reported by the substrate
    pub const ENGINE_FAILURE: i32 = 2005;

    /// Operation not supported by the active backend
    pub const UNSUPPORTED: i32 = 2006;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 2007;

    /// Native engine player could not be created
    pub const BACKEND_UNAVAILABLE: i32 = 2008;
}

/// Log a playback error with structured context
pub fn log_playback_error(err: &PlaybackError, context: &str) {
    error!(
        "Playback error in {}: code={}, component=PlaybackSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Playback-related errors
///
/// Precondition failures (`Released`, `IllegalState`, `InvalidArgument`,
/// `Unsupported`) are raised before the substrate is touched. `Io` and
/// `Engine` carry the substrate's result code; only `Io` is retryable without
/// a corrective transition first.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("session has already been released")]
    Released,

    #[error("{operation} cannot be called in {state} state")]
    IllegalState {
        operation: &'static str,
        state: PlaybackState,
    },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("I/O failure: {reason}")]
    Io { code: ResultCode, reason: String },

    #[error("engine failure: {code}")]
    Engine { code: ResultCode },

    #[error("{operation} is not supported by this backend")]
    Unsupported { operation: &'static str },

    #[error("lock poisoned for component: {component}")]
    LockPoisoned { component: String },

    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },
}

impl PlaybackError {
    pub fn illegal_state(operation: &'static str, state: PlaybackState) -> Self {
        PlaybackError::IllegalState { operation, state }
    }

    /// I/O failures may be retried, e.g. with another source.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlaybackError::Io { .. })
    }

    /// Substrate result code carried by this error, if any.
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            PlaybackError::Io { code, .. } | PlaybackError::Engine { code } => Some(*code),
            _ => None,
        }
    }
}

impl ErrorCode for PlaybackError {
    fn code(&self) -> i32 {
        match self {
            PlaybackError::Released => PlaybackErrorCodes::RELEASED,
            PlaybackError::IllegalState { .. } => PlaybackErrorCodes::ILLEGAL_STATE,
            PlaybackError::InvalidArgument { .. } => PlaybackErrorCodes::INVALID_ARGUMENT,
            PlaybackError::Io { .. } => PlaybackErrorCodes::IO_FAILURE,
            PlaybackError::Engine { .. } => PlaybackErrorCodes::ENGINE_FAILURE,
            PlaybackError::Unsupported { .. } => PlaybackErrorCodes::UNSUPPORTED,
            PlaybackError::LockPoisoned { .. } => PlaybackErrorCodes::LOCK_POISONED,
            PlaybackError::BackendUnavailable { .. } => PlaybackErrorCodes::BACKEND_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_error_codes() {
        assert_eq!(PlaybackError::Released.code(), 2001);
        assert_eq!(
            PlaybackError::illegal_state("start", PlaybackState::Idle).code(),
            2002
        );
        assert_eq!(
            PlaybackError::InvalidArgument {
                reason: "negative offset".to_string()
            }
            .code(),
            2003
        );
        assert_eq!(
            PlaybackError::Io {
                code: ResultCode::IoError,
                reason: "unreadable".to_string()
            }
            .code(),
            2004
        );
        assert_eq!(
            PlaybackError::Engine {
                code: ResultCode::DeadObject
            }
            .code(),
            2005
        );
        assert_eq!(
            PlaybackError::Unsupported {
                operation: "set_audio_session_id"
            }
            .code(),
            2006
        );
    }

    #[test]
    fn test_playback_error_messages() {
        let err = PlaybackError::illegal_state("prepare", PlaybackState::Started);
        let msg = err.message();
        assert!(msg.contains("prepare"));
        assert!(msg.contains("Started"));

        let err = PlaybackError::Engine {
            code: ResultCode::TimedOut,
        };
        assert!(err.message().contains("timed out"));
    }

    #[test]
    fn test_result_code_accessor() {
        let err = PlaybackError::Io {
            code: ResultCode::PermissionDenied,
            reason: "denied".to_string(),
        };
        assert_eq!(err.result_code(), Some(ResultCode::PermissionDenied));
        assert!(err.is_retryable());
        assert_eq!(PlaybackError::Released.result_code(), None);
        assert!(!PlaybackError::Released.is_retryable());
    }
}
