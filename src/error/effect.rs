// Effect error types and constants

use log::error;
use thiserror::Error;

use crate::effects::EffectCategory;
use crate::error::{ErrorCode, ResultCode};

/// Effect error code constants exposed across the FFI boundary.
///
/// Error code range: 3001-3006
pub struct EffectErrorCodes {}

impl EffectErrorCodes {
    /// Handle was released; every later call fails with this code
    pub const RELEASED: i32 = 3001;

    /// Parameter mutation attempted by a handle that is not in control
    pub const CONTROL_LOST: i32 = 3002;

    /// Effect category is not available on this backend
    pub const UNSUPPORTED: i32 = 3003;

    /// Parameter outside the accepted range
    pub const INVALID_ARGUMENT: i32 = 3004;

    /// Parameter sink rejected a committed change
    pub const ENGINE_FAILURE: i32 = 3005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 3006;
}

/// Log an effect error with structured context
pub fn log_effect_error(err: &EffectError, context: &str) {
    error!(
        "Effect error in {}: code={}, component=EffectArbiter, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Effect-related errors
///
/// `ControlLost` and `Unsupported` are kept apart so callers can tell "not
/// currently owned" from "category unavailable".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    #[error("effect handle has already been released")]
    Released,

    #[error("{operation} is not permitted without control")]
    ControlLost { operation: &'static str },

    #[error("{category:?} is not supported")]
    Unsupported { category: EffectCategory },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("engine rejected effect parameters: {code}")]
    Engine { code: ResultCode },

    #[error("lock poisoned for component: {component}")]
    LockPoisoned { component: String },
}

impl ErrorCode for EffectError {
    fn code(&self) -> i32 {
        match self {
            EffectError::Released => EffectErrorCodes::RELEASED,
            EffectError::ControlLost { .. } => EffectErrorCodes::CONTROL_LOST,
            EffectError::Unsupported { .. } => EffectErrorCodes::UNSUPPORTED,
            EffectError::InvalidArgument { .. } => EffectErrorCodes::INVALID_ARGUMENT,
            EffectError::Engine { .. } => EffectErrorCodes::ENGINE_FAILURE,
            EffectError::LockPoisoned { .. } => EffectErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

impl From<ResultCode> for EffectError {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::ControlLost => EffectError::ControlLost {
                operation: "commit",
            },
            ResultCode::IllegalArgument => EffectError::InvalidArgument {
                reason: "rejected by engine".to_string(),
            },
            other => EffectError::Engine { code: other },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_error_codes() {
        assert_eq!(EffectError::Released.code(), 3001);
        assert_eq!(
            EffectError::ControlLost {
                operation: "set_strength"
            }
            .code(),
            3002
        );
        assert_eq!(
            EffectError::Unsupported {
                category: EffectCategory::Virtualizer
            }
            .code(),
            3003
        );
        assert_eq!(
            EffectError::LockPoisoned {
                component: "ledger".to_string()
            }
            .code(),
            3006
        );
    }

    #[test]
    fn control_lost_and_unsupported_are_distinct() {
        let lost = EffectError::ControlLost {
            operation: "set_properties",
        };
        let unsupported = EffectError::Unsupported {
            category: EffectCategory::BassBoost,
        };
        assert_ne!(lost.code(), unsupported.code());
        assert!(lost.message().contains("without control"));
        assert!(unsupported.message().contains("BassBoost"));
    }

    #[test]
    fn result_codes_convert() {
        assert!(matches!(
            EffectError::from(ResultCode::ControlLost),
            EffectError::ControlLost { .. }
        ));
        assert!(matches!(
            EffectError::from(ResultCode::DeadObject),
            EffectError::Engine {
                code: ResultCode::DeadObject
            }
        ));
    }
}
