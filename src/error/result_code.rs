// Result codes reported by the native engine

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PlaybackError;

/// Fixed enumeration of results returned across the native engine boundary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Success = 0,
    Error = -1,
    InvalidHandle = -2,
    IllegalState = -3,
    IllegalArgument = -4,
    InternalError = -5,
    MemoryAllocationFailed = -6,
    ResourceAllocationFailed = -7,
    ContentNotFound = -8,
    ContentUnsupported = -9,
    IoError = -10,
    PermissionDenied = -11,
    TimedOut = -12,
    InErrorState = -13,
    ControlLost = -14,
    DeadObject = -15,
}

/// Failure class a result code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Success,
    /// Retryable, e.g. by pointing the session at another source.
    Io,
    /// Requires a corrective transition before retrying.
    State,
    Argument,
    Control,
    /// The engine already sits in its error state; nothing is raised.
    Silent,
}

impl ResultCode {
    pub fn from_raw(raw: i32) -> Option<ResultCode> {
        let code = match raw {
            0 => ResultCode::Success,
            -1 => ResultCode::Error,
            -2 => ResultCode::InvalidHandle,
            -3 => ResultCode::IllegalState,
            -4 => ResultCode::IllegalArgument,
            -5 => ResultCode::InternalError,
            -6 => ResultCode::MemoryAllocationFailed,
            -7 => ResultCode::ResourceAllocationFailed,
            -8 => ResultCode::ContentNotFound,
            -9 => ResultCode::ContentUnsupported,
            -10 => ResultCode::IoError,
            -11 => ResultCode::PermissionDenied,
            -12 => ResultCode::TimedOut,
            -13 => ResultCode::InErrorState,
            -14 => ResultCode::ControlLost,
            -15 => ResultCode::DeadObject,
            _ => return None,
        };
        Some(code)
    }

    /// Like [`ResultCode::from_raw`], folding unknown values into `Error`.
    pub fn from_raw_lossy(raw: i32) -> ResultCode {
        Self::from_raw(raw).unwrap_or_else(|| {
            log::warn!("[ResultCode] Unknown native result {}; treating as Error", raw);
            ResultCode::Error
        })
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }

    pub fn class(self) -> ResultClass {
        match self {
            ResultCode::Success => ResultClass::Success,
            ResultCode::ContentNotFound
            | ResultCode::ContentUnsupported
            | ResultCode::IoError
            | ResultCode::PermissionDenied => ResultClass::Io,
            ResultCode::IllegalArgument => ResultClass::Argument,
            ResultCode::ControlLost => ResultClass::Control,
            ResultCode::InErrorState => ResultClass::Silent,
            _ => ResultClass::State,
        }
    }

    /// Translate into the typed failure taxonomy.
    ///
    /// `InErrorState` is silent and maps to `Ok(())`.
    pub fn check(self, operation: &'static str) -> Result<(), PlaybackError> {
        match self.class() {
            ResultClass::Success | ResultClass::Silent => Ok(()),
            ResultClass::Io => Err(PlaybackError::Io {
                code: self,
                reason: format!("{} failed: {}", operation, self),
            }),
            ResultClass::Argument => Err(PlaybackError::InvalidArgument {
                reason: format!("{} rejected its arguments", operation),
            }),
            ResultClass::Control => Err(PlaybackError::Unsupported { operation }),
            ResultClass::State => Err(PlaybackError::Engine { code: self }),
        }
    }

    /// Same as [`ResultCode::check`] but reports I/O failures as state
    /// failures, for calls whose callers cannot act on a retryable error.
    pub fn check_except_io(self, operation: &'static str) -> Result<(), PlaybackError> {
        match self.class() {
            ResultClass::Io => Err(PlaybackError::Engine { code: self }),
            _ => self.check(operation),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Success => "success",
            ResultCode::Error => "generic error",
            ResultCode::InvalidHandle => "invalid handle",
            ResultCode::IllegalState => "illegal state",
            ResultCode::IllegalArgument => "illegal argument",
            ResultCode::InternalError => "internal error",
            ResultCode::MemoryAllocationFailed => "memory allocation failed",
            ResultCode::ResourceAllocationFailed => "resource allocation failed",
            ResultCode::ContentNotFound => "content not found",
            ResultCode::ContentUnsupported => "content unsupported",
            ResultCode::IoError => "I/O error",
            ResultCode::PermissionDenied => "permission denied",
            ResultCode::TimedOut => "timed out",
            ResultCode::InErrorState => "in error state",
            ResultCode::ControlLost => "control lost",
            ResultCode::DeadObject => "dead object",
        };
        write!(f, "{} ({})", name, self.raw())
    }
}
