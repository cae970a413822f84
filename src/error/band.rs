// Band table correction errors

use thiserror::Error;

use crate::effects::band_corrector::Violations;
use crate::error::ErrorCode;

/// Band table error code constants.
///
/// Error code range: 4001-4002
pub struct BandTableErrorCodes {}

impl BandTableErrorCodes {
    /// Centers and ranges have different lengths
    pub const MALFORMED: i32 = 4001;

    /// Correction left violations behind
    pub const UNREPAIRABLE: i32 = 4002;
}

/// Failures reported by the band range corrector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BandTableError {
    #[error("malformed band table: {reason}")]
    Malformed { reason: String },

    #[error("band table could not be repaired (remaining violations: {remaining:?})")]
    Unrepairable { remaining: Violations },
}

impl ErrorCode for BandTableError {
    fn code(&self) -> i32 {
        match self {
            BandTableError::Malformed { .. } => BandTableErrorCodes::MALFORMED,
            BandTableError::Unrepairable { .. } => BandTableErrorCodes::UNREPAIRABLE,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}
