//! Taint analysis errors.

use super::error_code::{self, SeepErrorCode};
use super::store_error::StoreError;

/// Errors that can occur during taint analysis.
///
/// Index-consistency variants indicate an indexer bug and fail the affected
/// function's analysis loudly instead of masking it with an empty result.
#[derive(Debug, thiserror::Error)]
pub enum TaintError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No CFG data for {function} in {file}")]
    MissingCfg { file: String, function: String },

    #[error("Inconsistent CFG for {function} in {file}: {detail}")]
    InconsistentCfg {
        file: String,
        function: String,
        detail: String,
    },

    #[error("Taint path too long ({length} nodes, max {max})")]
    PathTooLong { length: usize, max: usize },

    #[error("Analysis cancelled by host")]
    Cancelled,

    #[error("Failed to write report: {0}")]
    Report(String),
}

impl SeepErrorCode for TaintError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            _ => error_code::TAINT_ERROR,
        }
    }
}
