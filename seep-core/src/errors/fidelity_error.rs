//! Fidelity reconciliation errors.

use super::error_code::{self, SeepErrorCode};

/// Raised when a fidelity check fails in strict mode.
#[derive(Debug, thiserror::Error)]
#[error("Fidelity FAILED at {stage}: {message}")]
pub struct FidelityError {
    pub stage: String,
    pub message: String,
}

impl SeepErrorCode for FidelityError {
    fn error_code(&self) -> &'static str {
        error_code::FIDELITY_ERROR
    }
}
