//! Index store access errors.

use super::error_code::{self, SeepErrorCode};

/// Errors raised while reading the externally produced index store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open index store: {message}")]
    Open { message: String },

    #[error("Index query failed: {message}")]
    Query { message: String },

    #[error("Required relation missing from index: {table}")]
    MissingTable { table: String },
}

impl SeepErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingTable { .. } => error_code::MISSING_TABLE,
            _ => error_code::STORE_ERROR,
        }
    }
}
