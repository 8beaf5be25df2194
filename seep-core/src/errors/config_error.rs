//! Configuration errors.

use super::error_code::{self, SeepErrorCode};

/// Errors raised while building or loading an analysis configuration.
/// These reject synchronously; no partial analysis runs on a bad config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown pattern category: {0}")]
    UnknownCategory(String),

    #[error("Invalid pattern override: {0}")]
    InvalidOverride(String),

    #[error("Failed to read pattern file {path}: {message}")]
    PatternFile { path: String, message: String },

    #[error("Failed to parse pattern file: {0}")]
    PatternParse(String),
}

impl SeepErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        error_code::CONFIG_ERROR
    }
}
