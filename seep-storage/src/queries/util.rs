//! Shared query helpers.

use seep_core::errors::StoreError;

/// Convert a rusqlite error into a `StoreError`.
pub fn sql_err(e: rusqlite::Error) -> StoreError {
    StoreError::Query {
        message: e.to_string(),
    }
}

/// Normalize a path to forward slashes. Applied once, at the load boundary.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Split a `GROUP_CONCAT` junction column back into its list form.
pub fn split_concat(concat: Option<String>) -> Vec<String> {
    match concat {
        Some(s) if !s.is_empty() => s.split('|').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}
