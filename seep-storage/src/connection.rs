//! Read-only connections to the index store.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use seep_core::errors::StoreError;

/// Open the index store read-only. The engine never mutates the index.
pub fn open_read_only(path: &Path) -> Result<Connection, StoreError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StoreError::Open {
        message: e.to_string(),
    })
}
