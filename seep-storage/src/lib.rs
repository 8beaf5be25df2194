//! # seep-storage
//!
//! Read-only access to the externally produced SQLite index the taint engine
//! consumes. The indexer that populates the store is out of scope; this crate
//! only honors its schema contract: typed row structs, one query module per
//! relation, junction-table reconstruction via `GROUP_CONCAT`, and
//! forward-slash path normalization at the load boundary.

pub mod connection;
pub mod queries;
pub mod schema;
