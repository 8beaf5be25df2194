//! Schema contract for the indexed store.
//!
//! The producer guarantees field names and types are stable. Required tables
//! must exist for any analysis; optional tables are probed once at preload
//! and enable deeper resolution when present.

use rusqlite::Connection;
use seep_core::errors::StoreError;

use crate::queries::util::sql_err;

/// Relations every index must provide.
pub const REQUIRED_TABLES: &[&str] = &[
    "symbols",
    "function_call_args",
    "function_returns",
    "function_return_sources",
    "cfg_blocks",
    "cfg_edges",
    "cfg_block_statements",
    "sql_queries",
    "orm_queries",
    "react_hooks",
    "react_hook_dependencies",
    "variable_usage",
    "api_endpoints",
    "api_endpoint_controls",
    "jwt_patterns",
];

/// Relations that may be absent on older indexes.
pub const OPTIONAL_TABLES: &[&str] = &["assignments", "assignment_sources", "object_literals"];

/// Which optional relations the store provides.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalTables {
    pub assignments: bool,
    pub object_literals: bool,
}

/// Check whether a table exists in the store.
pub fn has_table(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .map_err(sql_err)?;
    Ok(count > 0)
}

/// Verify every required relation exists. Fails with the first missing table.
pub fn verify_contract(conn: &Connection) -> Result<(), StoreError> {
    for table in REQUIRED_TABLES {
        if !has_table(conn, table)? {
            return Err(StoreError::MissingTable {
                table: (*table).to_string(),
            });
        }
    }
    Ok(())
}

/// Probe optional relations once; callers branch on the result instead of
/// re-querying sqlite_master.
pub fn probe_optional(conn: &Connection) -> Result<OptionalTables, StoreError> {
    Ok(OptionalTables {
        assignments: has_table(conn, "assignments")? && has_table(conn, "assignment_sources")?,
        object_literals: has_table(conn, "object_literals")?,
    })
}

/// Create the full contract schema on a connection.
///
/// The engine never writes the index; this exists for fixtures and contract
/// tests that need a store shaped exactly like the producer's output.
pub fn apply_fixture_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE symbols (
            path TEXT NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            line INTEGER NOT NULL,
            col INTEGER NOT NULL DEFAULT 0,
            end_line INTEGER
        );
        CREATE TABLE assignments (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            target_var TEXT NOT NULL,
            source_expr TEXT NOT NULL DEFAULT '',
            in_function TEXT NOT NULL DEFAULT 'global'
        );
        CREATE TABLE assignment_sources (
            assignment_file TEXT NOT NULL,
            assignment_line INTEGER NOT NULL,
            assignment_target TEXT NOT NULL,
            source_var_name TEXT NOT NULL
        );
        CREATE TABLE function_call_args (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            caller_function TEXT NOT NULL DEFAULT 'global',
            callee_function TEXT NOT NULL,
            param_name TEXT NOT NULL DEFAULT '',
            argument_expr TEXT NOT NULL DEFAULT '',
            target_var TEXT
        );
        CREATE TABLE function_returns (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            function_name TEXT NOT NULL,
            return_expr TEXT NOT NULL DEFAULT ''
        );
        CREATE TABLE function_return_sources (
            return_file TEXT NOT NULL,
            return_line INTEGER NOT NULL,
            return_function TEXT NOT NULL,
            return_var_name TEXT NOT NULL
        );
        CREATE TABLE cfg_blocks (
            id INTEGER NOT NULL,
            file TEXT NOT NULL,
            function_name TEXT NOT NULL,
            block_type TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            condition_expr TEXT
        );
        CREATE TABLE cfg_edges (
            id INTEGER NOT NULL,
            file TEXT NOT NULL,
            function_name TEXT NOT NULL,
            source_block_id INTEGER NOT NULL,
            target_block_id INTEGER NOT NULL,
            edge_type TEXT NOT NULL DEFAULT 'normal'
        );
        CREATE TABLE cfg_block_statements (
            block_id INTEGER NOT NULL,
            statement_type TEXT NOT NULL,
            line INTEGER NOT NULL,
            statement_text TEXT NOT NULL DEFAULT '',
            statement_order INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE sql_queries (
            file_path TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            query_text TEXT,
            command TEXT
        );
        CREATE TABLE orm_queries (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            query_type TEXT,
            includes TEXT
        );
        CREATE TABLE react_hooks (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            hook_name TEXT NOT NULL
        );
        CREATE TABLE react_hook_dependencies (
            hook_file TEXT NOT NULL,
            hook_line INTEGER NOT NULL,
            hook_name TEXT NOT NULL,
            dependency_name TEXT NOT NULL
        );
        CREATE TABLE variable_usage (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            variable_name TEXT NOT NULL,
            usage_type TEXT NOT NULL DEFAULT '',
            in_component TEXT NOT NULL DEFAULT ''
        );
        CREATE TABLE api_endpoints (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            method TEXT NOT NULL,
            pattern TEXT NOT NULL DEFAULT '',
            path TEXT NOT NULL DEFAULT '',
            has_auth INTEGER NOT NULL DEFAULT 0,
            handler_function TEXT NOT NULL DEFAULT ''
        );
        CREATE TABLE api_endpoint_controls (
            endpoint_file TEXT NOT NULL,
            endpoint_line INTEGER NOT NULL,
            control_name TEXT NOT NULL
        );
        CREATE TABLE jwt_patterns (
            file_path TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            pattern_type TEXT NOT NULL DEFAULT '',
            pattern_text TEXT NOT NULL DEFAULT '',
            secret_source TEXT,
            algorithm TEXT
        );
        CREATE TABLE object_literals (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            variable_name TEXT NOT NULL,
            property_name TEXT NOT NULL,
            property_value TEXT NOT NULL,
            property_type TEXT NOT NULL DEFAULT ''
        );
        ",
    )
    .map_err(sql_err)
}
