//! function_call_args table queries.
//!
//! One row per argument site, joining the caller scope to the callee
//! parameter name.

use rusqlite::{params, Connection};
use seep_core::errors::StoreError;

use super::util::{normalize_path, sql_err};

/// A call-argument record from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgRow {
    pub file: String,
    pub line: i64,
    pub caller_function: String,
    pub callee_function: String,
    pub param_name: String,
    pub argument_expr: String,
    /// Variable the call's return value is assigned to, when the indexer
    /// recorded one.
    pub target_var: Option<String>,
}

const CALL_ARG_COLUMNS: &str =
    "file, line, caller_function, callee_function, param_name, argument_expr, target_var";

fn map_call_arg(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallArgRow> {
    Ok(CallArgRow {
        file: normalize_path(&row.get::<_, String>(0)?),
        line: row.get(1)?,
        caller_function: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| "global".to_string()),
        callee_function: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        param_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        argument_expr: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        target_var: row.get(6)?,
    })
}

/// Load the entire call-args relation.
pub fn load_call_args(conn: &Connection) -> Result<Vec<CallArgRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CALL_ARG_COLUMNS} FROM function_call_args ORDER BY file, line"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], map_call_arg).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Argument sites inside one caller function.
pub fn call_args_by_caller(
    conn: &Connection,
    file: &str,
    caller: &str,
) -> Result<Vec<CallArgRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CALL_ARG_COLUMNS} FROM function_call_args
             WHERE file = ?1 AND caller_function = ?2 ORDER BY line"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, caller], map_call_arg)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Argument sites at an exact line. Used to inspect the call at a sink.
pub fn call_args_at_line(
    conn: &Connection,
    file: &str,
    line: i64,
) -> Result<Vec<CallArgRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CALL_ARG_COLUMNS} FROM function_call_args
             WHERE file = ?1 AND line = ?2"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, line], map_call_arg)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Call sites of one callee within a file. Used to map return values back
/// into callers.
pub fn call_sites_of(
    conn: &Connection,
    file: &str,
    callee: &str,
) -> Result<Vec<CallArgRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CALL_ARG_COLUMNS} FROM function_call_args
             WHERE file = ?1 AND callee_function = ?2 ORDER BY line"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, callee], map_call_arg)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Argument sites inside a caller function restricted to a line range.
/// Used by the inter-procedural replay over CFG blocks.
pub fn call_args_in_range(
    conn: &Connection,
    file: &str,
    caller: &str,
    start: i64,
    end: i64,
) -> Result<Vec<CallArgRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {CALL_ARG_COLUMNS} FROM function_call_args
             WHERE file = ?1 AND caller_function = ?2 AND line >= ?3 AND line <= ?4
             ORDER BY line"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, caller, start, end], map_call_arg)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}
