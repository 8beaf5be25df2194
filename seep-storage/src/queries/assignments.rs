//! assignments table queries.
//!
//! `source_vars` is reconstructed from the `assignment_sources` junction
//! relation with `GROUP_CONCAT` — the store hands back a real list, never a
//! JSON blob to parse.

use rusqlite::{params, Connection};
use seep_core::errors::StoreError;

use super::util::{normalize_path, split_concat, sql_err};

/// An assignment record from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRow {
    pub file: String,
    pub line: i64,
    pub target_var: String,
    pub source_expr: String,
    pub source_vars: Vec<String>,
    pub in_function: String,
}

const ASSIGNMENT_SELECT: &str = "
    SELECT a.file, a.line, a.target_var, a.source_expr, a.in_function,
           GROUP_CONCAT(asrc.source_var_name, '|') AS source_vars_concat
    FROM assignments a
    LEFT JOIN assignment_sources asrc
        ON a.file = asrc.assignment_file
        AND a.line = asrc.assignment_line
        AND a.target_var = asrc.assignment_target";

const ASSIGNMENT_GROUP: &str = " GROUP BY a.file, a.line, a.target_var";

fn map_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRow> {
    Ok(AssignmentRow {
        file: normalize_path(&row.get::<_, String>(0)?),
        line: row.get(1)?,
        target_var: row.get(2)?,
        source_expr: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        in_function: row
            .get::<_, Option<String>>(4)?
            .unwrap_or_else(|| "global".to_string()),
        source_vars: split_concat(row.get(5)?),
    })
}

/// Load the entire assignments relation with source_vars lists.
pub fn load_assignments(conn: &Connection) -> Result<Vec<AssignmentRow>, StoreError> {
    let sql = format!("{ASSIGNMENT_SELECT}{ASSIGNMENT_GROUP} ORDER BY a.file, a.line");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt.query_map([], map_assignment).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Assignments in one file within an inclusive line range.
pub fn assignments_in_range(
    conn: &Connection,
    file: &str,
    start: i64,
    end: i64,
) -> Result<Vec<AssignmentRow>, StoreError> {
    let sql = format!(
        "{ASSIGNMENT_SELECT} WHERE a.file = ?1 AND a.line BETWEEN ?2 AND ?3\
         {ASSIGNMENT_GROUP} ORDER BY a.line"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, start, end], map_assignment)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Assignments belonging to one function of one file.
pub fn assignments_in_function(
    conn: &Connection,
    file: &str,
    function: &str,
) -> Result<Vec<AssignmentRow>, StoreError> {
    let sql = format!(
        "{ASSIGNMENT_SELECT} WHERE a.file = ?1 AND a.in_function = ?2\
         {ASSIGNMENT_GROUP} ORDER BY a.line"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, function], map_assignment)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// All assignments of one file.
pub fn assignments_in_file(conn: &Connection, file: &str) -> Result<Vec<AssignmentRow>, StoreError> {
    let sql = format!("{ASSIGNMENT_SELECT} WHERE a.file = ?1{ASSIGNMENT_GROUP} ORDER BY a.line");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file], map_assignment)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}
