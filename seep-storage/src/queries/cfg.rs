//! CFG relation queries: blocks, edges, block statements.

use rusqlite::{params, Connection};
use seep_core::errors::StoreError;

use super::util::{normalize_path, sql_err};

/// A CFG basic block. Block ids are unique per function.
#[derive(Debug, Clone, PartialEq)]
pub struct CfgBlockRow {
    pub id: i64,
    pub file: String,
    pub function_name: String,
    pub block_type: String,
    pub start_line: i64,
    pub end_line: i64,
    pub condition_expr: Option<String>,
}

/// A labeled CFG edge between two blocks of the same function.
#[derive(Debug, Clone, PartialEq)]
pub struct CfgEdgeRow {
    pub id: i64,
    pub file: String,
    pub function_name: String,
    pub source_block_id: i64,
    pub target_block_id: i64,
    pub edge_type: String,
}

/// A statement located inside a block. Used only to locate calls and
/// returns, never for semantic parsing of the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct CfgStatementRow {
    pub block_id: i64,
    pub statement_type: String,
    pub line: i64,
    pub statement_text: String,
    pub statement_order: i64,
}

const BLOCK_COLUMNS: &str = "id, file, function_name, block_type, start_line, end_line, condition_expr";
const EDGE_COLUMNS: &str = "id, file, function_name, source_block_id, target_block_id, edge_type";
const STATEMENT_COLUMNS: &str = "block_id, statement_type, line, statement_text, statement_order";

fn map_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<CfgBlockRow> {
    Ok(CfgBlockRow {
        id: row.get(0)?,
        file: normalize_path(&row.get::<_, String>(1)?),
        function_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        block_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        start_line: row.get(4)?,
        end_line: row.get(5)?,
        condition_expr: row.get(6)?,
    })
}

fn map_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<CfgEdgeRow> {
    Ok(CfgEdgeRow {
        id: row.get(0)?,
        file: normalize_path(&row.get::<_, String>(1)?),
        function_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        source_block_id: row.get(3)?,
        target_block_id: row.get(4)?,
        edge_type: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

fn map_statement(row: &rusqlite::Row<'_>) -> rusqlite::Result<CfgStatementRow> {
    Ok(CfgStatementRow {
        block_id: row.get(0)?,
        statement_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        line: row.get(2)?,
        statement_text: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        statement_order: row.get(4)?,
    })
}

/// Load the entire cfg_blocks relation.
pub fn load_blocks(conn: &Connection) -> Result<Vec<CfgBlockRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {BLOCK_COLUMNS} FROM cfg_blocks ORDER BY file, function_name, id"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], map_block).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Load the entire cfg_edges relation.
pub fn load_edges(conn: &Connection) -> Result<Vec<CfgEdgeRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM cfg_edges ORDER BY file, function_name, id"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], map_edge).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Load the entire cfg_block_statements relation.
pub fn load_statements(conn: &Connection) -> Result<Vec<CfgStatementRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {STATEMENT_COLUMNS} FROM cfg_block_statements
             ORDER BY block_id, statement_order"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], map_statement).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Whether any CFG data exists for a file.
pub fn cfg_available(conn: &Connection, file: &str) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM cfg_blocks WHERE file = ?1",
            params![file],
            |row| row.get(0),
        )
        .map_err(sql_err)?;
    Ok(count > 0)
}

/// Whether a condition or loop-condition block sits strictly between two
/// lines of a file. Drives the "is flow-sensitive analysis worth it" check.
pub fn has_conditional_blocks_between(
    conn: &Connection,
    file: &str,
    after: i64,
    before: i64,
) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM cfg_blocks
             WHERE file = ?1 AND block_type IN ('condition', 'loop_condition')
             AND start_line > ?2 AND end_line < ?3",
            params![file, after, before],
            |row| row.get(0),
        )
        .map_err(sql_err)?;
    Ok(count > 0)
}

/// Blocks of one function. Function names here are CFG stems, not the
/// qualified names the assignments and call-args relations carry.
pub fn blocks_for_function(
    conn: &Connection,
    file: &str,
    function: &str,
) -> Result<Vec<CfgBlockRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {BLOCK_COLUMNS} FROM cfg_blocks
             WHERE file = ?1 AND function_name = ?2 ORDER BY id"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, function], map_block)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Edges of one function.
pub fn edges_for_function(
    conn: &Connection,
    file: &str,
    function: &str,
) -> Result<Vec<CfgEdgeRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM cfg_edges
             WHERE file = ?1 AND function_name = ?2 ORDER BY id"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, function], map_edge)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Statements of one block, in statement order.
pub fn statements_for_block(
    conn: &Connection,
    block_id: i64,
) -> Result<Vec<CfgStatementRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {STATEMENT_COLUMNS} FROM cfg_block_statements
             WHERE block_id = ?1 ORDER BY statement_order"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![block_id], map_statement)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}
