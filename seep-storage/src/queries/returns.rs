//! function_returns table queries.
//!
//! `return_vars` is reconstructed from the `function_return_sources`
//! junction relation with `GROUP_CONCAT`.

use rusqlite::{params, Connection};
use seep_core::errors::StoreError;

use super::util::{normalize_path, split_concat, sql_err};

/// A function-return record from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnRow {
    pub file: String,
    pub line: i64,
    pub function_name: String,
    pub return_expr: String,
    pub return_vars: Vec<String>,
}

const RETURN_SELECT: &str = "
    SELECT fr.file, fr.line, fr.function_name, fr.return_expr,
           GROUP_CONCAT(frsrc.return_var_name, '|') AS return_vars_concat
    FROM function_returns fr
    LEFT JOIN function_return_sources frsrc
        ON fr.file = frsrc.return_file
        AND fr.line = frsrc.return_line
        AND fr.function_name = frsrc.return_function";

const RETURN_GROUP: &str = " GROUP BY fr.file, fr.line, fr.function_name";

fn map_return(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReturnRow> {
    Ok(ReturnRow {
        file: normalize_path(&row.get::<_, String>(0)?),
        line: row.get(1)?,
        function_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        return_expr: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        return_vars: split_concat(row.get(4)?),
    })
}

/// Load the entire returns relation with return_vars lists.
pub fn load_returns(conn: &Connection) -> Result<Vec<ReturnRow>, StoreError> {
    let sql = format!("{RETURN_SELECT}{RETURN_GROUP} ORDER BY fr.file, fr.line");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt.query_map([], map_return).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Return sites of one function in one file.
pub fn returns_of(
    conn: &Connection,
    file: &str,
    function: &str,
) -> Result<Vec<ReturnRow>, StoreError> {
    let sql = format!(
        "{RETURN_SELECT} WHERE fr.file = ?1 AND fr.function_name = ?2\
         {RETURN_GROUP} ORDER BY fr.line"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, function], map_return)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}
