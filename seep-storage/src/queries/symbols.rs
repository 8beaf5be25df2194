//! symbols table queries.

use rusqlite::{params, Connection};
use seep_core::constants::LAST_FUNCTION_SPAN;
use seep_core::errors::StoreError;

use super::util::{normalize_path, sql_err};

/// A symbol record from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRow {
    pub file: String,
    pub name: String,
    pub symbol_type: String,
    pub line: i64,
    pub column: i64,
    pub end_line: Option<i64>,
}

/// A function reference: the enclosing function of some location.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRef {
    pub file: String,
    pub name: String,
    pub line: i64,
}

fn map_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        file: normalize_path(&row.get::<_, String>(0)?),
        name: row.get(1)?,
        symbol_type: row.get(2)?,
        line: row.get(3)?,
        column: row.get(4)?,
        end_line: row.get(5)?,
    })
}

const SYMBOL_COLUMNS: &str = "path, name, type, line, col, end_line";

/// Load the entire symbols relation, ordered for deterministic downstream use.
pub fn load_symbols(conn: &Connection) -> Result<Vec<SymbolRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols ORDER BY path, line, col"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], map_symbol).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Call-type symbols on lines strictly between `after` and `before`.
/// Used for the sanitizer-between check.
pub fn call_symbols_between(
    conn: &Connection,
    file: &str,
    after: i64,
    before: i64,
) -> Result<Vec<SymbolRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE path = ?1 AND type = 'call' AND line > ?2 AND line < ?3
             ORDER BY line"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, after, before], map_symbol)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// The function symbol enclosing `line` in `file`: the last function
/// definition at or before the line.
pub fn containing_function(
    conn: &Connection,
    file: &str,
    line: i64,
) -> Result<Option<FunctionRef>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT name, line FROM symbols
             WHERE path = ?1 AND type = 'function' AND line <= ?2
             ORDER BY line DESC LIMIT 1",
        )
        .map_err(sql_err)?;
    let mut rows = stmt
        .query_map(params![file, line], |row| {
            Ok(FunctionRef {
                file: normalize_path(file),
                name: row.get(0)?,
                line: row.get(1)?,
            })
        })
        .map_err(sql_err)?;
    match rows.next() {
        Some(Ok(f)) => Ok(Some(f)),
        Some(Err(e)) => Err(sql_err(e)),
        None => Ok(None),
    }
}

/// Inclusive line range of the function starting at `function_line`.
///
/// Prefers the symbol's own `end_line`; otherwise the next function
/// definition's line − 1; otherwise the file's maximum symbol line; the +200
/// heuristic is last resort.
pub fn function_range(
    conn: &Connection,
    file: &str,
    function_line: i64,
) -> Result<(i64, i64), StoreError> {
    let own_end: Option<i64> = conn
        .query_row(
            "SELECT end_line FROM symbols
             WHERE path = ?1 AND type = 'function' AND line = ?2 LIMIT 1",
            params![file, function_line],
            |row| row.get(0),
        )
        .unwrap_or(None);
    if let Some(end) = own_end {
        if end > function_line {
            return Ok((function_line, end));
        }
    }

    let next: Option<i64> = conn
        .query_row(
            "SELECT line FROM symbols
             WHERE path = ?1 AND type = 'function' AND line > ?2
             ORDER BY line LIMIT 1",
            params![file, function_line],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })
        .map_err(sql_err)?;
    if let Some(next_line) = next {
        return Ok((function_line, next_line - 1));
    }

    let max_line: Option<i64> = conn
        .query_row(
            "SELECT MAX(line) FROM symbols WHERE path = ?1",
            params![file],
            |row| row.get(0),
        )
        .map_err(sql_err)?;
    Ok((
        function_line,
        max_line.unwrap_or(function_line + LAST_FUNCTION_SPAN),
    ))
}

/// Count of network/download/scraping indicators within a window of lines.
/// Drives the external-source validation of file-I/O patterns.
pub fn network_indicators_near(
    conn: &Connection,
    file: &str,
    line: i64,
    window: i64,
) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT COUNT(*) FROM symbols
         WHERE path = ?1 AND line BETWEEN ?2 AND ?3
         AND (name LIKE '%request%' OR name LIKE '%download%'
              OR name LIKE '%fetch%' OR name LIKE '%scrape%'
              OR name LIKE '%BeautifulSoup%' OR name LIKE '%urlopen%')",
        params![file, line - window, line + window],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

/// Symbols matching a name exactly, restricted to the given types.
pub fn symbols_named(
    conn: &Connection,
    name: &str,
    types: &[&str],
) -> Result<Vec<SymbolRow>, StoreError> {
    let type_list = types
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE name = ?1 AND type IN ({type_list})
             ORDER BY path, line"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map(params![name], map_symbol).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Symbols whose name contains a pattern, restricted to the given types.
/// Used for dotted source patterns where qualified names substring-match.
pub fn symbols_containing(
    conn: &Connection,
    pattern: &str,
    types: &[&str],
) -> Result<Vec<SymbolRow>, StoreError> {
    let type_list = types
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE name LIKE ?1 AND type IN ({type_list})
             ORDER BY path, line"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![format!("%{pattern}%")], map_symbol)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Symbols whose qualified name ends with `.{suffix}`, restricted to calls.
pub fn call_symbols_with_suffix(
    conn: &Connection,
    suffix: &str,
) -> Result<Vec<SymbolRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE type = 'call' AND name LIKE ?1
             ORDER BY path, line"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![format!("%.{suffix}")], map_symbol)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// All function definition symbols, ordered by file and line.
pub fn function_symbols(conn: &Connection) -> Result<Vec<SymbolRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE type = 'function' ORDER BY path, line"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], map_symbol).map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Call symbols inside an inclusive line range of one file.
pub fn call_symbols_in_range(
    conn: &Connection,
    file: &str,
    start: i64,
    end: i64,
) -> Result<Vec<SymbolRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE path = ?1 AND type = 'call' AND line >= ?2 AND line <= ?3
             ORDER BY line"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![file, start, end], map_symbol)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}
