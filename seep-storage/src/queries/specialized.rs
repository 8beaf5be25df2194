//! Specialized relation queries: extracted SQL text, ORM queries, UI hooks,
//! variable usage, API endpoints, JWT patterns, and object literals.
//!
//! Sink discovery draws from the most specific of these relations before
//! falling back to the symbols table.

use rusqlite::{params, Connection};
use seep_core::errors::StoreError;

use super::util::{normalize_path, split_concat, sql_err};

/// An extracted SQL query from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQueryRow {
    pub file: String,
    pub line: i64,
    pub query_text: String,
    pub command: String,
}

/// An ORM query site. Every ORM query is an implicit SQL sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OrmQueryRow {
    pub file: String,
    pub line: i64,
    pub query_type: String,
    pub includes: String,
}

/// A UI hook dependency row (dangerous-set-HTML style sinks live here).
#[derive(Debug, Clone, PartialEq)]
pub struct UiHookRow {
    pub file: String,
    pub line: i64,
    pub hook_name: String,
    pub dependencies: Vec<String>,
}

/// A variable usage site.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableUsageRow {
    pub file: String,
    pub line: i64,
    pub variable_name: String,
    pub usage_type: String,
    pub in_component: String,
}

/// An API endpoint definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEndpointRow {
    pub file: String,
    pub line: i64,
    pub method: String,
    pub pattern: String,
    pub path: String,
    pub has_auth: bool,
    pub handler_function: String,
    pub controls: Vec<String>,
}

/// A JWT usage pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtPatternRow {
    pub file: String,
    pub line: i64,
    pub pattern_type: String,
    pub pattern_text: String,
    pub secret_source: Option<String>,
    pub algorithm: Option<String>,
}

/// One property of an object literal; function-typed properties are the
/// dispatch targets of `obj[key]()` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLiteralRow {
    pub file: String,
    pub line: i64,
    pub variable_name: String,
    pub property_name: String,
    pub property_value: String,
    pub property_type: String,
}

/// Load extracted SQL queries, skipping empty and unparsed rows.
pub fn load_sql_queries(conn: &Connection) -> Result<Vec<SqlQueryRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file_path, line_number, query_text, command FROM sql_queries
             WHERE query_text IS NOT NULL AND query_text != '' AND command != 'UNKNOWN'
             ORDER BY file_path, line_number",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SqlQueryRow {
                file: normalize_path(&row.get::<_, String>(0)?),
                line: row.get(1)?,
                query_text: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                command: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Load ORM query sites with a known query type.
pub fn load_orm_queries(conn: &Connection) -> Result<Vec<OrmQueryRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, query_type, includes FROM orm_queries
             WHERE query_type IS NOT NULL ORDER BY file, line",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(OrmQueryRow {
                file: normalize_path(&row.get::<_, String>(0)?),
                line: row.get(1)?,
                query_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                includes: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Load UI hooks with their dependency lists reconstructed from the
/// junction relation.
pub fn load_ui_hooks(conn: &Connection) -> Result<Vec<UiHookRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT h.file, h.line, h.hook_name,
                    GROUP_CONCAT(d.dependency_name, '|') AS deps_concat
             FROM react_hooks h
             LEFT JOIN react_hook_dependencies d
                 ON h.file = d.hook_file AND h.line = d.hook_line AND h.hook_name = d.hook_name
             GROUP BY h.file, h.line, h.hook_name
             ORDER BY h.file, h.line",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(UiHookRow {
                file: normalize_path(&row.get::<_, String>(0)?),
                line: row.get(1)?,
                hook_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                dependencies: split_concat(row.get(3)?),
            })
        })
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Load the variable usage relation.
pub fn load_variable_usage(conn: &Connection) -> Result<Vec<VariableUsageRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, variable_name, usage_type, in_component
             FROM variable_usage ORDER BY file, line",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(VariableUsageRow {
                file: normalize_path(&row.get::<_, String>(0)?),
                line: row.get(1)?,
                variable_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                usage_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                in_component: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            })
        })
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Whether a variable is used anywhere inside a line range of a file.
pub fn variable_used_in_range(
    conn: &Connection,
    file: &str,
    variable: &str,
    start: i64,
    end: i64,
) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM variable_usage
             WHERE file = ?1 AND variable_name = ?2 AND line >= ?3 AND line <= ?4",
            params![file, variable, start, end],
            |row| row.get(0),
        )
        .map_err(sql_err)?;
    Ok(count > 0)
}

/// Load API endpoints with their control lists.
pub fn load_api_endpoints(conn: &Connection) -> Result<Vec<ApiEndpointRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT e.file, e.line, e.method, e.pattern, e.path, e.has_auth, e.handler_function,
                    GROUP_CONCAT(c.control_name, '|') AS controls_concat
             FROM api_endpoints e
             LEFT JOIN api_endpoint_controls c
                 ON e.file = c.endpoint_file AND e.line = c.endpoint_line
             GROUP BY e.file, e.line, e.method, e.pattern, e.path, e.has_auth, e.handler_function
             ORDER BY e.file, e.line",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ApiEndpointRow {
                file: normalize_path(&row.get::<_, String>(0)?),
                line: row.get(1)?,
                method: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                pattern: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                path: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                has_auth: row.get::<_, i64>(5)? != 0,
                handler_function: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                controls: split_concat(row.get(7)?),
            })
        })
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Load JWT patterns.
pub fn load_jwt_patterns(conn: &Connection) -> Result<Vec<JwtPatternRow>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file_path, line_number, pattern_type, pattern_text, secret_source, algorithm
             FROM jwt_patterns ORDER BY file_path, line_number",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(JwtPatternRow {
                file: normalize_path(&row.get::<_, String>(0)?),
                line: row.get(1)?,
                pattern_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                pattern_text: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                secret_source: row.get(4)?,
                algorithm: row.get(5)?,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Load the optional object_literals relation. Returns empty when absent.
pub fn load_object_literals(conn: &Connection) -> Result<Vec<ObjectLiteralRow>, StoreError> {
    if !crate::schema::has_table(conn, "object_literals")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare_cached(
            "SELECT file, line, variable_name, property_name, property_value, property_type
             FROM object_literals ORDER BY file, line",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ObjectLiteralRow {
                file: normalize_path(&row.get::<_, String>(0)?),
                line: row.get(1)?,
                variable_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                property_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                property_value: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                property_type: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            })
        })
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

/// Function-reference properties of an object literal variable. These are
/// the candidate callees for dynamic dispatch through `obj[key]`.
pub fn object_literal_callees(
    conn: &Connection,
    variable: &str,
) -> Result<Vec<String>, StoreError> {
    if !crate::schema::has_table(conn, "object_literals")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare_cached(
            "SELECT property_value FROM object_literals
             WHERE variable_name = ?1 AND property_type IN ('function_ref', 'shorthand')",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![variable], |row| row.get::<_, String>(0))
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}
