//! Shared fixture helpers: an in-memory store shaped by the schema
//! contract, plus row insertion shorthands.

#![allow(dead_code)]

use rusqlite::{params, Connection};
use seep_storage::schema;

pub fn store() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::apply_fixture_schema(&conn).unwrap();
    conn
}

pub fn insert_symbol(conn: &Connection, file: &str, name: &str, symbol_type: &str, line: i64) {
    conn.execute(
        "INSERT INTO symbols (path, name, type, line, col) VALUES (?1, ?2, ?3, ?4, 0)",
        params![file, name, symbol_type, line],
    )
    .unwrap();
}

pub fn insert_function(conn: &Connection, file: &str, name: &str, line: i64, end_line: i64) {
    conn.execute(
        "INSERT INTO symbols (path, name, type, line, col, end_line) VALUES (?1, ?2, 'function', ?3, 0, ?4)",
        params![file, name, line, end_line],
    )
    .unwrap();
}

pub fn insert_assignment(
    conn: &Connection,
    file: &str,
    line: i64,
    target: &str,
    expr: &str,
    function: &str,
    source_vars: &[&str],
) {
    conn.execute(
        "INSERT INTO assignments (file, line, target_var, source_expr, in_function)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![file, line, target, expr, function],
    )
    .unwrap();
    for var in source_vars {
        conn.execute(
            "INSERT INTO assignment_sources
             (assignment_file, assignment_line, assignment_target, source_var_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![file, line, target, var],
        )
        .unwrap();
    }
}

#[allow(clippy::too_many_arguments)]
pub fn insert_call_arg(
    conn: &Connection,
    file: &str,
    line: i64,
    caller: &str,
    callee: &str,
    param: &str,
    arg_expr: &str,
    target_var: Option<&str>,
) {
    conn.execute(
        "INSERT INTO function_call_args
         (file, line, caller_function, callee_function, param_name, argument_expr, target_var)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![file, line, caller, callee, param, arg_expr, target_var],
    )
    .unwrap();
}

pub fn insert_return(
    conn: &Connection,
    file: &str,
    line: i64,
    function: &str,
    expr: &str,
    return_vars: &[&str],
) {
    conn.execute(
        "INSERT INTO function_returns (file, line, function_name, return_expr)
         VALUES (?1, ?2, ?3, ?4)",
        params![file, line, function, expr],
    )
    .unwrap();
    for var in return_vars {
        conn.execute(
            "INSERT INTO function_return_sources
             (return_file, return_line, return_function, return_var_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![file, line, function, var],
        )
        .unwrap();
    }
}

#[allow(clippy::too_many_arguments)]
pub fn insert_cfg_block(
    conn: &Connection,
    id: i64,
    file: &str,
    function: &str,
    block_type: &str,
    start_line: i64,
    end_line: i64,
    condition: Option<&str>,
) {
    conn.execute(
        "INSERT INTO cfg_blocks (id, file, function_name, block_type, start_line, end_line, condition_expr)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, file, function, block_type, start_line, end_line, condition],
    )
    .unwrap();
}

pub fn insert_cfg_edge(
    conn: &Connection,
    id: i64,
    file: &str,
    function: &str,
    source_block: i64,
    target_block: i64,
    edge_type: &str,
) {
    conn.execute(
        "INSERT INTO cfg_edges (id, file, function_name, source_block_id, target_block_id, edge_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, file, function, source_block, target_block, edge_type],
    )
    .unwrap();
}

pub fn insert_cfg_statement(
    conn: &Connection,
    block_id: i64,
    statement_type: &str,
    line: i64,
    text: &str,
    order: i64,
) {
    conn.execute(
        "INSERT INTO cfg_block_statements (block_id, statement_type, line, statement_text, statement_order)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![block_id, statement_type, line, text, order],
    )
    .unwrap();
}

pub fn insert_sql_query(conn: &Connection, file: &str, line: i64, text: &str, command: &str) {
    conn.execute(
        "INSERT INTO sql_queries (file_path, line_number, query_text, command) VALUES (?1, ?2, ?3, ?4)",
        params![file, line, text, command],
    )
    .unwrap();
}

pub fn insert_orm_query(conn: &Connection, file: &str, line: i64, query_type: &str) {
    conn.execute(
        "INSERT INTO orm_queries (file, line, query_type, includes) VALUES (?1, ?2, ?3, '')",
        params![file, line, query_type],
    )
    .unwrap();
}

pub fn insert_object_literal(
    conn: &Connection,
    file: &str,
    variable: &str,
    property: &str,
    value: &str,
    property_type: &str,
) {
    conn.execute(
        "INSERT INTO object_literals (file, line, variable_name, property_name, property_value, property_type)
         VALUES (?1, 1, ?2, ?3, ?4, ?5)",
        params![file, variable, property, value, property_type],
    )
    .unwrap();
}

pub fn insert_variable_usage(conn: &Connection, file: &str, line: i64, variable: &str, usage: &str) {
    conn.execute(
        "INSERT INTO variable_usage (file, line, variable_name, usage_type, in_component)
         VALUES (?1, ?2, ?3, ?4, '')",
        params![file, line, variable, usage],
    )
    .unwrap();
}
