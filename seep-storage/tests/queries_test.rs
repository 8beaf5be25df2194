//! Contract and query tests over an in-memory fixture store.

use rusqlite::{params, Connection};
use seep_storage::queries::{assignments, call_args, cfg, returns, specialized, symbols};
use seep_storage::schema;

fn fixture_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::apply_fixture_schema(&conn).unwrap();
    conn
}

#[test]
fn contract_verification_passes_on_fixture() {
    let conn = fixture_connection();
    schema::verify_contract(&conn).unwrap();
    let optional = schema::probe_optional(&conn).unwrap();
    assert!(optional.assignments);
    assert!(optional.object_literals);
}

#[test]
fn contract_verification_fails_on_missing_table() {
    let conn = Connection::open_in_memory().unwrap();
    schema::apply_fixture_schema(&conn).unwrap();
    conn.execute_batch("DROP TABLE sql_queries").unwrap();
    let err = schema::verify_contract(&conn).unwrap_err();
    assert!(err.to_string().contains("sql_queries"), "got: {err}");
}

#[test]
fn symbol_paths_are_normalized_on_load() {
    let conn = fixture_connection();
    conn.execute(
        "INSERT INTO symbols (path, name, type, line, col) VALUES (?1, ?2, ?3, ?4, ?5)",
        params!["src\\api\\users.ts", "getUser", "function", 10, 0],
    )
    .unwrap();

    let rows = symbols::load_symbols(&conn).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file, "src/api/users.ts");
}

#[test]
fn assignment_source_vars_come_from_junction() {
    let conn = fixture_connection();
    conn.execute(
        "INSERT INTO assignments (file, line, target_var, source_expr, in_function)
         VALUES ('app.py', 12, 'query', 'base + user_id', 'handler')",
        [],
    )
    .unwrap();
    for var in ["base", "user_id"] {
        conn.execute(
            "INSERT INTO assignment_sources
             (assignment_file, assignment_line, assignment_target, source_var_name)
             VALUES ('app.py', 12, 'query', ?1)",
            params![var],
        )
        .unwrap();
    }

    let rows = assignments::load_assignments(&conn).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_vars, vec!["base", "user_id"]);
    assert_eq!(rows[0].in_function, "handler");

    let by_func = assignments::assignments_in_function(&conn, "app.py", "handler").unwrap();
    assert_eq!(by_func.len(), 1);
    assert!(assignments::assignments_in_function(&conn, "app.py", "other")
        .unwrap()
        .is_empty());
}

#[test]
fn return_vars_come_from_junction() {
    let conn = fixture_connection();
    conn.execute(
        "INSERT INTO function_returns (file, line, function_name, return_expr)
         VALUES ('app.js', 5, 'getName', 'name')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO function_return_sources
         (return_file, return_line, return_function, return_var_name)
         VALUES ('app.js', 5, 'getName', 'name')",
        [],
    )
    .unwrap();

    let rows = returns::returns_of(&conn, "app.js", "getName").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].return_vars, vec!["name"]);
}

#[test]
fn function_range_uses_next_function_line() {
    let conn = fixture_connection();
    for (name, line) in [("first", 10), ("second", 40)] {
        conn.execute(
            "INSERT INTO symbols (path, name, type, line, col) VALUES ('a.py', ?1, 'function', ?2, 0)",
            params![name, line],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO symbols (path, name, type, line, col) VALUES ('a.py', 'execute', 'call', 55, 4)",
        [],
    )
    .unwrap();

    assert_eq!(symbols::function_range(&conn, "a.py", 10).unwrap(), (10, 39));
    // Last function runs to the file's maximum symbol line.
    assert_eq!(symbols::function_range(&conn, "a.py", 40).unwrap(), (40, 55));
}

#[test]
fn function_range_prefers_end_line_attribute() {
    let conn = fixture_connection();
    conn.execute(
        "INSERT INTO symbols (path, name, type, line, col, end_line)
         VALUES ('a.py', 'first', 'function', 10, 0, 25)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO symbols (path, name, type, line, col) VALUES ('a.py', 'second', 'function', 40, 0)",
        [],
    )
    .unwrap();

    assert_eq!(symbols::function_range(&conn, "a.py", 10).unwrap(), (10, 25));
}

#[test]
fn containing_function_finds_last_definition_before_line() {
    let conn = fixture_connection();
    for (name, line) in [("outer", 5), ("inner", 20)] {
        conn.execute(
            "INSERT INTO symbols (path, name, type, line, col) VALUES ('a.js', ?1, 'function', ?2, 0)",
            params![name, line],
        )
        .unwrap();
    }

    let f = symbols::containing_function(&conn, "a.js", 25).unwrap().unwrap();
    assert_eq!(f.name, "inner");
    let f = symbols::containing_function(&conn, "a.js", 10).unwrap().unwrap();
    assert_eq!(f.name, "outer");
    assert!(symbols::containing_function(&conn, "a.js", 2).unwrap().is_none());
}

#[test]
fn call_symbols_between_is_strictly_between() {
    let conn = fixture_connection();
    for (name, line) in [("sanitize", 10), ("edge", 20)] {
        conn.execute(
            "INSERT INTO symbols (path, name, type, line, col) VALUES ('a.js', ?1, 'call', ?2, 0)",
            params![name, line],
        )
        .unwrap();
    }

    let between = symbols::call_symbols_between(&conn, "a.js", 5, 20).unwrap();
    assert_eq!(between.len(), 1);
    assert_eq!(between[0].name, "sanitize");
}

#[test]
fn call_args_lookups() {
    let conn = fixture_connection();
    conn.execute(
        "INSERT INTO function_call_args
         (file, line, caller_function, callee_function, param_name, argument_expr, target_var)
         VALUES ('a.js', 7, 'handler', 'getName', 'r', 'req', 'name')",
        [],
    )
    .unwrap();

    let by_caller = call_args::call_args_by_caller(&conn, "a.js", "handler").unwrap();
    assert_eq!(by_caller.len(), 1);
    assert_eq!(by_caller[0].param_name, "r");
    assert_eq!(by_caller[0].target_var.as_deref(), Some("name"));

    let at_line = call_args::call_args_at_line(&conn, "a.js", 7).unwrap();
    assert_eq!(at_line.len(), 1);

    let sites = call_args::call_sites_of(&conn, "a.js", "getName").unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].caller_function, "handler");
}

#[test]
fn cfg_round_trip() {
    let conn = fixture_connection();
    conn.execute_batch(
        "INSERT INTO cfg_blocks (id, file, function_name, block_type, start_line, end_line)
         VALUES (1, 'a.py', 'handler', 'entry', 1, 2),
                (2, 'a.py', 'handler', 'exit', 9, 10);
         INSERT INTO cfg_edges (id, file, function_name, source_block_id, target_block_id, edge_type)
         VALUES (1, 'a.py', 'handler', 1, 2, 'normal');
         INSERT INTO cfg_block_statements (block_id, statement_type, line, statement_text, statement_order)
         VALUES (1, 'call', 2, 'sanitize(x)', 0);",
    )
    .unwrap();

    assert!(cfg::cfg_available(&conn, "a.py").unwrap());
    assert!(!cfg::cfg_available(&conn, "b.py").unwrap());

    let blocks = cfg::blocks_for_function(&conn, "a.py", "handler").unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].block_type, "entry");

    let edges = cfg::edges_for_function(&conn, "a.py", "handler").unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].edge_type, "normal");

    let stmts = cfg::statements_for_block(&conn, 1).unwrap();
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].statement_type, "call");
}

#[test]
fn sql_queries_skip_unknown_commands() {
    let conn = fixture_connection();
    conn.execute_batch(
        "INSERT INTO sql_queries (file_path, line_number, query_text, command)
         VALUES ('a.py', 3, 'SELECT * FROM t', 'SELECT'),
                ('a.py', 4, '', 'SELECT'),
                ('a.py', 5, 'whatever', 'UNKNOWN');",
    )
    .unwrap();

    let rows = specialized::load_sql_queries(&conn).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].command, "SELECT");
}

#[test]
fn object_literal_callees_filters_property_type() {
    let conn = fixture_connection();
    conn.execute_batch(
        "INSERT INTO object_literals (file, line, variable_name, property_name, property_value, property_type)
         VALUES ('a.js', 1, 'handlers', 'a', 'handleA', 'function_ref'),
                ('a.js', 1, 'handlers', 'b', 'handleB', 'shorthand'),
                ('a.js', 1, 'handlers', 'c', '42', 'literal');",
    )
    .unwrap();

    let callees = specialized::object_literal_callees(&conn, "handlers").unwrap();
    assert_eq!(callees, vec!["handleA", "handleB"]);
    assert!(specialized::object_literal_callees(&conn, "other")
        .unwrap()
        .is_empty());
}

#[test]
fn variable_usage_range_query() {
    let conn = fixture_connection();
    conn.execute(
        "INSERT INTO variable_usage (file, line, variable_name, usage_type, in_component)
         VALUES ('a.js', 9, 'name', 'return', '')",
        [],
    )
    .unwrap();

    assert!(specialized::variable_used_in_range(&conn, "a.js", "name", 8, 10).unwrap());
    assert!(!specialized::variable_used_in_range(&conn, "a.js", "name", 1, 5).unwrap());
}

#[test]
fn network_indicators_near_counts_window() {
    let conn = fixture_connection();
    conn.execute(
        "INSERT INTO symbols (path, name, type, line, col) VALUES ('a.py', 'requests.get', 'call', 30, 0)",
        [],
    )
    .unwrap();

    assert_eq!(symbols::network_indicators_near(&conn, "a.py", 50, 50).unwrap(), 1);
    assert_eq!(symbols::network_indicators_near(&conn, "a.py", 150, 50).unwrap(), 0);
}
