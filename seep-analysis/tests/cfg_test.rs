//! Flow-sensitive CFG tests: join-point conservatism, sanitized-branch
//! dropping, path enumeration, name normalization, and consistency errors.

mod common;

use seep_analysis::cfg::{
    normalize_function_name, should_use_cfg, verify_unsanitized_paths, BlockTaintState,
    PathAnalyzer,
};
use seep_analysis::index::DirectIndex;
use seep_analysis::registry::TaintRegistry;
use seep_analysis::types::{SinkOccurrence, SourceOccurrence};
use seep_core::errors::TaintError;
use seep_storage::queries::symbols::FunctionRef;

use common::*;

fn source_at(file: &str, line: i64, pattern: &str) -> SourceOccurrence {
    SourceOccurrence {
        file: file.to_string(),
        name: pattern.to_string(),
        line,
        column: 0,
        pattern: pattern.to_string(),
    }
}

fn sink_at(file: &str, line: i64, pattern: &str, category: &str) -> SinkOccurrence {
    SinkOccurrence {
        file: file.to_string(),
        name: pattern.to_string(),
        line,
        column: 0,
        pattern: pattern.to_string(),
        category: category.to_string(),
        metadata: None,
    }
}

#[test]
fn merge_is_conservative_at_join_points() {
    let mut on_a = BlockTaintState::new(7);
    on_a.add_taint("x");

    let mut on_b = BlockTaintState::new(7);
    on_b.add_taint("x");
    on_b.sanitize("x");
    on_b.add_taint("y");
    on_b.sanitize("y");

    // Tainted on A, sanitized on B: tainted after the merge.
    let merged = on_a.merge(&on_b);
    assert!(merged.is_tainted("x"));

    // Sanitized on both: sanitized after the merge.
    let mut also_sanitized = BlockTaintState::new(7);
    also_sanitized.add_taint("y");
    also_sanitized.sanitize("y");
    let merged = on_b.merge(&also_sanitized);
    assert!(!merged.is_tainted("y"));
    assert!(merged.sanitized_vars.contains("y"));
}

#[test]
fn taint_reintroduction_clears_sanitization() {
    let mut state = BlockTaintState::new(1);
    state.add_taint("x");
    state.sanitize("x");
    assert!(!state.is_tainted("x"));
    state.add_taint("x");
    assert!(state.is_tainted("x"));
}

/// S2-shaped fixture: `x = request.args.get('u')`, then the sink runs only
/// inside an `if sanitize(x):` branch.
fn sanitized_branch_store() -> rusqlite::Connection {
    let conn = store();
    insert_function(&conn, "app.py", "handler", 1, 7);
    insert_symbol(&conn, "app.py", "request.args", "property", 2);
    insert_assignment(&conn, "app.py", 2, "x", "request.args.get('u')", "handler", &[]);
    insert_call_arg(&conn, "app.py", 3, "handler", "sanitize", "value", "x", None);
    insert_call_arg(
        &conn,
        "app.py",
        4,
        "handler",
        "cursor.execute",
        "sql",
        "f\"SELECT * FROM t WHERE id={x}\"",
        None,
    );
    insert_sql_query(&conn, "app.py", 4, "SELECT * FROM t WHERE id={x}", "SELECT");

    insert_cfg_block(&conn, 1, "app.py", "handler", "entry", 1, 1, None);
    insert_cfg_block(&conn, 2, "app.py", "handler", "block", 2, 2, None);
    insert_cfg_block(&conn, 3, "app.py", "handler", "condition", 3, 3, Some("sanitize(x)"));
    insert_cfg_block(&conn, 4, "app.py", "handler", "if_body", 4, 4, None);
    insert_cfg_block(&conn, 5, "app.py", "handler", "else_body", 5, 6, None);
    insert_cfg_block(&conn, 6, "app.py", "handler", "exit", 7, 7, None);
    insert_cfg_edge(&conn, 1, "app.py", "handler", 1, 2, "normal");
    insert_cfg_edge(&conn, 2, "app.py", "handler", 2, 3, "normal");
    insert_cfg_edge(&conn, 3, "app.py", "handler", 3, 4, "true");
    insert_cfg_edge(&conn, 4, "app.py", "handler", 3, 5, "false");
    insert_cfg_edge(&conn, 5, "app.py", "handler", 4, 6, "normal");
    insert_cfg_edge(&conn, 6, "app.py", "handler", 5, 6, "normal");
    insert_cfg_statement(&conn, 3, "call", 3, "sanitize(x)", 0);
    insert_cfg_statement(&conn, 4, "call", 4, "cursor.execute(...)", 0);
    conn
}

#[test]
fn every_path_sanitized_drops_the_pair() {
    let conn = sanitized_branch_store();
    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();

    let source = source_at("app.py", 2, "request.args");
    let sink = sink_at("app.py", 4, "cursor.execute", "sql");
    let function = FunctionRef {
        file: "app.py".into(),
        name: "handler".into(),
        line: 1,
    };

    assert!(should_use_cfg(&index, &source, &sink).unwrap());
    let verdict =
        verify_unsanitized_paths(&index, &registry, &source, &sink, &function, 100).unwrap();
    let paths = verdict.expect("CFG reasoning applies to this pair");
    assert!(paths.is_empty(), "all paths sanitized, pair must drop");
}

/// S4-shaped fixture: the sanitizer runs on only one branch of an `if`
/// with no else; the merge keeps the variable tainted.
fn one_branch_sanitized_store() -> rusqlite::Connection {
    let conn = store();
    insert_function(&conn, "app.py", "handler", 1, 6);
    insert_symbol(&conn, "app.py", "request.args", "property", 2);
    insert_symbol(&conn, "app.py", "db.query", "call", 5);
    insert_assignment(&conn, "app.py", 2, "x", "request.args['q']", "handler", &[]);
    insert_assignment(&conn, "app.py", 4, "x", "sanitize(x)", "handler", &["x"]);
    insert_call_arg(&conn, "app.py", 4, "handler", "sanitize", "value", "x", None);
    insert_call_arg(&conn, "app.py", 5, "handler", "db.query", "sql", "x", None);

    insert_cfg_block(&conn, 1, "app.py", "handler", "entry", 1, 1, None);
    insert_cfg_block(&conn, 2, "app.py", "handler", "block", 2, 2, None);
    insert_cfg_block(&conn, 3, "app.py", "handler", "condition", 3, 3, Some("flag"));
    insert_cfg_block(&conn, 4, "app.py", "handler", "if_body", 4, 4, None);
    insert_cfg_block(&conn, 5, "app.py", "handler", "merge", 5, 5, None);
    insert_cfg_block(&conn, 6, "app.py", "handler", "exit", 6, 6, None);
    insert_cfg_edge(&conn, 1, "app.py", "handler", 1, 2, "normal");
    insert_cfg_edge(&conn, 2, "app.py", "handler", 2, 3, "normal");
    // The skip edge comes first so the unsanitized path enumerates first.
    insert_cfg_edge(&conn, 3, "app.py", "handler", 3, 5, "false");
    insert_cfg_edge(&conn, 4, "app.py", "handler", 3, 4, "true");
    insert_cfg_edge(&conn, 5, "app.py", "handler", 4, 5, "normal");
    insert_cfg_edge(&conn, 6, "app.py", "handler", 5, 6, "normal");
    insert_cfg_statement(&conn, 4, "call", 4, "sanitize(x)", 0);
    insert_cfg_statement(&conn, 5, "call", 5, "db.query(x)", 0);
    conn
}

#[test]
fn join_point_keeps_taint_when_one_branch_skips_the_sanitizer() {
    let conn = one_branch_sanitized_store();
    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();

    let source = source_at("app.py", 2, "request.args");
    let sink = sink_at("app.py", 5, "db.query", "sql");
    let function = FunctionRef {
        file: "app.py".into(),
        name: "handler".into(),
        line: 1,
    };

    let paths = verify_unsanitized_paths(&index, &registry, &source, &sink, &function, 100)
        .unwrap()
        .expect("CFG reasoning applies");

    assert!(!paths.is_empty(), "the skip branch keeps x tainted");
    let first = &paths[0];
    assert!(first.flow_sensitive);
    assert!(first
        .conditions
        .iter()
        .any(|c| c.condition == "if not (flag)" && c.branch == "false"));
    assert!(first.tainted_vars_at_sink.iter().any(|v| v == "x"));
}

#[test]
fn path_enumeration_is_capped() {
    let conn = one_branch_sanitized_store();
    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let analyzer = PathAnalyzer::new(&index, &registry, "app.py", "handler").unwrap();

    let all = analyzer.enumerate_paths(2, 5, 100);
    assert_eq!(all.len(), 2);
    let capped = analyzer.enumerate_paths(2, 5, 1);
    assert_eq!(capped.len(), 1);
    // Acyclic enumeration: no block repeats within a path.
    for path in &all {
        let mut seen = path.clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), path.len());
    }
}

#[test]
fn qualified_names_normalize_only_at_the_cfg_boundary() {
    assert_eq!(normalize_function_name("accountService.createAccount"), "createAccount");
    assert_eq!(normalize_function_name("plain"), "plain");

    let conn = store();
    insert_cfg_block(&conn, 1, "svc.js", "createAccount", "entry", 1, 2, None);
    insert_cfg_block(&conn, 2, "svc.js", "createAccount", "exit", 3, 4, None);
    insert_cfg_edge(&conn, 1, "svc.js", "createAccount", 1, 2, "normal");
    // Assignments keep the qualified name.
    insert_assignment(&conn, "svc.js", 2, "y", "data", "accountService.createAccount", &["data"]);
    insert_call_arg(&conn, "svc.js", 3, "accountService.createAccount", "db.query", "sql", "y", None);

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let analyzer =
        PathAnalyzer::new(&index, &registry, "svc.js", "accountService.createAccount").unwrap();
    assert_eq!(analyzer.function(), "createAccount");

    let outcomes = analyzer.find_vulnerable_paths(2, 3, "data", 100).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].vulnerable, "propagated var y reaches the sink");
    assert!(outcomes[0].tainted_vars.iter().any(|v| v == "y"));
}

#[test]
fn missing_cfg_fails_loudly() {
    let conn = store();
    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let err = PathAnalyzer::new(&index, &registry, "ghost.js", "nothing").unwrap_err();
    assert!(matches!(err, TaintError::MissingCfg { .. }));
}

#[test]
fn edges_referencing_missing_blocks_fail_loudly() {
    let conn = store();
    insert_cfg_block(&conn, 1, "bad.js", "f", "entry", 1, 2, None);
    insert_cfg_edge(&conn, 1, "bad.js", "f", 1, 99, "normal");

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let err = PathAnalyzer::new(&index, &registry, "bad.js", "f").unwrap_err();
    assert!(matches!(err, TaintError::InconsistentCfg { .. }));
}

#[test]
fn should_use_cfg_requires_a_conditional_between() {
    let conn = store();
    insert_cfg_block(&conn, 1, "flat.js", "f", "entry", 1, 2, None);
    insert_cfg_block(&conn, 2, "flat.js", "f", "exit", 9, 10, None);

    let index = DirectIndex::new(&conn);
    let source = source_at("flat.js", 1, "req.body");
    let sink = sink_at("flat.js", 9, "res.send", "xss");
    assert!(!should_use_cfg(&index, &source, &sink).unwrap());
}

#[test]
fn loop_widening_taints_loop_assigned_variables() {
    let conn = store();
    insert_cfg_block(&conn, 1, "loop.py", "f", "loop_condition", 3, 3, Some("items"));
    insert_cfg_block(&conn, 2, "loop.py", "f", "loop_body", 4, 5, None);
    insert_cfg_block(&conn, 3, "loop.py", "f", "exit", 6, 6, None);
    insert_cfg_edge(&conn, 1, "loop.py", "f", 1, 2, "true");
    insert_cfg_edge(&conn, 2, "loop.py", "f", 2, 1, "continue_loop");
    insert_cfg_edge(&conn, 3, "loop.py", "f", 1, 3, "false");
    insert_assignment(&conn, "loop.py", 4, "acc", "acc + item", "f", &["acc", "item"]);

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let analyzer = PathAnalyzer::new(&index, &registry, "loop.py", "f").unwrap();

    let body = analyzer.loop_body_blocks(1);
    assert_eq!(body, vec![2]);

    let mut state = BlockTaintState::new(1);
    state.add_taint("item");
    let widened = analyzer.apply_widening(&state, &body).unwrap();
    assert!(widened.is_tainted("acc"));

    // No taint on entry: widening changes nothing.
    let clean = BlockTaintState::new(1);
    let unchanged = analyzer.apply_widening(&clean, &body).unwrap();
    assert!(unchanged.tainted_vars.is_empty());
}
