//! Inter-procedural tests: effect summaries, passthrough, dynamic dispatch,
//! and the cross-function worklist tracer.

mod common;

use std::collections::BTreeMap;

use seep_analysis::index::DirectIndex;
use seep_analysis::interprocedural::{
    trace_cross_function, DispatchContext, InterProceduralAnalyzer, InterProceduralEffect,
    ParamEffect,
};
use seep_analysis::registry::TaintRegistry;
use seep_analysis::types::{PathStep, SinkOccurrence, SourceOccurrence};
use seep_core::errors::TaintError;

use common::*;

fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn taint_state(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// A callee that sanitizes its parameter on every path:
/// `function clean(input) { input = sanitize(input); return input; }`
fn add_sanitizing_callee(conn: &rusqlite::Connection) {
    insert_function(conn, "lib.js", "clean", 20, 23);
    insert_cfg_block(conn, 31, "lib.js", "clean", "entry", 20, 21, None);
    insert_cfg_block(conn, 32, "lib.js", "clean", "exit", 22, 23, None);
    insert_cfg_edge(conn, 31, "lib.js", "clean", 31, 32, "normal");
    insert_assignment(conn, "lib.js", 21, "input", "sanitize(input)", "clean", &["input"]);
    insert_call_arg(conn, "lib.js", 21, "clean", "sanitize", "v", "input", None);
}

/// A callee that passes its parameter straight to the return value:
/// `function passthru(v) { return v; }`
fn add_passthrough_callee(conn: &rusqlite::Connection) {
    insert_function(conn, "lib.js", "passthru", 30, 33);
    insert_cfg_block(conn, 41, "lib.js", "passthru", "entry", 30, 31, None);
    insert_cfg_block(conn, 42, "lib.js", "passthru", "exit", 32, 33, None);
    insert_cfg_edge(conn, 41, "lib.js", "passthru", 41, 42, "normal");
    insert_return(conn, "lib.js", 32, "passthru", "v", &["v"]);
    insert_variable_usage(conn, "lib.js", 32, "v", "return");
}

#[test]
fn sanitizing_callee_reports_param_sanitized() {
    let conn = store();
    add_sanitizing_callee(&conn);

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let mut analyzer = InterProceduralAnalyzer::new(&index, &registry, 100);

    let effect = analyzer
        .analyze_function_call(
            "lib.js",
            "caller",
            "lib.js",
            "clean",
            &mapping(&[("data", "input")]),
            &taint_state(&[("data", true)]),
        )
        .unwrap();

    assert_eq!(effect.param_effects["input"], ParamEffect::Sanitized);
    assert!(!effect.return_tainted);
    assert_eq!(effect.passthrough_taint.get("input"), Some(&false));
}

#[test]
fn passthrough_callee_taints_its_return() {
    let conn = store();
    add_passthrough_callee(&conn);

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let mut analyzer = InterProceduralAnalyzer::new(&index, &registry, 100);

    let effect = analyzer
        .analyze_function_call(
            "lib.js",
            "caller",
            "lib.js",
            "passthru",
            &mapping(&[("data", "v")]),
            &taint_state(&[("data", true)]),
        )
        .unwrap();

    assert!(effect.return_tainted);
    assert_eq!(effect.param_effects["v"], ParamEffect::Tainted);
    assert_eq!(effect.passthrough_taint.get("v"), Some(&true));
}

#[test]
fn untainted_arguments_produce_no_effect() {
    let conn = store();
    add_passthrough_callee(&conn);

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let mut analyzer = InterProceduralAnalyzer::new(&index, &registry, 100);

    let effect = analyzer
        .analyze_function_call(
            "lib.js",
            "caller",
            "lib.js",
            "passthru",
            &mapping(&[("data", "v")]),
            &taint_state(&[("data", false)]),
        )
        .unwrap();

    assert!(!effect.return_tainted);
    assert_eq!(effect.param_effects["v"], ParamEffect::Unmodified);
}

#[test]
fn missing_callee_cfg_hard_fails() {
    let conn = store();
    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let mut analyzer = InterProceduralAnalyzer::new(&index, &registry, 100);

    let err = analyzer
        .analyze_function_call(
            "lib.js",
            "caller",
            "lib.js",
            "unindexed",
            &mapping(&[("data", "v")]),
            &taint_state(&[("data", true)]),
        )
        .unwrap_err();
    assert!(matches!(err, TaintError::MissingCfg { .. }));
}

#[test]
fn conservative_merge_taint_wins() {
    let mut sanitized = InterProceduralEffect::default();
    sanitized
        .param_effects
        .insert("input".into(), ParamEffect::Sanitized);

    let mut tainted = InterProceduralEffect::default();
    tainted
        .param_effects
        .insert("input".into(), ParamEffect::Tainted);
    tainted.return_tainted = true;
    tainted.side_effects.push("writes_to_db".into());

    let merged = sanitized.merge_conservative(&tainted);
    assert_eq!(merged.param_effects["input"], ParamEffect::Tainted);
    assert!(merged.return_tainted);
    assert_eq!(merged.side_effects, vec!["writes_to_db".to_string()]);

    let both_sanitized = sanitized.merge_conservative(&sanitized.clone());
    assert_eq!(both_sanitized.param_effects["input"], ParamEffect::Sanitized);
}

/// S5: object-literal handlers where one callee sanitizes and the other
/// does not — the merged dispatch effect keeps taint.
#[test]
fn dynamic_dispatch_merges_object_literal_candidates() {
    let conn = store();
    add_sanitizing_callee(&conn);
    // handleB-alike: parameter flows through untouched.
    insert_function(&conn, "lib.js", "raw", 40, 43);
    insert_cfg_block(&conn, 51, "lib.js", "raw", "entry", 40, 41, None);
    insert_cfg_block(&conn, 52, "lib.js", "raw", "exit", 42, 43, None);
    insert_cfg_edge(&conn, 51, "lib.js", "raw", 51, 52, "normal");

    insert_object_literal(&conn, "lib.js", "handlers", "a", "clean", "function_ref");
    insert_object_literal(&conn, "lib.js", "handlers", "b", "raw", "shorthand");

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let mut analyzer = InterProceduralAnalyzer::new(&index, &registry, 100);

    let context = DispatchContext {
        file: "lib.js".into(),
        function: "dispatch".into(),
    };
    let effect = analyzer
        .handle_dynamic_dispatch(
            "handlers[req.query.k]",
            &context,
            &mapping(&[("data", "input")]),
            &taint_state(&[("data", true)]),
        )
        .unwrap();

    // clean() sanitizes, raw() keeps the parameter tainted; taint wins.
    assert_eq!(effect.param_effects["input"], ParamEffect::Tainted);
}

#[test]
fn unresolvable_dispatch_is_maximally_conservative() {
    let conn = store();
    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let mut analyzer = InterProceduralAnalyzer::new(&index, &registry, 100);

    let context = DispatchContext {
        file: "lib.js".into(),
        function: "dispatch".into(),
    };
    let effect = analyzer
        .handle_dynamic_dispatch(
            "unknownTable[key]",
            &context,
            &mapping(&[("data", "input")]),
            &taint_state(&[("data", true)]),
        )
        .unwrap();

    assert!(effect.return_tainted);
    assert_eq!(effect.param_effects["input"], ParamEffect::Tainted);
}

#[test]
fn tracer_follows_argument_pass_into_sink_function() {
    let conn = store();
    insert_function(&conn, "app.js", "handler", 1, 9);
    insert_function(&conn, "app.js", "emit", 10, 20);
    insert_call_arg(&conn, "app.js", 4, "handler", "emit", "value", "name", None);
    insert_call_arg(&conn, "app.js", 12, "emit", "res.send", "body", "value", None);

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let source = SourceOccurrence {
        file: "app.js".into(),
        name: "req.query".into(),
        line: 2,
        column: 0,
        pattern: "req.query".into(),
    };
    let sink = SinkOccurrence {
        file: "app.js".into(),
        name: "res.send".into(),
        line: 12,
        column: 0,
        pattern: "res.send".into(),
        category: "xss".into(),
        metadata: None,
    };

    let paths =
        trace_cross_function(&index, &registry, &source, "name", "handler", &sink, 3, false, 100)
            .unwrap();

    assert!(!paths.is_empty());
    let has_argument_pass = paths.iter().any(|p| {
        p.steps
            .iter()
            .any(|s| matches!(s, PathStep::ArgumentPass { to_function, .. } if to_function == "emit"))
    });
    assert!(has_argument_pass);
}

#[test]
fn tracer_respects_the_depth_cap() {
    let conn = store();
    // A three-hop chain: a -> b -> c -> sink in c.
    insert_function(&conn, "deep.js", "a", 1, 9);
    insert_function(&conn, "deep.js", "b", 10, 19);
    insert_function(&conn, "deep.js", "c", 20, 29);
    insert_call_arg(&conn, "deep.js", 2, "a", "b", "p1", "x", None);
    insert_call_arg(&conn, "deep.js", 12, "b", "c", "p2", "p1", None);
    insert_call_arg(&conn, "deep.js", 22, "c", "res.send", "body", "p2", None);

    let index = DirectIndex::new(&conn);
    let registry = TaintRegistry::from_defaults();
    let source = SourceOccurrence {
        file: "deep.js".into(),
        name: "req.query".into(),
        line: 1,
        column: 0,
        pattern: "req.query".into(),
    };
    let sink = SinkOccurrence {
        file: "deep.js".into(),
        name: "res.send".into(),
        line: 22,
        column: 0,
        pattern: "res.send".into(),
        category: "xss".into(),
        metadata: None,
    };

    let reachable =
        trace_cross_function(&index, &registry, &source, "x", "a", &sink, 3, false, 100).unwrap();
    assert!(!reachable.is_empty());

    let capped =
        trace_cross_function(&index, &registry, &source, "x", "a", &sink, 0, false, 100).unwrap();
    assert!(capped.is_empty(), "a zero cap forbids following any call");
}
