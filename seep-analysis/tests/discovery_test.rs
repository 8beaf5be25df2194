//! Discovery tests: occurrence enumeration, ordering, and external-source
//! validation.

mod common;

use seep_analysis::discovery::{find_sinks, find_sources, is_external_source};
use seep_analysis::index::DirectIndex;
use seep_analysis::registry::TaintRegistry;
use seep_analysis::types::SourceOccurrence;

use common::*;

fn occurrence(file: &str, line: i64, pattern: &str) -> SourceOccurrence {
    SourceOccurrence {
        file: file.to_string(),
        name: pattern.to_string(),
        line,
        column: 0,
        pattern: pattern.to_string(),
    }
}

#[test]
fn sources_are_ordered_by_file_and_line() {
    let conn = store();
    insert_symbol(&conn, "b.js", "req.query", "property", 4);
    insert_symbol(&conn, "a.js", "req.query", "property", 9);
    insert_symbol(&conn, "a.js", "req.body", "property", 2);

    let registry = TaintRegistry::from_defaults();
    let index = DirectIndex::new(&conn);
    let sources = find_sources(&index, registry.sources()).unwrap();

    let locations: Vec<(String, i64)> = sources.iter().map(|s| (s.file.clone(), s.line)).collect();
    let mut sorted = locations.clone();
    sorted.sort();
    assert_eq!(locations, sorted);
    assert!(sources.len() >= 3);
}

#[test]
fn sinks_carry_category_and_metadata() {
    let conn = store();
    insert_symbol(&conn, "a.py", "cursor.execute", "call", 8);

    let registry = TaintRegistry::from_defaults();
    let index = DirectIndex::new(&conn);
    let sinks = find_sinks(&index, registry.sinks()).unwrap();

    let hit = sinks
        .iter()
        .find(|s| s.pattern == "cursor.execute")
        .expect("cursor.execute sink");
    assert_eq!(hit.category, "sql");
    assert_eq!(hit.metadata.as_ref().unwrap().relation, "symbols");
}

#[test]
fn web_inputs_and_env_are_external_by_definition() {
    let conn = store();
    let index = DirectIndex::new(&conn);

    for pattern in ["req.query", "request.args", "os.getenv", "sys.argv", "requests.get"] {
        assert!(
            is_external_source(&index, &occurrence("a.py", 5, pattern)).unwrap(),
            "{pattern} should be external"
        );
    }
}

#[test]
fn file_io_needs_a_network_context() {
    let conn = store();
    // A download call 20 lines above the open().
    insert_symbol(&conn, "scraper.py", "download_page", "call", 30);

    let index = DirectIndex::new(&conn);
    assert!(is_external_source(&index, &occurrence("scraper.py", 50, "open")).unwrap());
    // Same pattern, different file with no network indicators.
    assert!(!is_external_source(&index, &occurrence("batch.py", 50, "open")).unwrap());
}

#[test]
fn unknown_patterns_are_conservatively_internal() {
    let conn = store();
    let index = DirectIndex::new(&conn);
    assert!(!is_external_source(&index, &occurrence("a.js", 1, "localStorage.getItem")).unwrap());
    assert!(!is_external_source(&index, &occurrence("a.js", 1, "totally.unknown")).unwrap());
}
