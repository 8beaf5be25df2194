//! Pattern registry tests: defaults, combinator purity, sanitizer matching,
//! TOML round-trip.

use seep_analysis::registry::{Framework, RuleRegistry, TaintRegistry};

#[test]
fn defaults_carry_all_sink_categories() {
    let registry = TaintRegistry::from_defaults();
    for category in ["sql", "command", "xss", "path", "ldap", "nosql"] {
        assert!(
            registry.sinks().contains_key(category),
            "missing category {category}"
        );
    }
    assert!(registry.sources().contains_key("js"));
    assert!(registry.sources().contains_key("python"));
    assert!(registry.sources().contains_key("web_scraping"));
    assert!(registry.sources().contains_key("file_io"));
}

#[test]
fn with_frameworks_leaves_original_untouched() {
    let base = TaintRegistry::from_defaults();
    let snapshot = base.clone();

    let enriched = base.with_frameworks(&[Framework::Express, Framework::Flask]);

    // The original is byte-identical before and after.
    assert_eq!(base, snapshot);
    assert_ne!(enriched, base);

    let express_sql: Vec<&String> = enriched.sinks()["sql"]
        .iter()
        .filter(|p| p.as_str() == "pool.query")
        .collect();
    assert_eq!(express_sql.len(), 1);
    assert!(enriched.sinks()["path"].iter().any(|p| p == "res.sendFile"));
    assert!(enriched.sources()["python"].iter().any(|p| p == "request.view_args"));
}

#[test]
fn with_frameworks_does_not_duplicate_existing_patterns() {
    let registry = TaintRegistry::from_defaults()
        .with_frameworks(&[Framework::Express])
        .with_frameworks(&[Framework::Express]);
    let count = registry.sinks()["sql"]
        .iter()
        .filter(|p| p.as_str() == "knex.raw")
        .count();
    assert_eq!(count, 1);
}

#[test]
fn rule_registry_replaces_pattern_sets() {
    let mut rules = RuleRegistry::default();
    rules
        .sources
        .insert("js".into(), vec!["customSource".into()]);
    rules.sinks.insert("sql".into(), vec!["customSink".into()]);

    let registry = TaintRegistry::from_defaults().with_rule_registry(&rules);
    assert_eq!(registry.sources().len(), 1);
    assert_eq!(registry.sinks()["sql"], vec!["customSink".to_string()]);
    // Sanitizers survive the replacement.
    assert!(registry.is_sanitizer("html.escape"));
}

#[test]
fn sanitizer_matching_is_substring_and_case_insensitive() {
    let registry = TaintRegistry::from_defaults();
    assert!(registry.is_sanitizer("sanitize"));
    assert!(registry.is_sanitizer("sanitizeUserInput"));
    assert!(registry.is_sanitizer("DOMPurify.sanitize"));
    assert!(registry.is_sanitizer("Validate"));
    assert!(registry.is_sanitizer("shlex.quote"));
    assert!(registry.is_sanitizer("secure_filename"));
    assert!(!registry.is_sanitizer(""));
    assert!(!registry.is_sanitizer("db.query"));
}

#[test]
fn toml_round_trip_preserves_patterns() {
    let toml = r#"
[sources]
js = ["req.body"]

[sinks]
sql = ["db.query"]

[sanitizers]
validation = ["validate"]
"#;
    let registry = TaintRegistry::from_toml_str(toml).unwrap();
    assert_eq!(registry.sources()["js"], vec!["req.body".to_string()]);
    assert_eq!(registry.sinks()["sql"], vec!["db.query".to_string()]);
    assert!(registry.is_sanitizer("validate"));
    assert!(!registry.is_sanitizer("html.escape"));

    let serialized = registry.to_toml_string().unwrap();
    let reparsed = TaintRegistry::from_toml_str(&serialized).unwrap();
    assert_eq!(reparsed, registry);
}

#[test]
fn toml_missing_sections_fall_back_to_defaults() {
    let registry = TaintRegistry::from_toml_str("[sources]\njs = [\"req.body\"]\n").unwrap();
    assert_eq!(registry.sources().len(), 1);
    assert!(registry.sinks().contains_key("sql"));
    assert!(registry.is_sanitizer("html.escape"));
}

#[test]
fn invalid_overrides_reject_synchronously() {
    let empty_list = "[sinks]\nsql = []\n";
    assert!(TaintRegistry::from_toml_str(empty_list).is_err());

    let empty_pattern = "[sinks]\nsql = [\"db.query\", \"\"]\n";
    assert!(TaintRegistry::from_toml_str(empty_pattern).is_err());

    let garbage = "sinks = 5";
    assert!(TaintRegistry::from_toml_str(garbage).is_err());
}

#[test]
fn stats_count_patterns() {
    let registry = TaintRegistry::from_defaults();
    let stats = registry.stats();
    assert!(stats.sources > 50);
    assert!(stats.sinks > 40);
    assert!(stats.sanitizers > 30);
}
