//! Core data types: occurrences, path steps, taint paths, and the report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Category → pattern list. `BTreeMap` keeps iteration canonical so pattern
/// signatures and report histograms are stable.
pub type PatternMap = BTreeMap<String, Vec<String>>;

/// A concrete source occurrence: where untrusted input enters the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOccurrence {
    pub file: String,
    pub name: String,
    pub line: i64,
    pub column: i64,
    pub pattern: String,
}

/// Extra context describing which relation contributed a sink hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkMetadata {
    /// Contributing relation, e.g. `sql_queries`, `function_call_args`.
    pub relation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
}

impl SinkMetadata {
    pub fn from_relation(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            ..Self::default()
        }
    }
}

/// A concrete sink occurrence: where tainted data would cause harm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkOccurrence {
    pub file: String,
    pub name: String,
    pub line: i64,
    pub column: i64,
    pub pattern: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SinkMetadata>,
}

/// A path condition recorded when a flow-sensitive path crosses a
/// conditional or loop-condition block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCondition {
    pub block: i64,
    pub condition: String,
    #[serde(rename = "type")]
    pub branch: String,
    pub line: i64,
}

/// One node of a taint trace, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathStep {
    /// Taint entry point.
    Source {
        location: String,
        var: String,
        pattern: String,
    },
    /// Source value flows to the sink with no intermediate assignment.
    DirectUse { location: String },
    /// Source pattern appears directly in the sink call's arguments.
    DirectArgument { location: String, pattern: String },
    /// Flow-insensitive worklist propagation summary.
    Propagation {
        tainted_vars: Vec<String>,
        transformations: usize,
    },
    /// Conditions an execution must satisfy to reach the sink.
    Conditions {
        conditions: Vec<PathCondition>,
        summary: String,
    },
    /// Tainted variable passed as an argument into a callee parameter.
    ArgumentPass {
        from_function: String,
        to_function: String,
        var: String,
        param: String,
        line: i64,
    },
    /// Tainted value returned from a callee into a caller variable.
    ReturnFlow {
        from_function: String,
        to_function: String,
        return_var: String,
        target_var: String,
        line: i64,
    },
    /// Legacy call-graph hop.
    Call { function: String, line: i64 },
    /// Sink reached.
    Sink { location: String, pattern: String },
}

/// Map a sink pattern category onto the reported vulnerability type.
pub fn classify_category(category: &str) -> &'static str {
    match category {
        "sql" => "SQL Injection",
        "command" => "Command Injection",
        "xss" => "Cross-Site Scripting (XSS)",
        "path" => "Path Traversal",
        "ldap" => "LDAP Injection",
        "nosql" => "NoSQL Injection",
        _ => "Data Exposure",
    }
}

/// A complete taint flow from source to sink. The output entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaintPath {
    pub source: SourceOccurrence,
    pub sink: SinkOccurrence,
    #[serde(rename = "path")]
    pub steps: Vec<PathStep>,
    pub path_length: usize,
    pub vulnerability_type: String,
    pub flow_sensitive: bool,
    pub conditions: Vec<PathCondition>,
    pub tainted_vars_at_sink: Vec<String>,
    pub sanitized_vars_at_sink: Vec<String>,
}

impl TaintPath {
    /// Build a flow-insensitive path; the vulnerability type comes from the
    /// sink's category.
    pub fn new(source: SourceOccurrence, sink: SinkOccurrence, steps: Vec<PathStep>) -> Self {
        let vulnerability_type = classify_category(&sink.category).to_string();
        let path_length = steps.len();
        Self {
            source,
            sink,
            steps,
            path_length,
            vulnerability_type,
            flow_sensitive: false,
            conditions: Vec::new(),
            tainted_vars_at_sink: Vec::new(),
            sanitized_vars_at_sink: Vec::new(),
        }
    }

    /// Dedup key: one retained path per source/sink location pair.
    pub fn pair_key(&self) -> (String, String) {
        (
            format!("{}:{}", self.source.file, self.source.line),
            format!("{}:{}", self.sink.file, self.sink.line),
        )
    }
}

/// Severity rollup. The base engine reports counts only; it does not assign
/// severity, so the per-level counts stay zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_count: usize,
    pub by_type: BTreeMap<String, usize>,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
}

/// The structured result of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaintReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub sources_found: usize,
    pub sinks_found: usize,
    pub taint_paths: Vec<TaintPath>,
    pub vulnerabilities_by_type: BTreeMap<String, usize>,
    pub total_vulnerabilities: usize,
    pub summary: ReportSummary,
    /// Per-function analysis errors that did not halt the run.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub diagnostics: Vec<String>,
}

impl TaintReport {
    /// A failed run: error message set, every count zero.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}
