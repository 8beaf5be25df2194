//! Flow-insensitive, intra-procedural taint propagation.
//!
//! Worklist algorithm over the assignment, call-argument, and return
//! relations of one file, starting from a single source occurrence. Emits
//! candidate paths that the flow-sensitive verifier may later replace.

pub mod javascript;
pub mod python;

use aho_corasick::AhoCorasick;
use tracing::debug;

use seep_core::config::TaintOptions;
use seep_core::constants::{
    CROSS_FUNCTION_TRACE_DEPTH, MAX_WORKLIST_ITERATIONS, SINK_ASSIGNMENT_WINDOW,
};
use seep_core::errors::{StoreError, TaintError};
use seep_core::types::collections::{FxHashMap, FxHashSet};
use seep_storage::queries::symbols::FunctionRef;

use crate::cfg::{should_use_cfg, verify_unsanitized_paths};
use crate::index::TaintIndex;
use crate::interprocedural::trace_cross_function;
use crate::registry::TaintRegistry;
use crate::types::{PathStep, SinkOccurrence, SourceOccurrence, TaintPath};

/// A tainted `(function, variable)` element. `__return__` is the synthetic
/// token for a function's return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaintedElement {
    pub function: String,
    pub var: String,
}

impl TaintedElement {
    pub fn new(function: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            var: var.into(),
        }
    }

    /// Display key, `function:variable`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.function, self.var)
    }
}

/// Aho-Corasick automaton over every configured source pattern, answering
/// "does this expression mention any known source" in one scan.
pub struct SourceMatcher {
    automaton: Option<AhoCorasick>,
}

impl SourceMatcher {
    pub fn new(registry: &TaintRegistry) -> Self {
        let patterns = registry.all_source_patterns();
        let automaton = if patterns.is_empty() {
            None
        } else {
            AhoCorasick::new(&patterns).ok()
        };
        Self { automaton }
    }

    pub fn matches(&self, expr: &str) -> bool {
        self.automaton
            .as_ref()
            .is_some_and(|ac| ac.is_match(expr))
    }
}

/// Ubiquitous web framework request accessors that seed taint on their own
/// when no assignment carries the pattern.
const UBIQUITOUS_REQUEST_ACCESSORS: &[&str] = &[
    "req.body",
    "req.query",
    "req.params",
    "req.headers",
    "req.cookies",
];

/// Source-file language, for the language-specific enhancement passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceLanguage {
    JavaScript,
    Python,
    Other,
}

fn language_of(file: &str) -> SourceLanguage {
    let lower = file.to_lowercase();
    if lower.ends_with(".js")
        || lower.ends_with(".jsx")
        || lower.ends_with(".ts")
        || lower.ends_with(".tsx")
        || lower.ends_with(".mjs")
        || lower.ends_with(".cjs")
    {
        SourceLanguage::JavaScript
    } else if lower.ends_with(".py") {
        SourceLanguage::Python
    } else {
        SourceLanguage::Other
    }
}

/// Whether a sanitizer call appears on a line strictly between source and
/// sink in the same file.
pub fn has_sanitizer_between<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    source: &SourceOccurrence,
    sink: &SinkOccurrence,
) -> Result<bool, StoreError> {
    if source.file != sink.file {
        return Ok(false);
    }
    let calls = index.call_symbols_between(&source.file, source.line, sink.line)?;
    Ok(calls.iter().any(|call| registry.is_sanitizer(&call.name)))
}

/// Trace taint from one source through the file's dataflow relations and
/// emit candidate paths to the given sinks.
#[allow(clippy::too_many_arguments)]
pub fn trace_from_source<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    matcher: &SourceMatcher,
    options: &TaintOptions,
    source: &SourceOccurrence,
    source_function: &FunctionRef,
    sinks: &[SinkOccurrence],
    call_graph: &FxHashMap<String, Vec<String>>,
) -> Result<Vec<TaintPath>, TaintError> {
    // Flow-sensitive verification runs first, independent of the
    // flow-insensitive checks: its verdict per (source, sink) pair replaces
    // whatever the relational pass emits for that pair, and an all-sanitized
    // verdict drops the pair outright.
    let mut verified: std::collections::BTreeMap<(String, String), Vec<TaintPath>> =
        std::collections::BTreeMap::new();
    if options.use_cfg {
        for sink in sinks.iter().filter(|s| s.file == source.file) {
            if should_use_cfg(index, source, sink)? {
                if let Some(flow_paths) = verify_unsanitized_paths(
                    index,
                    registry,
                    source,
                    sink,
                    source_function,
                    options.max_paths_per_pair,
                )? {
                    let key = (
                        format!("{}:{}", source.file, source.line),
                        format!("{}:{}", sink.file, sink.line),
                    );
                    verified.insert(key, flow_paths);
                }
            }
        }
    }

    let mut paths = Vec::new();

    // Direct-use check first: source flows to a sink in the same function
    // with no intermediate assignment, e.g. res.send(req.body).
    for sink in sinks.iter().filter(|s| s.file == source_function.file) {
        let (start, end) = index.function_range(&source.file, source_function.line)?;
        let both_inside = start <= source.line
            && source.line <= end
            && start <= sink.line
            && sink.line <= end;
        if both_inside && !has_sanitizer_between(index, registry, source, sink)? {
            paths.push(TaintPath::new(
                source.clone(),
                sink.clone(),
                vec![
                    PathStep::DirectUse {
                        location: format!("{}:{}", source.file, source.line),
                    },
                    PathStep::Sink {
                        location: format!("{}:{}", sink.file, sink.line),
                        pattern: sink.pattern.clone(),
                    },
                ],
            ));
        }
    }

    // Without the assignment relation only the legacy proximity search is
    // possible.
    if !index.has_assignments()? {
        if paths.is_empty() {
            paths = trace_legacy(index, registry, source, source_function, sinks, call_graph, options)?;
        }
        return Ok(apply_verified(verified, paths));
    }

    let tainted = seed_and_propagate(index, matcher, source, source_function)?;
    debug!(
        source = source.pattern.as_str(),
        tainted = tainted.len(),
        "worklist propagation complete"
    );

    collect_sink_paths(
        index,
        registry,
        options,
        source,
        source_function,
        sinks,
        &tainted,
        &mut paths,
    )?;

    Ok(apply_verified(verified, paths))
}

/// Fold the flow-sensitive verdicts into the flow-insensitive emission:
/// verified pairs keep only their flow-sensitive paths (possibly none),
/// verified pairs the relational pass never reached are still emitted.
fn apply_verified(
    verified: std::collections::BTreeMap<(String, String), Vec<TaintPath>>,
    paths: Vec<TaintPath>,
) -> Vec<TaintPath> {
    if verified.is_empty() {
        return paths;
    }

    let mut out = Vec::new();
    let mut emitted: FxHashSet<(String, String)> = FxHashSet::default();
    for path in paths {
        let key = path.pair_key();
        match verified.get(&key) {
            Some(flow_sensitive) => {
                if emitted.insert(key) {
                    out.extend(flow_sensitive.iter().cloned());
                }
            }
            None => out.push(path),
        }
    }
    for (key, flow_sensitive) in verified {
        if emitted.insert(key) {
            out.extend(flow_sensitive);
        }
    }
    out
}

/// Initial taint seeding followed by worklist iteration.
fn seed_and_propagate<I: TaintIndex>(
    index: &I,
    matcher: &SourceMatcher,
    source: &SourceOccurrence,
    source_function: &FunctionRef,
) -> Result<FxHashSet<TaintedElement>, TaintError> {
    let mut tainted: FxHashSet<TaintedElement> = FxHashSet::default();
    let file = &source.file;

    // Assignments on or just around the source line that carry any known
    // source pattern.
    for assignment in index.assignments_in_range(file, source.line - 1, source.line + 1)? {
        if matcher.matches(&assignment.source_expr) {
            tainted.insert(TaintedElement::new(&assignment.in_function, &assignment.target_var));
        }
    }

    // Assignments near the line whose expression carries this pattern.
    for assignment in index.assignments_in_range(file, source.line - 1, source.line + 3)? {
        if assignment.source_expr.contains(source.pattern.as_str()) {
            tainted.insert(TaintedElement::new(&assignment.in_function, &assignment.target_var));
        }
    }

    // Dotted accessors taint every assignment mentioning them anywhere in
    // the file.
    if tainted.is_empty() && source.pattern.contains('.') {
        for assignment in index.assignments_in_file(file)? {
            if assignment.source_expr.contains(source.pattern.as_str()) {
                tainted.insert(TaintedElement::new(&assignment.in_function, &assignment.target_var));
            }
        }
    }

    // Anchor fallback: the file references the pattern but no assignment
    // carries it. Taint the pattern string itself so propagation has a
    // starting point; emitted paths may then name the pattern as the var.
    if tainted.is_empty() {
        let referencing = index.assignments_in_file(file)?.into_iter().find(|a| {
            a.source_expr.contains(source.pattern.as_str())
                || a.source_vars.iter().any(|v| v == &source.pattern)
        });
        if let Some(assignment) = referencing {
            tainted.insert(TaintedElement::new(&assignment.in_function, &source.pattern));
        }
    }

    // Ubiquitous request accessors seed themselves in the source's function.
    if tainted.is_empty() && UBIQUITOUS_REQUEST_ACCESSORS.contains(&source.pattern.as_str()) {
        tainted.insert(TaintedElement::new(&source_function.name, &source.pattern));
    }

    // Language-specific constructs widen the initial set.
    match language_of(file) {
        SourceLanguage::JavaScript => javascript::enhance(index, source, &mut tainted)?,
        SourceLanguage::Python => python::enhance(index, source, &mut tainted)?,
        SourceLanguage::Other => {}
    }

    // Worklist iteration, step-capped for termination on pathological
    // inputs.
    let mut processed: FxHashSet<TaintedElement> = FxHashSet::default();
    let mut iterations = 0;
    while iterations < MAX_WORKLIST_ITERATIONS {
        let pending: Vec<TaintedElement> =
            tainted.difference(&processed).cloned().collect();
        if pending.is_empty() {
            break;
        }
        iterations += 1;

        let mut discovered: FxHashSet<TaintedElement> = FxHashSet::default();
        for element in pending {
            processed.insert(element.clone());

            for assignment in index.assignments_in_function(file, &element.function)? {
                let mentions = assignment.source_expr.contains(element.var.as_str())
                    || assignment.source_vars.iter().any(|v| v == &element.var);
                if mentions {
                    discovered.insert(TaintedElement::new(
                        &assignment.in_function,
                        &assignment.target_var,
                    ));
                }
            }

            for call in index.call_args_by_caller(file, &element.function)? {
                if call.callee_function.is_empty() || call.param_name.is_empty() {
                    continue;
                }
                if !call.argument_expr.contains(element.var.as_str()) {
                    continue;
                }
                discovered.insert(TaintedElement::new(&call.callee_function, &call.param_name));

                let returns_param = index
                    .returns_of(file, &call.callee_function)?
                    .iter()
                    .any(|ret| {
                        ret.return_expr.contains(call.param_name.as_str())
                            || ret.return_vars.iter().any(|v| v == &call.param_name)
                    });
                if returns_param {
                    discovered.insert(TaintedElement::new(&call.callee_function, "__return__"));
                }
            }
        }
        tainted.extend(discovered);
    }
    if iterations == MAX_WORKLIST_ITERATIONS {
        debug!(
            source = source.pattern.as_str(),
            "worklist iteration cap reached, result may be partial"
        );
    }

    Ok(tainted)
}

/// Test every sink in the source's file against the tainted set.
#[allow(clippy::too_many_arguments)]
fn collect_sink_paths<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    options: &TaintOptions,
    source: &SourceOccurrence,
    source_function: &FunctionRef,
    sinks: &[SinkOccurrence],
    tainted: &FxHashSet<TaintedElement>,
    paths: &mut Vec<TaintPath>,
) -> Result<(), TaintError> {
    for sink in sinks.iter().filter(|s| s.file == source.file) {
        let Some(sink_function) = index.containing_function(&sink.file, sink.line)? else {
            continue;
        };

        // Source pattern used directly in the sink call's arguments.
        if sink_function.name == source_function.name {
            let direct = index
                .call_args_at_line(&sink.file, sink.line)?
                .iter()
                .any(|c| c.argument_expr.contains(source.pattern.as_str()));
            if direct && !has_sanitizer_between(index, registry, source, sink)? {
                paths.push(TaintPath::new(
                    source.clone(),
                    sink.clone(),
                    vec![
                        PathStep::DirectArgument {
                            location: format!("{}:{}", source.file, source.line),
                            pattern: source.pattern.clone(),
                        },
                        PathStep::Sink {
                            location: format!("{}:{}", sink.file, sink.line),
                            pattern: sink.pattern.clone(),
                        },
                    ],
                ));
                continue;
            }
        }

        for element in tainted {
            if element.function != sink_function.name {
                // Taint lives in a different function: delegate to the
                // cross-function tracer.
                let inter = trace_cross_function(
                    index,
                    registry,
                    source,
                    &element.var,
                    &element.function,
                    sink,
                    CROSS_FUNCTION_TRACE_DEPTH,
                    options.use_cfg,
                    options.max_paths_per_pair,
                )?;
                paths.extend(inter);
                continue;
            }

            let in_sink_args = index
                .call_args_at_line(&sink.file, sink.line)?
                .iter()
                .any(|c| c.argument_expr.contains(element.var.as_str()));

            let near_sink = !in_sink_args
                && element.var != "__return__"
                && index
                    .assignments_in_range(
                        &sink.file,
                        sink.line - SINK_ASSIGNMENT_WINDOW,
                        sink.line + SINK_ASSIGNMENT_WINDOW,
                    )?
                    .iter()
                    .any(|a| {
                        a.in_function == element.function
                            && (a.target_var == element.var
                                || a.source_expr.contains(element.var.as_str()))
                    });

            if (in_sink_args || near_sink)
                && !has_sanitizer_between(index, registry, source, sink)?
            {
                let mut sample: Vec<String> = tainted.iter().map(TaintedElement::key).collect();
                sample.sort();
                sample.truncate(5);
                paths.push(TaintPath::new(
                    source.clone(),
                    sink.clone(),
                    vec![
                        PathStep::Source {
                            location: format!("{}:{}", source.file, source.line),
                            var: element.var.clone(),
                            pattern: source.pattern.clone(),
                        },
                        PathStep::Propagation {
                            tainted_vars: sample,
                            transformations: tainted.len(),
                        },
                        PathStep::Sink {
                            location: format!("{}:{}", sink.file, sink.line),
                            pattern: sink.pattern.clone(),
                        },
                    ],
                ));
                break; // One path per sink is enough.
            }
        }
    }
    Ok(())
}

/// Legacy proximity-and-call-graph search, used when the index predates the
/// assignment relation. Still applies the sanitizer-between check.
fn trace_legacy<I: TaintIndex>(
    _index: &I,
    registry: &TaintRegistry,
    source: &SourceOccurrence,
    source_function: &FunctionRef,
    sinks: &[SinkOccurrence],
    call_graph: &FxHashMap<String, Vec<String>>,
    options: &TaintOptions,
) -> Result<Vec<TaintPath>, TaintError> {
    let mut paths = Vec::new();

    // BFS over the precomputed call graph.
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut queue: Vec<(FunctionRef, Vec<PathStep>, u32, bool)> = vec![(
        source_function.clone(),
        vec![PathStep::Source {
            location: format!("{}:{}", source.file, source.line),
            var: source.pattern.clone(),
            pattern: source.pattern.clone(),
        }],
        0,
        false,
    )];

    while let Some((function, steps, depth, mut sanitized)) = queue.pop() {
        if depth >= options.max_depth {
            continue;
        }
        let key = format!("{}:{}", function.file, function.name);
        if !visited.insert(key.clone()) {
            continue;
        }

        for callee in call_graph.get(&key).map(Vec::as_slice).unwrap_or(&[]) {
            if registry.is_sanitizer(callee) {
                sanitized = true;
            }

            for sink in sinks {
                let hits_sink = callee.contains(sink.name.as_str())
                    || callee.contains(sink.pattern.as_str())
                    || sink.name.contains(callee.as_str());
                if hits_sink && !sanitized {
                    let mut full = steps.clone();
                    full.push(PathStep::Call {
                        function: callee.clone(),
                        line: sink.line,
                    });
                    full.push(PathStep::Sink {
                        location: format!("{}:{}", sink.file, sink.line),
                        pattern: sink.pattern.clone(),
                    });
                    paths.push(TaintPath::new(source.clone(), sink.clone(), full));
                }
            }

            // Follow the callee when the call graph knows its definition.
            let stem = callee.rsplit('.').next().unwrap_or(callee);
            let suffix = format!(":{stem}");
            if let Some(known) = call_graph.keys().find(|k| k.ends_with(&suffix)) {
                let (file, name) = known.rsplit_once(':').unwrap_or(("", known.as_str()));
                let mut next_steps = steps.clone();
                next_steps.push(PathStep::Call {
                    function: callee.clone(),
                    line: 0,
                });
                queue.push((
                    FunctionRef {
                        file: file.to_string(),
                        name: name.to_string(),
                        line: 0,
                    },
                    next_steps,
                    depth + 1,
                    sanitized,
                ));
            }
        }
    }

    Ok(paths)
}

/// Retain one path per `(source_location, sink_location)` pair — the
/// shortest wins.
pub fn deduplicate_paths(paths: Vec<TaintPath>) -> Vec<TaintPath> {
    let mut unique: FxHashMap<(String, String), TaintPath> = FxHashMap::default();
    let mut order: Vec<(String, String)> = Vec::new();

    for path in paths {
        let key = path.pair_key();
        match unique.get(&key) {
            Some(existing) if existing.path_length <= path.path_length => {}
            Some(_) => {
                unique.insert(key, path);
            }
            None => {
                order.push(key.clone());
                unique.insert(key, path);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| unique.remove(&key))
        .collect()
}
