//! Cache precomputes: function spans, the call graph, and per-pattern
//! source/sink hit lists.
//!
//! Pattern hits are rebuilt only when the xxh3 signature of the canonically
//! serialized pattern map changes.

use rayon::prelude::*;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use seep_core::constants::LAST_FUNCTION_SPAN;
use seep_core::types::collections::{FxHashMap, FxHashSet};

use crate::index::orm_sink;
use crate::types::{PatternMap, SinkMetadata, SinkOccurrence, SourceOccurrence};

use super::{FunctionSpan, MemoryCache};

const METADATA_TEXT_LIMIT: usize = 200;

/// Precomputed pattern hit lists, guarded by the cache's `RwLock`.
#[derive(Debug, Default)]
pub(crate) struct PatternPrecompute {
    pub sources: FxHashMap<String, Vec<SourceOccurrence>>,
    pub sinks: FxHashMap<String, Vec<SinkOccurrence>>,
    pub orm_sinks: Vec<SinkOccurrence>,
    pub sources_signature: u64,
    pub sinks_signature: u64,
}

/// Stable signature of a pattern map: canonical category → sorted patterns,
/// serialized as JSON, hashed with xxh3.
pub(crate) fn pattern_signature(patterns: &PatternMap) -> u64 {
    let canonical: PatternMap = patterns
        .iter()
        .map(|(category, list)| {
            let mut sorted = list.clone();
            sorted.sort();
            (category.clone(), sorted)
        })
        .collect();
    let serialized = serde_json::to_string(&canonical).unwrap_or_default();
    xxh3_64(serialized.as_bytes())
}

fn truncated(text: &str) -> String {
    text.chars().take(METADATA_TEXT_LIMIT).collect()
}

impl MemoryCache {
    /// Resolve every function's line span per file. Span end prefers the
    /// symbol's own `end_line`, then the next function's line − 1, then the
    /// file's max symbol line, then the +200 heuristic.
    pub(super) fn build_function_spans(&mut self) {
        let mut functions_by_file: FxHashMap<String, Vec<(i64, String, Option<i64>)>> =
            FxHashMap::default();
        let mut max_line_by_file: FxHashMap<String, i64> = FxHashMap::default();

        for sym in &self.symbols {
            let entry = max_line_by_file.entry(sym.file.clone()).or_insert(0);
            if sym.line > *entry {
                *entry = sym.line;
            }
            if sym.symbol_type == "function" {
                functions_by_file.entry(sym.file.clone()).or_default().push((
                    sym.line,
                    sym.name.clone(),
                    sym.end_line,
                ));
            }
        }

        for (file, mut functions) in functions_by_file {
            functions.sort_by_key(|(line, _, _)| *line);
            let max_line = max_line_by_file.get(&file).copied().unwrap_or(0);
            let mut spans = Vec::with_capacity(functions.len());
            for (i, (start, name, end_line)) in functions.iter().enumerate() {
                let end = match end_line {
                    Some(end) if *end > *start => *end,
                    _ => match functions.get(i + 1) {
                        Some((next_start, _, _)) => next_start - 1,
                        None if max_line > *start => max_line,
                        None => start + LAST_FUNCTION_SPAN,
                    },
                };
                spans.push(FunctionSpan {
                    name: name.clone(),
                    start: *start,
                    end,
                });
            }
            self.function_spans.insert(file, spans);
        }
    }

    /// Pre-build the call graph: `"{file}:{name}"` → names of call symbols
    /// inside that function's span. A call belongs to the innermost span
    /// containing it, so nested functions never leak calls to their parent.
    pub(super) fn build_call_graph(&mut self) {
        for (file, spans) in &self.function_spans {
            for span in spans {
                self.call_graph
                    .insert(format!("{file}:{}", span.name), Vec::new());
            }
            let Some(indices) = self.symbols_by_file.get(file) else {
                continue;
            };
            for &i in indices {
                let sym = &self.symbols[i as usize];
                if sym.symbol_type != "call" {
                    continue;
                }
                // Innermost enclosing span: walk back from the last span
                // starting at or before the call line.
                let owner = spans
                    .iter()
                    .rev()
                    .find(|span| span.start <= sym.line && sym.line <= span.end);
                if let Some(span) = owner {
                    if let Some(calls) = self.call_graph.get_mut(&format!("{file}:{}", span.name)) {
                        calls.push(sym.name.clone());
                    }
                }
            }
        }
        debug!(functions = self.call_graph.len(), "call graph precomputed");
    }

    /// Recompute pattern hit lists when the supplied maps differ from the
    /// cached signatures. Empty maps leave the corresponding side untouched.
    pub(crate) fn refresh_patterns(&self, sources: &PatternMap, sinks: &PatternMap) {
        let sources_signature = if sources.is_empty() {
            None
        } else {
            Some(pattern_signature(sources))
        };
        let sinks_signature = if sinks.is_empty() {
            None
        } else {
            Some(pattern_signature(sinks))
        };

        {
            let guard = self
                .precompute
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let sources_stale = sources_signature.is_some_and(|s| s != guard.sources_signature);
            let sinks_stale = sinks_signature.is_some_and(|s| s != guard.sinks_signature);
            if !sources_stale && !sinks_stale {
                return;
            }
        }

        let new_sources = sources_signature.map(|signature| {
            let hits: FxHashMap<String, Vec<SourceOccurrence>> = sources
                .values()
                .flatten()
                .map(|pattern| (pattern.clone(), self.source_hits(pattern)))
                .collect();
            (signature, hits)
        });

        let new_sinks = sinks_signature.map(|signature| {
            let pairs: Vec<(String, String)> = sinks
                .iter()
                .flat_map(|(category, list)| {
                    list.iter().map(move |p| (category.clone(), p.clone()))
                })
                .collect();
            let hits: FxHashMap<String, Vec<SinkOccurrence>> = pairs
                .par_iter()
                .map(|(category, pattern)| (pattern.clone(), self.sink_hits(pattern, category)))
                .collect();
            (signature, hits)
        });

        let mut guard = self
            .precompute
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((signature, hits)) = new_sources {
            if signature != guard.sources_signature {
                guard.sources = hits;
                guard.sources_signature = signature;
                debug!(patterns = guard.sources.len(), "source patterns precomputed");
            }
        }
        if let Some((signature, hits)) = new_sinks {
            if signature != guard.sinks_signature {
                guard.sinks = hits;
                guard.sinks_signature = signature;
                guard.orm_sinks = self.orm_queries.iter().map(orm_sink).collect();
                debug!(patterns = guard.sinks.len(), "sink patterns precomputed");
            }
        }
    }

    /// Symbol hits for one source pattern. Only call and property symbols
    /// qualify — never variable declarations.
    fn source_hits(&self, pattern: &str) -> Vec<SourceOccurrence> {
        let mut hits = Vec::new();
        let mut seen: FxHashSet<(String, i64, i64)> = FxHashSet::default();
        let mut push = |sym: &seep_storage::queries::symbols::SymbolRow| {
            if (sym.symbol_type == "call" || sym.symbol_type == "property")
                && seen.insert((sym.file.clone(), sym.line, sym.column))
            {
                hits.push(SourceOccurrence {
                    file: sym.file.clone(),
                    name: sym.name.clone(),
                    line: sym.line,
                    column: sym.column,
                    pattern: pattern.to_string(),
                });
            }
        };

        if let Some(indices) = self.symbols_by_name.get(pattern) {
            for &i in indices {
                push(&self.symbols[i as usize]);
            }
        }
        if pattern.contains('.') {
            // Dotted patterns also substring-match qualified names.
            for sym in &self.symbols {
                if sym.name != pattern && sym.name.contains(pattern) {
                    push(sym);
                }
            }
        }
        hits
    }

    /// Sink hits for one pattern, drawn from the most specific relation
    /// available before falling back to the symbols table.
    fn sink_hits(&self, pattern: &str, category: &str) -> Vec<SinkOccurrence> {
        let mut hits: Vec<SinkOccurrence> = Vec::new();

        match category {
            "sql" => {
                for query in &self.sql_queries {
                    let key = (query.file.clone(), query.line);
                    if let Some(indices) = self.calls_by_line.get(&key) {
                        for &i in indices.iter() {
                            let call = &self.call_args[i as usize];
                            let callee = &call.callee_function;
                            if callee.contains(pattern) || pattern.contains(callee.as_str()) {
                                let mut metadata = SinkMetadata::from_relation("sql_queries");
                                metadata.query_text = Some(truncated(&query.query_text));
                                metadata.command = Some(query.command.clone());
                                hits.push(SinkOccurrence {
                                    file: query.file.clone(),
                                    name: callee.clone(),
                                    line: query.line,
                                    column: 0,
                                    pattern: pattern.to_string(),
                                    category: category.to_string(),
                                    metadata: Some(metadata),
                                });
                            }
                        }
                    }
                }
                for query in &self.orm_queries {
                    if query.query_type.contains(pattern) {
                        let mut metadata = SinkMetadata::from_relation("orm_queries");
                        metadata.query_type = Some(query.query_type.clone());
                        hits.push(SinkOccurrence {
                            file: query.file.clone(),
                            name: query.query_type.clone(),
                            line: query.line,
                            column: 0,
                            pattern: pattern.to_string(),
                            category: category.to_string(),
                            metadata: Some(metadata),
                        });
                    }
                }
            }
            "xss" => {
                if pattern == "dangerouslySetInnerHTML" {
                    for hook in &self.ui_hooks {
                        if hook.hook_name.contains(pattern)
                            || hook.dependencies.iter().any(|d| d.contains(pattern))
                        {
                            let mut metadata = SinkMetadata::from_relation("react_hooks");
                            metadata.hook = Some(hook.hook_name.clone());
                            hits.push(SinkOccurrence {
                                file: hook.file.clone(),
                                name: pattern.to_string(),
                                line: hook.line,
                                column: 0,
                                pattern: pattern.to_string(),
                                category: category.to_string(),
                                metadata: Some(metadata),
                            });
                        }
                    }
                }
                self.call_arg_sink_hits(pattern, category, &mut hits);
            }
            "command" | "path" => {
                self.call_arg_sink_hits(pattern, category, &mut hits);
            }
            _ => {}
        }

        self.symbol_sink_hits(pattern, category, &mut hits);
        hits
    }

    fn call_arg_sink_hits(&self, pattern: &str, category: &str, hits: &mut Vec<SinkOccurrence>) {
        let suffix = format!(".{pattern}");
        for call in &self.call_args {
            let callee = &call.callee_function;
            if callee.contains(pattern) || callee.ends_with(&suffix) {
                let mut metadata = SinkMetadata::from_relation("function_call_args");
                metadata.arguments = Some(truncated(&call.argument_expr));
                hits.push(SinkOccurrence {
                    file: call.file.clone(),
                    name: callee.clone(),
                    line: call.line,
                    column: 0,
                    pattern: pattern.to_string(),
                    category: category.to_string(),
                    metadata: Some(metadata),
                });
            }
        }
    }

    /// Fallback over the symbols relation (call type only). Chained-method
    /// patterns decompose into `(base, final)` and require both on one line.
    fn symbol_sink_hits(&self, pattern: &str, category: &str, hits: &mut Vec<SinkOccurrence>) {
        let already = |hits: &[SinkOccurrence], file: &str, line: i64| {
            hits.iter().any(|h| h.file == file && h.line == line)
        };

        if pattern.contains("().") {
            let flattened = pattern.replace("().", ".");
            let parts: Vec<&str> = flattened.split('.').collect();
            let final_method = parts.last().copied().unwrap_or(pattern);
            let base_method = parts[..parts.len().saturating_sub(1)].join(".");
            let suffix = format!(".{final_method}");

            for sym in self.symbols_of_type("call") {
                if sym.name != final_method && !sym.name.ends_with(&suffix) {
                    continue;
                }
                let base_on_line = self
                    .symbols_by_line
                    .get(&(sym.file.clone(), sym.line))
                    .map(|v| v.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .map(|&i| &self.symbols[i as usize])
                    .any(|b| b.symbol_type == "call" && b.name.contains(&base_method));
                if base_on_line && !already(hits, &sym.file, sym.line) {
                    hits.push(SinkOccurrence {
                        file: sym.file.clone(),
                        name: pattern.to_string(),
                        line: sym.line,
                        column: sym.column,
                        pattern: pattern.to_string(),
                        category: category.to_string(),
                        metadata: Some(SinkMetadata::from_relation("symbols")),
                    });
                }
            }
            return;
        }

        let suffix = format!(".{pattern}");
        for sym in self.symbols_of_type("call") {
            if (sym.name == pattern || sym.name.ends_with(&suffix))
                && !already(hits, &sym.file, sym.line)
            {
                hits.push(SinkOccurrence {
                    file: sym.file.clone(),
                    name: sym.name.clone(),
                    line: sym.line,
                    column: sym.column,
                    pattern: pattern.to_string(),
                    category: category.to_string(),
                    metadata: Some(SinkMetadata::from_relation("symbols")),
                });
            }
        }
    }
}
