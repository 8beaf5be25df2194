//! Index backends.
//!
//! `TaintIndex` is the query surface every analysis stage runs against. The
//! eager [`crate::cache::MemoryCache`] answers from in-memory indexes; the
//! [`DirectIndex`] degraded mode answers each call with a SQL query against
//! the store. Same algorithms either way.

use rusqlite::Connection;
use seep_core::types::collections::FxHashMap;

use seep_core::errors::StoreError;
use seep_storage::queries::assignments::{self, AssignmentRow};
use seep_storage::queries::call_args::{self, CallArgRow};
use seep_storage::queries::cfg::{self, CfgBlockRow, CfgEdgeRow, CfgStatementRow};
use seep_storage::queries::returns::{self, ReturnRow};
use seep_storage::queries::specialized::{self, OrmQueryRow};
use seep_storage::queries::symbols::{self, FunctionRef, SymbolRow};
use seep_storage::schema;

use crate::types::{PatternMap, SinkMetadata, SinkOccurrence, SourceOccurrence};

/// Blocks and edges of one function's CFG.
#[derive(Debug, Clone, Default)]
pub struct CfgFunction {
    pub blocks: Vec<CfgBlockRow>,
    pub edges: Vec<CfgEdgeRow>,
}

/// Query surface the analysis stages run against.
pub trait TaintIndex {
    /// Concrete source occurrences for the given pattern map.
    fn find_sources(&self, patterns: &PatternMap) -> Result<Vec<SourceOccurrence>, StoreError>;

    /// Concrete sink occurrences for the given pattern map, including the
    /// implicit ORM sinks.
    fn find_sinks(&self, patterns: &PatternMap) -> Result<Vec<SinkOccurrence>, StoreError>;

    /// The function definition enclosing a location.
    fn containing_function(&self, file: &str, line: i64)
        -> Result<Option<FunctionRef>, StoreError>;

    /// Inclusive line range of the function starting at `function_line`.
    fn function_range(&self, file: &str, function_line: i64) -> Result<(i64, i64), StoreError>;

    /// Call-type symbols strictly between two lines of a file.
    fn call_symbols_between(
        &self,
        file: &str,
        after: i64,
        before: i64,
    ) -> Result<Vec<SymbolRow>, StoreError>;

    /// Assignments in a file within an inclusive line range.
    fn assignments_in_range(
        &self,
        file: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<AssignmentRow>, StoreError>;

    /// Assignments belonging to one function of one file.
    fn assignments_in_function(
        &self,
        file: &str,
        function: &str,
    ) -> Result<Vec<AssignmentRow>, StoreError>;

    /// All assignments of one file.
    fn assignments_in_file(&self, file: &str) -> Result<Vec<AssignmentRow>, StoreError>;

    /// Whether the assignments relation exists at all. When it does not, the
    /// legacy proximity fallback runs instead of worklist propagation.
    fn has_assignments(&self) -> Result<bool, StoreError>;

    /// Argument sites inside one caller function.
    fn call_args_by_caller(&self, file: &str, caller: &str)
        -> Result<Vec<CallArgRow>, StoreError>;

    /// Argument sites at an exact line.
    fn call_args_at_line(&self, file: &str, line: i64) -> Result<Vec<CallArgRow>, StoreError>;

    /// Call sites of one callee within a file.
    fn call_sites_of(&self, file: &str, callee: &str) -> Result<Vec<CallArgRow>, StoreError>;

    /// Return sites of one function.
    fn returns_of(&self, file: &str, function: &str) -> Result<Vec<ReturnRow>, StoreError>;

    /// Whether CFG data exists for a file.
    fn cfg_available(&self, file: &str) -> Result<bool, StoreError>;

    /// Whether any condition or loop-condition block sits strictly between
    /// two lines of a file.
    fn has_conditional_blocks_between(
        &self,
        file: &str,
        after: i64,
        before: i64,
    ) -> Result<bool, StoreError>;

    /// CFG of one function. Function names here are CFG stems.
    fn cfg_function(&self, file: &str, function: &str) -> Result<CfgFunction, StoreError>;

    /// Statements of a block, in statement order.
    fn block_statements(&self, block_id: i64) -> Result<Vec<CfgStatementRow>, StoreError>;

    /// Whether a variable is used inside a line range of a file.
    fn variable_used_in_range(
        &self,
        file: &str,
        variable: &str,
        start: i64,
        end: i64,
    ) -> Result<bool, StoreError>;

    /// Function-reference properties of an object-literal variable.
    fn object_literal_callees(&self, variable: &str) -> Result<Vec<String>, StoreError>;

    /// Count of network/download/scraping indicators near a line.
    fn network_indicators_near(
        &self,
        file: &str,
        line: i64,
        window: i64,
    ) -> Result<i64, StoreError>;

    /// The precomputed call graph: `"{file}:{name}"` → callee names. An
    /// accelerator only; authoritative call data lives in the call-args
    /// relation.
    fn call_graph(&self) -> Result<FxHashMap<String, Vec<String>>, StoreError>;
}

/// Degraded-mode backend: every lookup is a SQL query against the store.
pub struct DirectIndex<'c> {
    conn: &'c Connection,
}

impl<'c> DirectIndex<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn sinks_for_pattern(
        &self,
        pattern: &str,
        category: &str,
    ) -> Result<Vec<SinkOccurrence>, StoreError> {
        let mut hits: Vec<SinkOccurrence> = Vec::new();
        let mut push = |sym: &SymbolRow, name: String| {
            if !hits.iter().any(|h| h.file == sym.file && h.line == sym.line) {
                hits.push(SinkOccurrence {
                    file: sym.file.clone(),
                    name,
                    line: sym.line,
                    column: sym.column,
                    pattern: pattern.to_string(),
                    category: category.to_string(),
                    metadata: Some(SinkMetadata::from_relation("symbols")),
                });
            }
        };

        if pattern.contains("().") {
            // Chained method: require the final method call and a base-method
            // call on the same line of the same file.
            let flattened = pattern.replace("().", ".");
            let parts: Vec<&str> = flattened.split('.').collect();
            let final_method = parts.last().copied().unwrap_or(pattern);
            let base_method = parts[..parts.len().saturating_sub(1)].join(".");

            let mut candidates = symbols::symbols_named(self.conn, final_method, &["call"])?;
            candidates.extend(symbols::call_symbols_with_suffix(self.conn, final_method)?);
            for sym in candidates {
                let base_hits = symbols::call_symbols_in_range(self.conn, &sym.file, sym.line, sym.line)?;
                if base_hits.iter().any(|b| b.name.contains(&base_method)) {
                    push(&sym, pattern.to_string());
                }
            }
        } else {
            for sym in symbols::symbols_named(self.conn, pattern, &["call"])? {
                let name = sym.name.clone();
                push(&sym, name);
            }
            for sym in symbols::call_symbols_with_suffix(self.conn, pattern)? {
                let name = sym.name.clone();
                push(&sym, name);
            }
        }
        Ok(hits)
    }
}

impl TaintIndex for DirectIndex<'_> {
    fn find_sources(&self, patterns: &PatternMap) -> Result<Vec<SourceOccurrence>, StoreError> {
        let mut sources = Vec::new();
        for pattern_list in patterns.values() {
            for pattern in pattern_list {
                let symbols = if pattern.contains('.') {
                    symbols::symbols_containing(self.conn, pattern, &["call", "property"])?
                } else {
                    symbols::symbols_named(self.conn, pattern, &["call", "property"])?
                };
                for sym in symbols {
                    sources.push(SourceOccurrence {
                        file: sym.file,
                        name: sym.name,
                        line: sym.line,
                        column: sym.column,
                        pattern: pattern.clone(),
                    });
                }
            }
        }
        Ok(sources)
    }

    fn find_sinks(&self, patterns: &PatternMap) -> Result<Vec<SinkOccurrence>, StoreError> {
        let mut sinks = Vec::new();
        for (category, pattern_list) in patterns {
            for pattern in pattern_list {
                sinks.extend(self.sinks_for_pattern(pattern, category)?);
            }
        }
        // ORM query sites are implicit SQL sinks regardless of pattern list.
        for orm in specialized::load_orm_queries(self.conn)? {
            sinks.push(orm_sink(&orm));
        }
        Ok(sinks)
    }

    fn containing_function(
        &self,
        file: &str,
        line: i64,
    ) -> Result<Option<FunctionRef>, StoreError> {
        symbols::containing_function(self.conn, file, line)
    }

    fn function_range(&self, file: &str, function_line: i64) -> Result<(i64, i64), StoreError> {
        symbols::function_range(self.conn, file, function_line)
    }

    fn call_symbols_between(
        &self,
        file: &str,
        after: i64,
        before: i64,
    ) -> Result<Vec<SymbolRow>, StoreError> {
        symbols::call_symbols_between(self.conn, file, after, before)
    }

    fn assignments_in_range(
        &self,
        file: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<AssignmentRow>, StoreError> {
        assignments::assignments_in_range(self.conn, file, start, end)
    }

    fn assignments_in_function(
        &self,
        file: &str,
        function: &str,
    ) -> Result<Vec<AssignmentRow>, StoreError> {
        assignments::assignments_in_function(self.conn, file, function)
    }

    fn assignments_in_file(&self, file: &str) -> Result<Vec<AssignmentRow>, StoreError> {
        assignments::assignments_in_file(self.conn, file)
    }

    fn has_assignments(&self) -> Result<bool, StoreError> {
        schema::has_table(self.conn, "assignments")
    }

    fn call_args_by_caller(
        &self,
        file: &str,
        caller: &str,
    ) -> Result<Vec<CallArgRow>, StoreError> {
        call_args::call_args_by_caller(self.conn, file, caller)
    }

    fn call_args_at_line(&self, file: &str, line: i64) -> Result<Vec<CallArgRow>, StoreError> {
        call_args::call_args_at_line(self.conn, file, line)
    }

    fn call_sites_of(&self, file: &str, callee: &str) -> Result<Vec<CallArgRow>, StoreError> {
        call_args::call_sites_of(self.conn, file, callee)
    }

    fn returns_of(&self, file: &str, function: &str) -> Result<Vec<ReturnRow>, StoreError> {
        returns::returns_of(self.conn, file, function)
    }

    fn cfg_available(&self, file: &str) -> Result<bool, StoreError> {
        cfg::cfg_available(self.conn, file)
    }

    fn has_conditional_blocks_between(
        &self,
        file: &str,
        after: i64,
        before: i64,
    ) -> Result<bool, StoreError> {
        cfg::has_conditional_blocks_between(self.conn, file, after, before)
    }

    fn cfg_function(&self, file: &str, function: &str) -> Result<CfgFunction, StoreError> {
        Ok(CfgFunction {
            blocks: cfg::blocks_for_function(self.conn, file, function)?,
            edges: cfg::edges_for_function(self.conn, file, function)?,
        })
    }

    fn block_statements(&self, block_id: i64) -> Result<Vec<CfgStatementRow>, StoreError> {
        cfg::statements_for_block(self.conn, block_id)
    }

    fn variable_used_in_range(
        &self,
        file: &str,
        variable: &str,
        start: i64,
        end: i64,
    ) -> Result<bool, StoreError> {
        specialized::variable_used_in_range(self.conn, file, variable, start, end)
    }

    fn object_literal_callees(&self, variable: &str) -> Result<Vec<String>, StoreError> {
        specialized::object_literal_callees(self.conn, variable)
    }

    fn network_indicators_near(
        &self,
        file: &str,
        line: i64,
        window: i64,
    ) -> Result<i64, StoreError> {
        symbols::network_indicators_near(self.conn, file, line, window)
    }

    fn call_graph(&self) -> Result<FxHashMap<String, Vec<String>>, StoreError> {
        let mut graph: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for func in symbols::function_symbols(self.conn)? {
            let (start, end) = symbols::function_range(self.conn, &func.file, func.line)?;
            let calls = symbols::call_symbols_in_range(self.conn, &func.file, start, end)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            graph.insert(format!("{}:{}", func.file, func.name), calls);
        }
        Ok(graph)
    }
}

/// An ORM query site lifted into an implicit SQL sink.
pub(crate) fn orm_sink(orm: &OrmQueryRow) -> SinkOccurrence {
    let mut metadata = SinkMetadata::from_relation("orm_queries");
    metadata.query_type = Some(orm.query_type.clone());
    SinkOccurrence {
        file: orm.file.clone(),
        name: orm.query_type.clone(),
        line: orm.line,
        column: 0,
        pattern: orm.query_type.clone(),
        category: "sql".to_string(),
        metadata: Some(metadata),
    }
}
