//! Eager in-memory index cache.
//!
//! Single-shot load of the index into typed arenas with one index per access
//! pattern the engine needs, trading memory for O(1)/O(matches) lookups.
//! Never mutated during analysis; the pattern precompute tables behind the
//! `RwLock` are the only post-load mutation point.

mod precompute;

use std::mem;
use std::sync::RwLock;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use seep_core::errors::StoreError;
use seep_core::memory::{available_memory_mb, recommended_limit_mb, MAX_CACHE_LIMIT_MB, MIN_CACHE_LIMIT_MB};
use seep_core::types::collections::{FxHashMap, SmallVec4};
use seep_storage::queries::assignments::{self, AssignmentRow};
use seep_storage::queries::call_args::{self, CallArgRow};
use seep_storage::queries::cfg::{self, CfgBlockRow, CfgEdgeRow, CfgStatementRow};
use seep_storage::queries::returns::{self, ReturnRow};
use seep_storage::queries::specialized::{
    self, ApiEndpointRow, JwtPatternRow, ObjectLiteralRow, OrmQueryRow, SqlQueryRow, UiHookRow,
    VariableUsageRow,
};
use seep_storage::queries::symbols::{self, FunctionRef, SymbolRow};
use seep_storage::schema;

use crate::index::{CfgFunction, TaintIndex};
use crate::types::{PatternMap, SinkOccurrence, SourceOccurrence};

pub(crate) use precompute::PatternPrecompute;

/// Per-row index bookkeeping overhead estimate, in bytes.
const INDEX_OVERHEAD: usize = 100;

/// A function's resolved line span within one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpan {
    pub name: String,
    pub start: i64,
    pub end: i64,
}

/// Result of a preload attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreloadOutcome {
    Loaded,
    /// The soft memory ceiling would be breached; caller falls back to
    /// direct-query mode.
    Refused { used_mb: u64, limit_mb: u64 },
}

/// Pre-loaded index cache with per-access-pattern indexes.
pub struct MemoryCache {
    limit_bytes: usize,
    bytes_used: usize,
    loaded: bool,

    // Primary arenas. Indexes below hold u32 positions into these.
    pub(crate) symbols: Vec<SymbolRow>,
    pub(crate) assignments: Vec<AssignmentRow>,
    pub(crate) call_args: Vec<CallArgRow>,
    pub(crate) returns: Vec<ReturnRow>,
    pub(crate) cfg_blocks: Vec<CfgBlockRow>,
    pub(crate) cfg_edges: Vec<CfgEdgeRow>,
    pub(crate) cfg_statements: Vec<CfgStatementRow>,
    pub(crate) sql_queries: Vec<SqlQueryRow>,
    pub(crate) orm_queries: Vec<OrmQueryRow>,
    pub(crate) ui_hooks: Vec<UiHookRow>,
    pub(crate) variable_usage: Vec<VariableUsageRow>,
    pub(crate) api_endpoints: Vec<ApiEndpointRow>,
    pub(crate) jwt_patterns: Vec<JwtPatternRow>,
    pub(crate) object_literals: Vec<ObjectLiteralRow>,

    // Symbol indexes.
    pub(crate) symbols_by_line: FxHashMap<(String, i64), SmallVec4<u32>>,
    pub(crate) symbols_by_name: FxHashMap<String, Vec<u32>>,
    symbols_by_file: FxHashMap<String, Vec<u32>>,
    symbols_by_type: FxHashMap<String, Vec<u32>>,

    // Assignment indexes.
    assignments_by_function: FxHashMap<(String, String), Vec<u32>>,
    assignments_by_target: FxHashMap<String, Vec<u32>>,
    assignments_by_file: FxHashMap<String, Vec<u32>>,

    // Call-arg indexes.
    pub(crate) calls_by_caller: FxHashMap<(String, String), Vec<u32>>,
    pub(crate) calls_by_callee: FxHashMap<String, Vec<u32>>,
    calls_by_file: FxHashMap<String, Vec<u32>>,
    pub(crate) calls_by_line: FxHashMap<(String, i64), SmallVec4<u32>>,

    // Return index.
    returns_by_function: FxHashMap<(String, String), Vec<u32>>,

    // CFG indexes.
    cfg_blocks_by_file: FxHashMap<String, Vec<u32>>,
    cfg_blocks_by_function: FxHashMap<(String, String), Vec<u32>>,
    cfg_blocks_by_id: FxHashMap<i64, u32>,
    cfg_edges_by_function: FxHashMap<(String, String), Vec<u32>>,
    cfg_edges_by_source: FxHashMap<i64, Vec<u32>>,
    cfg_edges_by_target: FxHashMap<i64, Vec<u32>>,
    cfg_statements_by_block: FxHashMap<i64, Vec<u32>>,

    // Specialized indexes.
    usage_by_file: FxHashMap<String, Vec<u32>>,
    object_literals_by_variable: FxHashMap<String, Vec<u32>>,

    // Precomputes.
    function_spans: FxHashMap<String, Vec<FunctionSpan>>,
    call_graph: FxHashMap<String, Vec<String>>,
    has_assignments_relation: bool,
    precompute: RwLock<PatternPrecompute>,
}

impl MemoryCache {
    /// Create an empty cache with a soft memory ceiling.
    pub fn new(limit_mb: u64) -> Self {
        Self {
            limit_bytes: (limit_mb as usize) * 1024 * 1024,
            bytes_used: 0,
            loaded: false,
            symbols: Vec::new(),
            assignments: Vec::new(),
            call_args: Vec::new(),
            returns: Vec::new(),
            cfg_blocks: Vec::new(),
            cfg_edges: Vec::new(),
            cfg_statements: Vec::new(),
            sql_queries: Vec::new(),
            orm_queries: Vec::new(),
            ui_hooks: Vec::new(),
            variable_usage: Vec::new(),
            api_endpoints: Vec::new(),
            jwt_patterns: Vec::new(),
            object_literals: Vec::new(),
            symbols_by_line: FxHashMap::default(),
            symbols_by_name: FxHashMap::default(),
            symbols_by_file: FxHashMap::default(),
            symbols_by_type: FxHashMap::default(),
            assignments_by_function: FxHashMap::default(),
            assignments_by_target: FxHashMap::default(),
            assignments_by_file: FxHashMap::default(),
            calls_by_caller: FxHashMap::default(),
            calls_by_callee: FxHashMap::default(),
            calls_by_file: FxHashMap::default(),
            calls_by_line: FxHashMap::default(),
            returns_by_function: FxHashMap::default(),
            cfg_blocks_by_file: FxHashMap::default(),
            cfg_blocks_by_function: FxHashMap::default(),
            cfg_blocks_by_id: FxHashMap::default(),
            cfg_edges_by_function: FxHashMap::default(),
            cfg_edges_by_source: FxHashMap::default(),
            cfg_edges_by_target: FxHashMap::default(),
            cfg_statements_by_block: FxHashMap::default(),
            usage_by_file: FxHashMap::default(),
            object_literals_by_variable: FxHashMap::default(),
            function_spans: FxHashMap::default(),
            call_graph: FxHashMap::default(),
            has_assignments_relation: false,
            precompute: RwLock::new(PatternPrecompute::default()),
        }
    }

    /// Attempt a preload under memory governance. `None` means the caller
    /// should fall back to direct-query mode.
    pub fn attempt_preload(
        conn: &Connection,
        limit_mb: Option<u64>,
        sources: &PatternMap,
        sinks: &PatternMap,
    ) -> Result<Option<MemoryCache>, StoreError> {
        let limit = limit_mb
            .unwrap_or_else(recommended_limit_mb)
            .clamp(MIN_CACHE_LIMIT_MB, MAX_CACHE_LIMIT_MB);

        if let Some(available) = available_memory_mb() {
            if available < limit / 2 {
                warn!(available_mb = available, limit_mb = limit, "insufficient RAM for cache, falling back to direct queries");
                return Ok(None);
            }
        }

        let mut cache = MemoryCache::new(limit);
        match cache.preload(conn, sources, sinks)? {
            PreloadOutcome::Loaded => {
                info!(used_mb = cache.get_memory_usage_mb(), "memory cache enabled");
                Ok(Some(cache))
            }
            PreloadOutcome::Refused { used_mb, limit_mb } => {
                warn!(used_mb, limit_mb, "cache preload refused, falling back to direct queries");
                Ok(None)
            }
        }
    }

    /// Load the index into memory and build every index and precompute.
    ///
    /// Idempotent: a second preload on a loaded cache only refreshes the
    /// pattern precomputes, and only when the pattern signatures changed.
    pub fn preload(
        &mut self,
        conn: &Connection,
        sources: &PatternMap,
        sinks: &PatternMap,
    ) -> Result<PreloadOutcome, StoreError> {
        if self.loaded {
            debug!("cache already loaded, checking pattern signatures");
            self.refresh_patterns(sources, sinks);
            return Ok(PreloadOutcome::Loaded);
        }

        self.has_assignments_relation =
            schema::has_table(conn, "assignments")? && schema::has_table(conn, "assignment_sources")?;

        self.load_symbols(conn)?;
        if self.has_assignments_relation {
            self.load_assignments(conn)?;
        }
        self.load_call_args(conn)?;
        self.load_returns(conn)?;
        self.load_cfg(conn)?;
        self.load_specialized(conn)?;

        if self.bytes_used > self.limit_bytes {
            let outcome = PreloadOutcome::Refused {
                used_mb: (self.bytes_used / 1024 / 1024) as u64,
                limit_mb: (self.limit_bytes / 1024 / 1024) as u64,
            };
            return Ok(outcome);
        }

        self.build_function_spans();
        self.build_call_graph();
        self.refresh_patterns(sources, sinks);

        info!(
            symbols = self.symbols.len(),
            assignments = self.assignments.len(),
            call_args = self.call_args.len(),
            cfg_blocks = self.cfg_blocks.len(),
            used_mb = self.get_memory_usage_mb(),
            "index preloaded"
        );
        self.loaded = true;
        Ok(PreloadOutcome::Loaded)
    }

    /// Approximate resident size of the cache in MB.
    pub fn get_memory_usage_mb(&self) -> f64 {
        self.bytes_used as f64 / 1024.0 / 1024.0
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Current (sources, sinks) pattern signatures.
    pub fn pattern_signatures(&self) -> (u64, u64) {
        let guard = self
            .precompute
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (guard.sources_signature, guard.sinks_signature)
    }

    pub(crate) fn function_spans_for(&self, file: &str) -> &[FunctionSpan] {
        self.function_spans
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn load_symbols(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.symbols = symbols::load_symbols(conn)?;
        for (i, sym) in self.symbols.iter().enumerate() {
            let i = i as u32;
            self.symbols_by_line
                .entry((sym.file.clone(), sym.line))
                .or_default()
                .push(i);
            self.symbols_by_name.entry(sym.name.clone()).or_default().push(i);
            self.symbols_by_file.entry(sym.file.clone()).or_default().push(i);
            self.symbols_by_type
                .entry(sym.symbol_type.clone())
                .or_default()
                .push(i);
            self.bytes_used += mem::size_of::<SymbolRow>()
                + sym.file.len()
                + sym.name.len()
                + sym.symbol_type.len()
                + 2 * INDEX_OVERHEAD;
        }
        debug!(count = self.symbols.len(), "loaded symbols");
        Ok(())
    }

    fn load_assignments(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.assignments = assignments::load_assignments(conn)?;
        for (i, a) in self.assignments.iter().enumerate() {
            let i = i as u32;
            self.assignments_by_function
                .entry((a.file.clone(), a.in_function.clone()))
                .or_default()
                .push(i);
            self.assignments_by_target
                .entry(a.target_var.clone())
                .or_default()
                .push(i);
            self.assignments_by_file.entry(a.file.clone()).or_default().push(i);
            self.bytes_used += mem::size_of::<AssignmentRow>()
                + a.file.len()
                + a.target_var.len()
                + a.source_expr.len()
                + a.in_function.len()
                + a.source_vars.iter().map(String::len).sum::<usize>()
                + INDEX_OVERHEAD;
        }
        debug!(count = self.assignments.len(), "loaded assignments");
        Ok(())
    }

    fn load_call_args(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.call_args = call_args::load_call_args(conn)?;
        for (i, c) in self.call_args.iter().enumerate() {
            let i = i as u32;
            self.calls_by_caller
                .entry((c.file.clone(), c.caller_function.clone()))
                .or_default()
                .push(i);
            self.calls_by_callee
                .entry(c.callee_function.clone())
                .or_default()
                .push(i);
            self.calls_by_file.entry(c.file.clone()).or_default().push(i);
            self.calls_by_line
                .entry((c.file.clone(), c.line))
                .or_default()
                .push(i);
            self.bytes_used += mem::size_of::<CallArgRow>()
                + c.file.len()
                + c.caller_function.len()
                + c.callee_function.len()
                + c.param_name.len()
                + c.argument_expr.len()
                + INDEX_OVERHEAD;
        }
        debug!(count = self.call_args.len(), "loaded call args");
        Ok(())
    }

    fn load_returns(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.returns = returns::load_returns(conn)?;
        for (i, r) in self.returns.iter().enumerate() {
            self.returns_by_function
                .entry((r.file.clone(), r.function_name.clone()))
                .or_default()
                .push(i as u32);
            self.bytes_used += mem::size_of::<ReturnRow>()
                + r.file.len()
                + r.function_name.len()
                + r.return_expr.len()
                + r.return_vars.iter().map(String::len).sum::<usize>()
                + INDEX_OVERHEAD / 2;
        }
        debug!(count = self.returns.len(), "loaded returns");
        Ok(())
    }

    fn load_cfg(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.cfg_blocks = cfg::load_blocks(conn)?;
        for (i, b) in self.cfg_blocks.iter().enumerate() {
            let i = i as u32;
            self.cfg_blocks_by_file.entry(b.file.clone()).or_default().push(i);
            self.cfg_blocks_by_function
                .entry((b.file.clone(), b.function_name.clone()))
                .or_default()
                .push(i);
            self.cfg_blocks_by_id.insert(b.id, i);
            self.bytes_used += mem::size_of::<CfgBlockRow>()
                + b.file.len()
                + b.function_name.len()
                + b.block_type.len()
                + INDEX_OVERHEAD;
        }

        self.cfg_edges = cfg::load_edges(conn)?;
        for (i, e) in self.cfg_edges.iter().enumerate() {
            let i = i as u32;
            self.cfg_edges_by_function
                .entry((e.file.clone(), e.function_name.clone()))
                .or_default()
                .push(i);
            self.cfg_edges_by_source.entry(e.source_block_id).or_default().push(i);
            self.cfg_edges_by_target.entry(e.target_block_id).or_default().push(i);
            self.bytes_used += mem::size_of::<CfgEdgeRow>()
                + e.file.len()
                + e.function_name.len()
                + e.edge_type.len()
                + INDEX_OVERHEAD;
        }

        self.cfg_statements = cfg::load_statements(conn)?;
        for (i, s) in self.cfg_statements.iter().enumerate() {
            self.cfg_statements_by_block
                .entry(s.block_id)
                .or_default()
                .push(i as u32);
            self.bytes_used += mem::size_of::<CfgStatementRow>()
                + s.statement_type.len()
                + s.statement_text.len()
                + INDEX_OVERHEAD / 2;
        }
        debug!(
            blocks = self.cfg_blocks.len(),
            edges = self.cfg_edges.len(),
            statements = self.cfg_statements.len(),
            "loaded CFG"
        );
        Ok(())
    }

    fn load_specialized(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.sql_queries = specialized::load_sql_queries(conn)?;
        for q in &self.sql_queries {
            self.bytes_used +=
                mem::size_of::<SqlQueryRow>() + q.file.len() + q.query_text.len() + INDEX_OVERHEAD / 2;
        }

        self.orm_queries = specialized::load_orm_queries(conn)?;
        for q in &self.orm_queries {
            self.bytes_used +=
                mem::size_of::<OrmQueryRow>() + q.file.len() + q.query_type.len() + q.includes.len();
        }

        self.ui_hooks = specialized::load_ui_hooks(conn)?;
        for h in &self.ui_hooks {
            self.bytes_used += mem::size_of::<UiHookRow>()
                + h.file.len()
                + h.hook_name.len()
                + h.dependencies.iter().map(String::len).sum::<usize>();
        }

        self.variable_usage = specialized::load_variable_usage(conn)?;
        for (i, u) in self.variable_usage.iter().enumerate() {
            self.usage_by_file.entry(u.file.clone()).or_default().push(i as u32);
            self.bytes_used +=
                mem::size_of::<VariableUsageRow>() + u.file.len() + u.variable_name.len() + INDEX_OVERHEAD / 2;
        }

        self.api_endpoints = specialized::load_api_endpoints(conn)?;
        for e in &self.api_endpoints {
            self.bytes_used += mem::size_of::<ApiEndpointRow>()
                + e.file.len()
                + e.pattern.len()
                + e.handler_function.len();
        }

        self.jwt_patterns = specialized::load_jwt_patterns(conn)?;
        for p in &self.jwt_patterns {
            self.bytes_used += mem::size_of::<JwtPatternRow>() + p.file.len() + p.pattern_text.len();
        }

        self.object_literals = specialized::load_object_literals(conn)?;
        for (i, o) in self.object_literals.iter().enumerate() {
            self.object_literals_by_variable
                .entry(o.variable_name.clone())
                .or_default()
                .push(i as u32);
            self.bytes_used += mem::size_of::<ObjectLiteralRow>()
                + o.variable_name.len()
                + o.property_value.len()
                + INDEX_OVERHEAD / 2;
        }

        debug!(
            sql_queries = self.sql_queries.len(),
            orm_queries = self.orm_queries.len(),
            ui_hooks = self.ui_hooks.len(),
            variable_usage = self.variable_usage.len(),
            api_endpoints = self.api_endpoints.len(),
            jwt_patterns = self.jwt_patterns.len(),
            object_literals = self.object_literals.len(),
            "loaded specialized relations"
        );
        Ok(())
    }

    /// Assignments writing to one target variable, across the project.
    pub fn assignments_targeting(&self, target: &str) -> Vec<&AssignmentRow> {
        self.assignments_by_target
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.assignments[i as usize])
            .collect()
    }

    /// All argument sites in one file.
    pub fn calls_in_file(&self, file: &str) -> Vec<&CallArgRow> {
        self.calls_by_file
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.call_args[i as usize])
            .collect()
    }

    /// CFG block by id.
    pub fn cfg_block_by_id(&self, id: i64) -> Option<&CfgBlockRow> {
        self.cfg_blocks_by_id
            .get(&id)
            .map(|&i| &self.cfg_blocks[i as usize])
    }

    /// Edges leaving one block.
    pub fn cfg_edges_from(&self, block_id: i64) -> Vec<&CfgEdgeRow> {
        self.cfg_edges_by_source
            .get(&block_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.cfg_edges[i as usize])
            .collect()
    }

    /// Edges entering one block.
    pub fn cfg_edges_to(&self, block_id: i64) -> Vec<&CfgEdgeRow> {
        self.cfg_edges_by_target
            .get(&block_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.cfg_edges[i as usize])
            .collect()
    }

    fn symbols_in_file(&self, file: &str) -> impl Iterator<Item = &SymbolRow> {
        self.symbols_by_file
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.symbols[i as usize])
    }

    pub(crate) fn symbols_of_type(&self, symbol_type: &str) -> impl Iterator<Item = &SymbolRow> {
        self.symbols_by_type
            .get(symbol_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.symbols[i as usize])
    }
}

impl TaintIndex for MemoryCache {
    fn find_sources(&self, patterns: &PatternMap) -> Result<Vec<SourceOccurrence>, StoreError> {
        self.refresh_patterns(patterns, &PatternMap::new());
        let guard = self
            .precompute
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut sources = Vec::new();
        for pattern_list in patterns.values() {
            for pattern in pattern_list {
                if let Some(hits) = guard.sources.get(pattern) {
                    sources.extend(hits.iter().cloned());
                }
            }
        }
        Ok(sources)
    }

    fn find_sinks(&self, patterns: &PatternMap) -> Result<Vec<SinkOccurrence>, StoreError> {
        self.refresh_patterns(&PatternMap::new(), patterns);
        let guard = self
            .precompute
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut sinks = Vec::new();
        for pattern_list in patterns.values() {
            for pattern in pattern_list {
                if let Some(hits) = guard.sinks.get(pattern) {
                    sinks.extend(hits.iter().cloned());
                }
            }
        }
        sinks.extend(guard.orm_sinks.iter().cloned());
        Ok(sinks)
    }

    fn containing_function(
        &self,
        file: &str,
        line: i64,
    ) -> Result<Option<FunctionRef>, StoreError> {
        let spans = self.function_spans_for(file);
        let found = spans
            .iter()
            .rev()
            .find(|span| span.start <= line)
            .map(|span| FunctionRef {
                file: file.to_string(),
                name: span.name.clone(),
                line: span.start,
            });
        Ok(found)
    }

    fn function_range(&self, file: &str, function_line: i64) -> Result<(i64, i64), StoreError> {
        let spans = self.function_spans_for(file);
        if let Some(span) = spans.iter().find(|s| s.start == function_line) {
            return Ok((span.start, span.end));
        }
        Ok((
            function_line,
            function_line + seep_core::constants::LAST_FUNCTION_SPAN,
        ))
    }

    fn call_symbols_between(
        &self,
        file: &str,
        after: i64,
        before: i64,
    ) -> Result<Vec<SymbolRow>, StoreError> {
        Ok(self
            .symbols_in_file(file)
            .filter(|s| s.symbol_type == "call" && s.line > after && s.line < before)
            .cloned()
            .collect())
    }

    fn assignments_in_range(
        &self,
        file: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<AssignmentRow>, StoreError> {
        Ok(self
            .assignments_by_file
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.assignments[i as usize])
            .filter(|a| a.line >= start && a.line <= end)
            .cloned()
            .collect())
    }

    fn assignments_in_function(
        &self,
        file: &str,
        function: &str,
    ) -> Result<Vec<AssignmentRow>, StoreError> {
        Ok(self
            .assignments_by_function
            .get(&(file.to_string(), function.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| self.assignments[i as usize].clone())
            .collect())
    }

    fn assignments_in_file(&self, file: &str) -> Result<Vec<AssignmentRow>, StoreError> {
        Ok(self
            .assignments_by_file
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| self.assignments[i as usize].clone())
            .collect())
    }

    fn has_assignments(&self) -> Result<bool, StoreError> {
        Ok(self.has_assignments_relation)
    }

    fn call_args_by_caller(
        &self,
        file: &str,
        caller: &str,
    ) -> Result<Vec<CallArgRow>, StoreError> {
        Ok(self
            .calls_by_caller
            .get(&(file.to_string(), caller.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| self.call_args[i as usize].clone())
            .collect())
    }

    fn call_args_at_line(&self, file: &str, line: i64) -> Result<Vec<CallArgRow>, StoreError> {
        Ok(self
            .calls_by_line
            .get(&(file.to_string(), line))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&i| self.call_args[i as usize].clone())
            .collect())
    }

    fn call_sites_of(&self, file: &str, callee: &str) -> Result<Vec<CallArgRow>, StoreError> {
        Ok(self
            .calls_by_callee
            .get(callee)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.call_args[i as usize])
            .filter(|c| c.file == file)
            .cloned()
            .collect())
    }

    fn returns_of(&self, file: &str, function: &str) -> Result<Vec<ReturnRow>, StoreError> {
        Ok(self
            .returns_by_function
            .get(&(file.to_string(), function.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| self.returns[i as usize].clone())
            .collect())
    }

    fn cfg_available(&self, file: &str) -> Result<bool, StoreError> {
        Ok(self
            .cfg_blocks_by_file
            .get(file)
            .is_some_and(|v| !v.is_empty()))
    }

    fn has_conditional_blocks_between(
        &self,
        file: &str,
        after: i64,
        before: i64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .cfg_blocks_by_file
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.cfg_blocks[i as usize])
            .any(|b| {
                (b.block_type == "condition" || b.block_type == "loop_condition")
                    && b.start_line > after
                    && b.end_line < before
            }))
    }

    fn cfg_function(&self, file: &str, function: &str) -> Result<CfgFunction, StoreError> {
        let key = (file.to_string(), function.to_string());
        Ok(CfgFunction {
            blocks: self
                .cfg_blocks_by_function
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .map(|&i| self.cfg_blocks[i as usize].clone())
                .collect(),
            edges: self
                .cfg_edges_by_function
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .map(|&i| self.cfg_edges[i as usize].clone())
                .collect(),
        })
    }

    fn block_statements(&self, block_id: i64) -> Result<Vec<CfgStatementRow>, StoreError> {
        Ok(self
            .cfg_statements_by_block
            .get(&block_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| self.cfg_statements[i as usize].clone())
            .collect())
    }

    fn variable_used_in_range(
        &self,
        file: &str,
        variable: &str,
        start: i64,
        end: i64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .usage_by_file
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.variable_usage[i as usize])
            .any(|u| u.variable_name == variable && u.line >= start && u.line <= end))
    }

    fn object_literal_callees(&self, variable: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .object_literals_by_variable
            .get(variable)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.object_literals[i as usize])
            .filter(|o| o.property_type == "function_ref" || o.property_type == "shorthand")
            .map(|o| o.property_value.clone())
            .collect())
    }

    fn network_indicators_near(
        &self,
        file: &str,
        line: i64,
        window: i64,
    ) -> Result<i64, StoreError> {
        const INDICATORS: &[&str] = &[
            "request",
            "download",
            "fetch",
            "scrape",
            "BeautifulSoup",
            "urlopen",
        ];
        Ok(self
            .symbols_in_file(file)
            .filter(|s| s.line >= line - window && s.line <= line + window)
            .filter(|s| INDICATORS.iter().any(|ind| s.name.contains(ind)))
            .count() as i64)
    }

    fn call_graph(&self) -> Result<FxHashMap<String, Vec<String>>, StoreError> {
        Ok(self.call_graph.clone())
    }
}
