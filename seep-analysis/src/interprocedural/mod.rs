//! Inter-procedural taint analysis.
//!
//! Two cooperating pieces:
//!
//! - [`InterProceduralAnalyzer`] summarizes a callee's effect on its
//!   parameters and return value by replaying taint over all entry→exit CFG
//!   paths, memoized per canonical call signature.
//! - [`trace_cross_function`] is the worklist tracer that follows a tainted
//!   variable through argument passes and return flows until it reaches a
//!   sink in another function.

use std::collections::BTreeMap;

use moka::sync::Cache;
use regex::Regex;
use tracing::debug;

use seep_core::constants::MAX_INTERPROCEDURAL_DEPTH;
use seep_core::errors::{StoreError, TaintError};
use seep_core::types::collections::{FxHashMap, FxHashSet};

use crate::cfg::{BlockTaintState, PathAnalyzer};
use crate::index::TaintIndex;
use crate::registry::TaintRegistry;
use crate::types::{PathStep, SinkOccurrence, SourceOccurrence, TaintPath};

/// Conservative status of one parameter across all exit states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEffect {
    Tainted,
    Sanitized,
    Unmodified,
}

/// Summary of how a callee transforms taint. Computed once per canonical
/// call signature, then memoized.
#[derive(Debug, Clone, Default)]
pub struct InterProceduralEffect {
    /// Does any exit state taint the synthetic `__return__` variable?
    pub return_tainted: bool,
    /// Conservative per-parameter status across all exit states.
    pub param_effects: BTreeMap<String, ParamEffect>,
    /// Does this parameter reach a return on at least one unsanitized path?
    pub passthrough_taint: BTreeMap<String, bool>,
    /// Advisory tags such as `writes_to_db`, `sends_response`.
    pub side_effects: Vec<String>,
}

impl Default for ParamEffect {
    fn default() -> Self {
        Self::Unmodified
    }
}

impl InterProceduralEffect {
    /// Merge two effects for dynamic dispatch: taint wins, sanitization
    /// requires agreement, side effects union.
    pub fn merge_conservative(&self, other: &InterProceduralEffect) -> InterProceduralEffect {
        let mut merged = InterProceduralEffect {
            return_tainted: self.return_tainted || other.return_tainted,
            ..InterProceduralEffect::default()
        };

        let params: FxHashSet<&String> = self
            .param_effects
            .keys()
            .chain(other.param_effects.keys())
            .collect();
        for param in params {
            let a = self.param_effects.get(param).copied().unwrap_or_default();
            let b = other.param_effects.get(param).copied().unwrap_or_default();
            let effect = if a == ParamEffect::Tainted || b == ParamEffect::Tainted {
                ParamEffect::Tainted
            } else if a == ParamEffect::Sanitized && b == ParamEffect::Sanitized {
                ParamEffect::Sanitized
            } else {
                ParamEffect::Unmodified
            };
            merged.param_effects.insert(param.clone(), effect);
        }

        for param in self.passthrough_taint.keys().chain(other.passthrough_taint.keys()) {
            let reaches = self.passthrough_taint.get(param).copied().unwrap_or(false)
                || other.passthrough_taint.get(param).copied().unwrap_or(false);
            merged.passthrough_taint.insert(param.clone(), reaches);
        }

        merged.side_effects = self.side_effects.clone();
        for effect in &other.side_effects {
            if !merged.side_effects.contains(effect) {
                merged.side_effects.push(effect.clone());
            }
        }
        merged
    }

    /// The effect assumed when dispatch cannot be resolved at all: return
    /// tainted, every mapped parameter tainted.
    pub fn maximally_conservative<'p>(params: impl Iterator<Item = &'p String>) -> Self {
        Self {
            return_tainted: true,
            param_effects: params
                .map(|p| (p.clone(), ParamEffect::Tainted))
                .collect(),
            passthrough_taint: BTreeMap::new(),
            side_effects: Vec::new(),
        }
    }
}

/// Caller-side context for resolving a dynamic dispatch expression.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub file: String,
    pub function: String,
}

/// Summarizes callee effects with memoization and a hard recursion cap.
pub struct InterProceduralAnalyzer<'a, I: TaintIndex> {
    index: &'a I,
    registry: &'a TaintRegistry,
    effects: Cache<String, InterProceduralEffect>,
    depth: usize,
    max_paths: usize,
}

impl<'a, I: TaintIndex> InterProceduralAnalyzer<'a, I> {
    pub fn new(index: &'a I, registry: &'a TaintRegistry, max_paths: usize) -> Self {
        Self {
            index,
            registry,
            effects: Cache::new(10_000),
            depth: 0,
            max_paths,
        }
    }

    /// Analyze one call with full CFG context: how does the callee modify
    /// its parameters and return value given the caller's taint state?
    ///
    /// `args_mapping` maps caller variables to callee parameter names;
    /// `taint_state` records which caller variables are tainted.
    pub fn analyze_function_call(
        &mut self,
        _caller_file: &str,
        _caller_func: &str,
        callee_file: &str,
        callee_func: &str,
        args_mapping: &BTreeMap<String, String>,
        taint_state: &BTreeMap<String, bool>,
    ) -> Result<InterProceduralEffect, TaintError> {
        let key = cache_key(callee_file, callee_func, args_mapping, taint_state);
        if let Some(effect) = self.effects.get(&key) {
            debug!(callee = callee_func, "effect cache hit");
            return Ok(effect);
        }

        // Recursion guard: past the ceiling, assume no effect rather than
        // diverge on cyclic call graphs.
        if self.depth > MAX_INTERPROCEDURAL_DEPTH {
            return Ok(InterProceduralEffect::default());
        }

        self.depth += 1;
        let result = self.analyze_call_inner(callee_file, callee_func, args_mapping, taint_state);
        self.depth -= 1;

        let effect = result?;
        self.effects.insert(key, effect.clone());
        Ok(effect)
    }

    fn analyze_call_inner(
        &mut self,
        callee_file: &str,
        callee_func: &str,
        args_mapping: &BTreeMap<String, String>,
        taint_state: &BTreeMap<String, bool>,
    ) -> Result<InterProceduralEffect, TaintError> {
        // No CFG for an indexable callee is an indexer bug. Failing loudly
        // here beats silently reporting "unmodified" and extinguishing
        // taint tracking.
        let analyzer = PathAnalyzer::new(self.index, self.registry, callee_file, callee_func)?;

        let mut entry_state = BlockTaintState::new(analyzer.entry_block().unwrap_or(0));
        for (caller_var, callee_param) in args_mapping {
            if taint_state.get(caller_var).copied().unwrap_or(false) {
                entry_state.add_taint(callee_param);
            }
        }

        let exit_states = self.collect_exit_states(&analyzer, &entry_state)?;
        let mut effect = extract_effects(&exit_states, args_mapping);
        effect.passthrough_taint = self.analyze_passthrough(&analyzer, &entry_state)?;
        effect.side_effects = self.collect_side_effects(callee_file, callee_func)?;
        Ok(effect)
    }

    /// Replay taint over every entry→exit path of the callee and collect
    /// the exit states.
    fn collect_exit_states(
        &self,
        analyzer: &PathAnalyzer<'a, I>,
        entry_state: &BlockTaintState,
    ) -> Result<Vec<BlockTaintState>, TaintError> {
        let Some(entry) = analyzer.entry_block() else {
            return Ok(Vec::new());
        };

        let mut exit_states = Vec::new();
        for exit in analyzer.exit_blocks() {
            let paths = analyzer.enumerate_paths(entry, exit, self.max_paths);
            if paths.is_empty() {
                debug!(exit, "exit block unreachable from entry");
                continue;
            }
            for path in paths {
                exit_states.push(self.replay_path(analyzer, entry_state, &path)?);
            }
        }
        Ok(exit_states)
    }

    /// Replay one path: per block, sanitization always precedes
    /// propagation at each assignment line.
    fn replay_path(
        &self,
        analyzer: &PathAnalyzer<'a, I>,
        entry_state: &BlockTaintState,
        path: &[i64],
    ) -> Result<BlockTaintState, TaintError> {
        let file = analyzer.file();
        let function = analyzer.original_function();
        let mut tainted: FxHashSet<String> = entry_state.tainted_vars.clone();
        let mut sanitized: FxHashSet<String> = FxHashSet::default();

        let mut min_line = i64::MAX;
        let mut max_line = i64::MIN;

        for &block_id in path {
            let Some(block) = analyzer.block(block_id) else {
                continue;
            };
            min_line = min_line.min(block.start_line);
            max_line = max_line.max(block.end_line);

            let assignments =
                self.index
                    .assignments_in_range(file, block.start_line, block.end_line)?;
            let calls = self.calls_by_line_in_range(file, function, block.start_line, block.end_line)?;

            for assignment in assignments {
                if assignment.in_function != function {
                    continue;
                }
                let mut is_sanitizing = false;

                if let Some(line_calls) = calls.get(&assignment.line) {
                    'calls: for (callee, arg_expr) in line_calls {
                        if !self.registry.is_sanitizer(callee) {
                            continue;
                        }
                        for tainted_var in tainted.clone() {
                            if arg_expr.contains(tainted_var.as_str()) {
                                is_sanitizing = true;
                                sanitized.insert(assignment.target_var.clone());
                                // x = sanitize(x) clears x itself.
                                tainted.remove(&assignment.target_var);
                                break 'calls;
                            }
                        }
                    }
                }
                if is_sanitizing {
                    continue;
                }

                let feeds = tainted
                    .iter()
                    .any(|var| assignment.source_expr.contains(var.as_str()));
                if feeds && !sanitized.contains(&assignment.target_var) {
                    tainted.insert(assignment.target_var.clone());
                }
            }
        }

        // A return inside this path that mentions a tainted variable taints
        // the synthetic __return__ token.
        if min_line <= max_line {
            for ret in self.index.returns_of(file, function)? {
                if ret.line < min_line || ret.line > max_line {
                    continue;
                }
                let mentions = tainted.iter().any(|var| {
                    ret.return_expr.contains(var.as_str())
                        || ret.return_vars.iter().any(|rv| rv == var)
                });
                if mentions {
                    tainted.insert("__return__".to_string());
                    break;
                }
            }
        }

        let mut state = BlockTaintState::new(*path.last().unwrap_or(&0));
        state.tainted_vars = tainted;
        state.sanitized_vars = sanitized;
        Ok(state)
    }

    fn calls_by_line_in_range(
        &self,
        file: &str,
        function: &str,
        start: i64,
        end: i64,
    ) -> Result<FxHashMap<i64, Vec<(String, String)>>, StoreError> {
        let mut by_line: FxHashMap<i64, Vec<(String, String)>> = FxHashMap::default();
        for call in self.index.call_args_by_caller(file, function)? {
            if call.line >= start && call.line <= end {
                by_line
                    .entry(call.line)
                    .or_default()
                    .push((call.callee_function, call.argument_expr));
            }
        }
        Ok(by_line)
    }

    /// For each initially tainted parameter, check whether it reaches a
    /// return on at least one path that does not sanitize it.
    fn analyze_passthrough(
        &self,
        analyzer: &PathAnalyzer<'a, I>,
        entry_state: &BlockTaintState,
    ) -> Result<BTreeMap<String, bool>, TaintError> {
        let mut passthrough = BTreeMap::new();
        let Some(entry) = analyzer.entry_block() else {
            return Ok(passthrough);
        };
        let file = analyzer.file();

        for param in &entry_state.tainted_vars {
            let mut reaches = false;
            for exit in analyzer.exit_blocks() {
                let Some(block) = analyzer.block(exit) else {
                    continue;
                };
                if !self
                    .index
                    .variable_used_in_range(file, param, block.start_line, block.end_line)?
                {
                    continue;
                }
                let paths = analyzer.enumerate_paths(entry, exit, self.max_paths);
                let unsanitized_path_exists = paths.iter().any(|path| {
                    !self
                        .is_sanitized_along_path(analyzer, param, path)
                        .unwrap_or(true)
                });
                if unsanitized_path_exists {
                    reaches = true;
                    break;
                }
            }
            passthrough.insert(param.clone(), reaches);
        }
        Ok(passthrough)
    }

    fn is_sanitized_along_path(
        &self,
        analyzer: &PathAnalyzer<'a, I>,
        var: &str,
        path: &[i64],
    ) -> Result<bool, StoreError> {
        let mut min_line = i64::MAX;
        let mut max_line = i64::MIN;
        for &block_id in path {
            if let Some(block) = analyzer.block(block_id) {
                min_line = min_line.min(block.start_line);
                max_line = max_line.max(block.end_line);
            }
        }
        if min_line > max_line {
            return Ok(false);
        }
        let file = analyzer.file();
        for call in self
            .index
            .call_args_by_caller(file, analyzer.original_function())?
        {
            if call.line >= min_line
                && call.line <= max_line
                && call.argument_expr.contains(var)
                && self.registry.is_sanitizer(&call.callee_function)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Advisory side-effect tags. Not exercised by correctness checks.
    fn collect_side_effects(
        &self,
        file: &str,
        function: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut tags = Vec::new();
        for call in self.index.call_args_by_caller(file, function)? {
            let callee = call.callee_function.as_str();
            if (callee.starts_with("res.") || callee.starts_with("response."))
                && !tags.iter().any(|t| t == "sends_response")
            {
                tags.push("sends_response".to_string());
            }
            if (callee.contains("query") || callee.contains("execute"))
                && !tags.iter().any(|t| t == "writes_to_db")
            {
                tags.push("writes_to_db".to_string());
            }
        }
        Ok(tags)
    }

    /// Resolve a dynamic call expression to candidate callees and merge
    /// their effects conservatively. Unresolvable dispatch yields the
    /// maximally conservative effect.
    pub fn handle_dynamic_dispatch(
        &mut self,
        call_expr: &str,
        context: &DispatchContext,
        args_mapping: &BTreeMap<String, String>,
        taint_state: &BTreeMap<String, bool>,
    ) -> Result<InterProceduralEffect, TaintError> {
        let candidates = self.resolve_dynamic_callees(call_expr, context)?;
        if candidates.is_empty() {
            debug!(expr = call_expr, "unresolvable dynamic dispatch, assuming worst case");
            return Ok(InterProceduralEffect::maximally_conservative(
                args_mapping.values(),
            ));
        }

        let mut merged: Option<InterProceduralEffect> = None;
        for callee in candidates {
            let effect = self.analyze_function_call(
                &context.file,
                &context.function,
                &context.file,
                &callee,
                args_mapping,
                taint_state,
            )?;
            merged = Some(match merged {
                Some(acc) => acc.merge_conservative(&effect),
                None => effect,
            });
        }
        Ok(merged.unwrap_or_default())
    }

    /// Candidate callees of a dynamic call: the object_literals relation
    /// first, then the legacy regex over the indexer-extracted literal
    /// expression, then ternary branches.
    fn resolve_dynamic_callees(
        &self,
        call_expr: &str,
        context: &DispatchContext,
    ) -> Result<Vec<String>, TaintError> {
        let mut candidates: Vec<String> = Vec::new();

        if let Some(bracket) = call_expr.find('[') {
            if call_expr.contains(']') {
                let base = call_expr[..bracket].trim();
                candidates = self.index.object_literal_callees(base)?;

                if candidates.is_empty() {
                    // Legacy fallback, kept for index compatibility: the
                    // expression here was extracted by the indexer, this is
                    // not source-text parsing.
                    let assignments = self
                        .index
                        .assignments_in_function(&context.file, &context.function)?;
                    let func_ref = Regex::new(r":\s*(\w+)").map_err(|e| {
                        TaintError::Store(StoreError::Query {
                            message: e.to_string(),
                        })
                    })?;
                    for assignment in assignments {
                        if assignment.target_var == base && assignment.source_expr.contains('{') {
                            for capture in func_ref.captures_iter(&assignment.source_expr) {
                                if let Some(name) = capture.get(1) {
                                    candidates.push(name.as_str().to_string());
                                }
                            }
                        }
                    }
                }
            }
        }

        // Ternary handler selection: cond ? funcA : funcB.
        if let Some(question) = call_expr.find('?') {
            let branches = &call_expr[question + 1..];
            if let Some((left, right)) = branches.split_once(':') {
                candidates.push(left.trim().to_string());
                candidates.push(right.trim().to_string());
            }
        }

        candidates.sort();
        candidates.dedup();
        Ok(candidates)
    }
}

fn cache_key(
    callee_file: &str,
    callee_func: &str,
    args_mapping: &BTreeMap<String, String>,
    taint_state: &BTreeMap<String, bool>,
) -> String {
    // BTreeMaps serialize in key order, so the key is canonical.
    serde_json::to_string(&(callee_file, callee_func, args_mapping, taint_state))
        .unwrap_or_else(|_| format!("{callee_file}:{callee_func}"))
}

fn extract_effects(
    exit_states: &[BlockTaintState],
    args_mapping: &BTreeMap<String, String>,
) -> InterProceduralEffect {
    let mut effect = InterProceduralEffect {
        return_tainted: exit_states
            .iter()
            .any(|s| s.tainted_vars.contains("__return__")),
        ..InterProceduralEffect::default()
    };

    for callee_param in args_mapping.values() {
        let tainted_any = exit_states
            .iter()
            .any(|s| s.tainted_vars.contains(callee_param));
        // Sanitized only when sanitized in every exit state; no exit
        // states means not sanitized.
        let sanitized_all = !exit_states.is_empty()
            && exit_states
                .iter()
                .all(|s| s.sanitized_vars.contains(callee_param));

        let status = if tainted_any {
            ParamEffect::Tainted
        } else if sanitized_all {
            ParamEffect::Sanitized
        } else {
            ParamEffect::Unmodified
        };
        effect.param_effects.insert(callee_param.clone(), status);
    }
    effect
}

/// Cross-function worklist tracer.
///
/// Follows one tainted variable through argument passes and return flows
/// until it reaches the given sink, emitting step-level trace nodes. When
/// CFG data is available, callee effect summaries prune propagation through
/// sanitizing callees.
#[allow(clippy::too_many_arguments)]
pub fn trace_cross_function<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    source: &SourceOccurrence,
    source_var: &str,
    source_function: &str,
    sink: &SinkOccurrence,
    max_depth: u32,
    use_effect_summaries: bool,
    max_paths: usize,
) -> Result<Vec<TaintPath>, TaintError> {
    let mut paths = Vec::new();
    let file = &source.file;
    if sink.file != *file {
        return Ok(paths);
    }

    let mut effects = InterProceduralAnalyzer::new(index, registry, max_paths);
    let consult_effects = use_effect_summaries && index.cfg_available(file)?;

    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut worklist: Vec<(String, String, u32, Vec<PathStep>)> =
        vec![(source_var.to_string(), source_function.to_string(), 0, Vec::new())];

    while let Some((var, function, depth, steps)) = worklist.pop() {
        if depth > max_depth {
            continue;
        }
        let state_key = format!("{file}:{function}:{var}:{depth}");
        if !visited.insert(state_key) {
            continue;
        }

        let sink_function = index
            .containing_function(&sink.file, sink.line)?
            .map(|f| f.name);

        // Tainted variable passed as an argument.
        for call in index.call_args_by_caller(file, &function)? {
            if call.callee_function.is_empty() || call.param_name.is_empty() {
                continue;
            }
            if !call.argument_expr.contains(var.as_str()) {
                continue;
            }

            if consult_effects {
                let mut args_mapping = BTreeMap::new();
                args_mapping.insert(var.clone(), call.param_name.clone());
                let mut taint_state = BTreeMap::new();
                taint_state.insert(var.clone(), true);
                let effect = effects.analyze_function_call(
                    file,
                    &function,
                    file,
                    &call.callee_function,
                    &args_mapping,
                    &taint_state,
                )?;
                if effect.param_effects.get(&call.param_name) == Some(&ParamEffect::Sanitized) {
                    debug!(
                        callee = call.callee_function.as_str(),
                        param = call.param_name.as_str(),
                        "callee sanitizes parameter on every path, pruning"
                    );
                    continue;
                }
            }

            let mut next_steps = steps.clone();
            next_steps.push(PathStep::ArgumentPass {
                from_function: function.clone(),
                to_function: call.callee_function.clone(),
                var: var.clone(),
                param: call.param_name.clone(),
                line: call.line,
            });

            // Sink inside the callee, fed by this parameter?
            if sink_function.as_deref() == Some(call.callee_function.as_str()) {
                let reaches = index
                    .call_args_at_line(&sink.file, sink.line)?
                    .iter()
                    .any(|c| c.argument_expr.contains(call.param_name.as_str()));
                if reaches {
                    let mut full = next_steps.clone();
                    full.push(PathStep::Sink {
                        location: format!("{}:{}", sink.file, sink.line),
                        pattern: sink.pattern.clone(),
                    });
                    paths.push(TaintPath::new(source.clone(), sink.clone(), full));
                }
            }

            worklist.push((
                call.param_name.clone(),
                call.callee_function.clone(),
                depth + 1,
                next_steps,
            ));
        }

        // Tainted variable returned to callers.
        let returns = index.returns_of(file, &function)?;
        let returns_var = returns.iter().any(|ret| {
            ret.return_expr.contains(var.as_str()) || ret.return_vars.iter().any(|rv| rv == &var)
        });
        if returns_var {
            for site in index.call_sites_of(file, &function)? {
                let Some(target_var) = site.target_var.clone().filter(|t| !t.is_empty()) else {
                    continue;
                };
                let mut next_steps = steps.clone();
                next_steps.push(PathStep::ReturnFlow {
                    from_function: function.clone(),
                    to_function: site.caller_function.clone(),
                    return_var: var.clone(),
                    target_var: target_var.clone(),
                    line: site.line,
                });
                worklist.push((target_var, site.caller_function.clone(), depth + 1, next_steps));
            }
        }

        // Tainted variable feeding the sink in the current function.
        if sink_function.as_deref() == Some(function.as_str()) {
            let reaches = index
                .call_args_at_line(&sink.file, sink.line)?
                .iter()
                .any(|c| c.argument_expr.contains(var.as_str()));
            if reaches {
                let mut full = steps.clone();
                full.push(PathStep::Sink {
                    location: format!("{}:{}", sink.file, sink.line),
                    pattern: sink.pattern.clone(),
                });
                paths.push(TaintPath::new(source.clone(), sink.clone(), full));
            }
        }
    }

    Ok(paths)
}
