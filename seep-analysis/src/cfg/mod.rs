//! Flow-sensitive verification over the control flow graph.
//!
//! When a candidate source→sink pair exists and CFG data is available for
//! the enclosing function, this module checks that at least one unsanitized
//! control-flow path connects them. Flow-sensitive results replace the
//! flow-insensitive emission for the same pair; a pair whose every path is
//! sanitized is dropped.

use petgraph::algo::all_simple_paths;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use seep_core::errors::{StoreError, TaintError};
use seep_core::types::collections::{FxHashMap, FxHashSet, SmallVec8};
use seep_storage::queries::cfg::CfgBlockRow;
use seep_storage::queries::symbols::FunctionRef;

use crate::index::TaintIndex;
use crate::registry::TaintRegistry;
use crate::types::{PathCondition, PathStep, SinkOccurrence, SourceOccurrence, TaintPath};

/// Taint state for one CFG block along one analyzed path.
#[derive(Debug, Clone, Default)]
pub struct BlockTaintState {
    pub block_id: i64,
    pub tainted_vars: FxHashSet<String>,
    pub sanitized_vars: FxHashSet<String>,
    pub conditions: Vec<PathCondition>,
}

impl BlockTaintState {
    pub fn new(block_id: i64) -> Self {
        Self {
            block_id,
            ..Self::default()
        }
    }

    /// Tainted and not subsequently sanitized.
    pub fn is_tainted(&self, var: &str) -> bool {
        self.tainted_vars.contains(var) && !self.sanitized_vars.contains(var)
    }

    /// Mark a variable tainted. Taint reintroduction clears sanitization.
    pub fn add_taint(&mut self, var: &str) {
        self.tainted_vars.insert(var.to_string());
        self.sanitized_vars.remove(var);
    }

    /// Mark a variable sanitized for all downstream uses along this path.
    pub fn sanitize(&mut self, var: &str) {
        self.sanitized_vars.insert(var.to_string());
    }

    /// Conservative join-point merge: tainted if tainted on any incoming
    /// path, sanitized only if sanitized on every incoming path.
    pub fn merge(&self, other: &BlockTaintState) -> BlockTaintState {
        let mut merged = BlockTaintState::new(self.block_id);
        merged.tainted_vars = self.tainted_vars.union(&other.tainted_vars).cloned().collect();
        merged.sanitized_vars = self
            .sanitized_vars
            .intersection(&other.sanitized_vars)
            .cloned()
            .collect();
        merged.conditions = self.conditions.clone();
        for cond in &other.conditions {
            if !merged.conditions.contains(cond) {
                merged.conditions.push(cond.clone());
            }
        }
        merged
    }
}

/// Result of simulating taint along one acyclic path.
#[derive(Debug, Clone)]
pub struct PathOutcome {
    pub blocks: Vec<i64>,
    pub conditions: Vec<PathCondition>,
    pub condition_summary: String,
    pub tainted_vars: Vec<String>,
    pub sanitized_vars: Vec<String>,
    pub vulnerable: bool,
    pub complexity: usize,
}

/// Per-function path analyzer over the CFG arena.
///
/// The assignments and call-args relations carry qualified function names
/// (`accountService.createAccount`) while the CFG relation carries method
/// stems (`createAccount`). The analyzer keeps both and normalizes only at
/// the CFG boundary.
pub struct PathAnalyzer<'a, I: TaintIndex> {
    index: &'a I,
    registry: &'a TaintRegistry,
    file: String,
    /// Qualified name, used against assignments and call-args.
    original_function: String,
    /// Normalized stem, used against the CFG relations.
    function: String,
    blocks: FxHashMap<i64, CfgBlockRow>,
    successors: FxHashMap<i64, SmallVec8<(i64, String)>>,
    predecessors: FxHashMap<i64, SmallVec8<(i64, String)>>,
    graph: DiGraphMap<i64, ()>,
}

impl<'a, I: TaintIndex> std::fmt::Debug for PathAnalyzer<'a, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathAnalyzer")
            .field("file", &self.file)
            .field("original_function", &self.original_function)
            .field("function", &self.function)
            .field("blocks", &self.blocks)
            .field("successors", &self.successors)
            .field("predecessors", &self.predecessors)
            .field("graph", &self.graph)
            .finish()
    }
}

/// Strip object/class qualifiers for CFG lookup: `a.b.c` → `c`.
pub fn normalize_function_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

impl<'a, I: TaintIndex> PathAnalyzer<'a, I> {
    /// Build the analyzer for one function. Fails loudly when the function
    /// has no blocks or an edge references a block that does not exist —
    /// both indicate an indexer bug, not an analyzable program.
    pub fn new(
        index: &'a I,
        registry: &'a TaintRegistry,
        file: &str,
        function_name: &str,
    ) -> Result<Self, TaintError> {
        let function = normalize_function_name(function_name).to_string();
        let cfg = index.cfg_function(file, &function)?;
        if cfg.blocks.is_empty() {
            return Err(TaintError::MissingCfg {
                file: file.to_string(),
                function: function_name.to_string(),
            });
        }

        let mut blocks = FxHashMap::default();
        let mut graph = DiGraphMap::new();
        for block in cfg.blocks {
            graph.add_node(block.id);
            blocks.insert(block.id, block);
        }

        let mut successors: FxHashMap<i64, SmallVec8<(i64, String)>> = FxHashMap::default();
        let mut predecessors: FxHashMap<i64, SmallVec8<(i64, String)>> = FxHashMap::default();
        for edge in cfg.edges {
            if !blocks.contains_key(&edge.source_block_id) || !blocks.contains_key(&edge.target_block_id)
            {
                return Err(TaintError::InconsistentCfg {
                    file: file.to_string(),
                    function: function_name.to_string(),
                    detail: format!(
                        "edge {} references missing block {} -> {}",
                        edge.id, edge.source_block_id, edge.target_block_id
                    ),
                });
            }
            graph.add_edge(edge.source_block_id, edge.target_block_id, ());
            successors
                .entry(edge.source_block_id)
                .or_default()
                .push((edge.target_block_id, edge.edge_type.clone()));
            predecessors
                .entry(edge.target_block_id)
                .or_default()
                .push((edge.source_block_id, edge.edge_type));
        }

        Ok(Self {
            index,
            registry,
            file: file.to_string(),
            original_function: function_name.to_string(),
            function,
            blocks,
            successors,
            predecessors,
            graph,
        })
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn original_function(&self) -> &str {
        &self.original_function
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn block(&self, id: i64) -> Option<&CfgBlockRow> {
        self.blocks.get(&id)
    }

    /// The block containing a line, preferring the tightest span.
    pub fn block_for_line(&self, line: i64) -> Option<i64> {
        self.blocks
            .values()
            .filter(|b| b.start_line <= line && line <= b.end_line)
            .min_by_key(|b| (b.end_line - b.start_line, b.id))
            .map(|b| b.id)
    }

    /// The function's entry block: the `entry`-typed block, else the
    /// minimum block id.
    pub fn entry_block(&self) -> Option<i64> {
        self.blocks
            .values()
            .filter(|b| b.block_type == "entry")
            .map(|b| b.id)
            .min()
            .or_else(|| self.blocks.keys().copied().min())
    }

    /// The function's exit blocks: all `exit`-typed blocks, else the
    /// maximum block id.
    pub fn exit_blocks(&self) -> Vec<i64> {
        let exits: Vec<i64> = self
            .blocks
            .values()
            .filter(|b| b.block_type == "exit")
            .map(|b| b.id)
            .collect();
        if exits.is_empty() {
            self.blocks.keys().copied().max().into_iter().collect()
        } else {
            exits
        }
    }

    /// Enumerate simple acyclic paths between two blocks, capped. Loops
    /// appear as back-edges, never as repeated path entries.
    pub fn enumerate_paths(&self, from: i64, to: i64, max_paths: usize) -> Vec<Vec<i64>> {
        if from == to {
            return vec![vec![from]];
        }
        all_simple_paths::<Vec<i64>, _, std::collections::hash_map::RandomState>(
            &self.graph,
            from,
            to,
            0,
            None,
        )
            .take(max_paths)
            .collect()
    }

    /// Analyze every enumerated path between the source and sink blocks.
    /// Returns one outcome per path; the caller decides what a fully
    /// sanitized set means.
    pub fn find_vulnerable_paths(
        &self,
        source_line: i64,
        sink_line: i64,
        initial_tainted_var: &str,
        max_paths: usize,
    ) -> Result<Vec<PathOutcome>, TaintError> {
        let (Some(source_block), Some(sink_block)) =
            (self.block_for_line(source_line), self.block_for_line(sink_line))
        else {
            return Ok(Vec::new());
        };

        let paths = self.enumerate_paths(source_block, sink_block, max_paths);
        if paths.len() == max_paths {
            debug!(
                function = self.function.as_str(),
                max_paths, "path enumeration cap reached"
            );
        }

        let mut join_states: FxHashMap<i64, Vec<BlockTaintState>> = FxHashMap::default();
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in &paths {
            outcomes.push(self.analyze_path(path, initial_tainted_var, sink_line, &mut join_states)?);
        }
        Ok(outcomes)
    }

    fn analyze_path(
        &self,
        path: &[i64],
        initial_tainted_var: &str,
        sink_line: i64,
        join_states: &mut FxHashMap<i64, Vec<BlockTaintState>>,
    ) -> Result<PathOutcome, TaintError> {
        let Some(&first) = path.first() else {
            return Ok(PathOutcome {
                blocks: Vec::new(),
                conditions: Vec::new(),
                condition_summary: String::new(),
                tainted_vars: Vec::new(),
                sanitized_vars: Vec::new(),
                vulnerable: false,
                complexity: 0,
            });
        };

        let mut state = BlockTaintState::new(first);
        state.add_taint(initial_tainted_var);
        let mut conditions: Vec<PathCondition> = Vec::new();

        for (i, &block_id) in path.iter().enumerate() {
            let Some(block) = self.blocks.get(&block_id) else {
                continue;
            };

            // Merge states stored by other analyzed paths at this join point.
            if self.predecessors.get(&block_id).map(|p| p.len()).unwrap_or(0) > 1 {
                if let Some(incoming) = join_states.get(&block_id) {
                    for other in incoming {
                        state = state.merge(other);
                    }
                }
            }

            if let Some(condition) = self.record_condition(block, path.get(i + 1).copied()) {
                conditions.push(condition);
            }

            self.process_sanitizers(&mut state, block)?;
            self.process_assignments(&mut state, block)?;

            // Stash this state for successors that are join points.
            if let Some(successors) = self.successors.get(&block_id) {
                for (succ, _) in successors {
                    if self.predecessors.get(succ).map(|p| p.len()).unwrap_or(0) > 1 {
                        join_states.entry(*succ).or_default().push(state.clone());
                    }
                }
            }
        }

        // Vulnerable when any currently tainted variable appears in the
        // arguments of the call at the sink line — propagated variables
        // count, not just the initial one.
        let sink_calls = self.index.call_args_at_line(&self.file, sink_line)?;
        let vulnerable = sink_calls.iter().any(|call| {
            state
                .tainted_vars
                .iter()
                .any(|var| state.is_tainted(var) && call.argument_expr.contains(var.as_str()))
        });

        let mut tainted: Vec<String> = state.tainted_vars.iter().cloned().collect();
        tainted.sort();
        let mut sanitized: Vec<String> = state.sanitized_vars.iter().cloned().collect();
        sanitized.sort();

        Ok(PathOutcome {
            blocks: path.to_vec(),
            condition_summary: summarize_conditions(&conditions),
            complexity: conditions.len(),
            conditions,
            tainted_vars: tainted,
            sanitized_vars: sanitized,
            vulnerable,
        })
    }

    /// Record the edge-type-labeled condition a path takes out of a
    /// condition or loop-condition block.
    fn record_condition(&self, block: &CfgBlockRow, next: Option<i64>) -> Option<PathCondition> {
        let condition = block.condition_expr.as_deref().filter(|c| !c.is_empty())?;
        let next = next?;
        let edge_type = self
            .successors
            .get(&block.id)?
            .iter()
            .find(|(target, _)| *target == next)
            .map(|(_, edge_type)| edge_type.as_str())?;

        let (text, branch) = match (block.block_type.as_str(), edge_type) {
            ("condition", "true") => (format!("if ({condition})"), "true"),
            ("condition", "false") => (format!("if not ({condition})"), "false"),
            ("condition", other) => (format!("when ({condition})"), other),
            ("loop_condition", "true") | ("loop_condition", "enter_loop") => {
                (format!("while ({condition})"), "loop_enter")
            }
            ("loop_condition", _) => (format!("exit loop ({condition})"), "loop_exit"),
            _ => return None,
        };
        Some(PathCondition {
            block: block.id,
            condition: text,
            branch: branch.to_string(),
            line: block.start_line,
        })
    }

    /// Sanitizers run before assignments in every block: a call to a known
    /// sanitizer whose arguments mention a tainted variable clears that
    /// variable for the rest of the path.
    fn process_sanitizers(
        &self,
        state: &mut BlockTaintState,
        block: &CfgBlockRow,
    ) -> Result<(), StoreError> {
        for stmt in self.index.block_statements(block.id)? {
            if stmt.statement_type != "call" {
                continue;
            }
            for call in self.index.call_args_at_line(&self.file, stmt.line)? {
                if !self.registry.is_sanitizer(&call.callee_function) {
                    continue;
                }
                let tainted: Vec<String> = state.tainted_vars.iter().cloned().collect();
                for var in tainted {
                    if call.argument_expr.contains(var.as_str()) {
                        state.sanitize(&var);
                        debug!(
                            sanitizer = call.callee_function.as_str(),
                            var = var.as_str(),
                            line = stmt.line,
                            "sanitizer clears taint"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Assignments inside the block's line range, filtered to this function
    /// by its qualified name so nested functions in overlapping ranges do
    /// not pollute the state.
    fn process_assignments(
        &self,
        state: &mut BlockTaintState,
        block: &CfgBlockRow,
    ) -> Result<(), StoreError> {
        let assignments =
            self.index
                .assignments_in_range(&self.file, block.start_line, block.end_line)?;
        for assignment in assignments {
            if assignment.in_function != self.original_function {
                continue;
            }
            let feeds_taint = state
                .tainted_vars
                .iter()
                .any(|var| state.is_tainted(var) && assignment.source_expr.contains(var.as_str()));
            if feeds_taint && !state.sanitized_vars.contains(&assignment.target_var) {
                state.add_taint(&assignment.target_var);
            }
        }
        Ok(())
    }

    /// Blocks reachable inside a loop body, following loop-entry edges
    /// until the back edge returns to the header.
    pub fn loop_body_blocks(&self, loop_block_id: i64) -> Vec<i64> {
        let mut body = Vec::new();
        let mut visited = FxHashSet::default();
        let mut queue = vec![loop_block_id];
        while let Some(block_id) = queue.pop() {
            if !visited.insert(block_id) {
                continue;
            }
            for (succ, edge_type) in self
                .successors
                .get(&block_id)
                .map(|s| s.as_slice())
                .unwrap_or(&[])
            {
                if *succ == loop_block_id {
                    continue;
                }
                if edge_type == "true" || edge_type == "enter_loop" || edge_type == "continue_loop" {
                    body.push(*succ);
                    queue.push(*succ);
                }
            }
        }
        body
    }

    /// Conservative widening for loops that would otherwise need more
    /// fixed-point iterations: when any variable is tainted on entry, every
    /// variable assigned anywhere in the loop body becomes tainted.
    pub fn apply_widening(
        &self,
        state: &BlockTaintState,
        loop_blocks: &[i64],
    ) -> Result<BlockTaintState, StoreError> {
        let mut widened = state.clone();
        if state.tainted_vars.is_empty() {
            return Ok(widened);
        }
        for block_id in loop_blocks {
            let Some(block) = self.blocks.get(block_id) else {
                continue;
            };
            for assignment in
                self.index
                    .assignments_in_range(&self.file, block.start_line, block.end_line)?
            {
                widened.add_taint(&assignment.target_var);
            }
        }
        Ok(widened)
    }
}

fn summarize_conditions(conditions: &[PathCondition]) -> String {
    if conditions.is_empty() {
        return "Direct path (no conditions)".to_string();
    }
    conditions
        .iter()
        .map(|c| match c.branch.as_str() {
            "true" => format!("{} is TRUE", c.condition),
            "false" => format!("{} is FALSE", c.condition),
            "loop_enter" => format!("Enter loop: {}", c.condition),
            "loop_exit" => format!("Exit loop: {}", c.condition),
            _ => c.condition.clone(),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Heuristic for when flow-sensitive analysis is worth running: CFG data
/// exists and a conditional sits between the source and sink lines.
pub fn should_use_cfg<I: TaintIndex>(
    index: &I,
    source: &SourceOccurrence,
    sink: &SinkOccurrence,
) -> Result<bool, StoreError> {
    if source.file != sink.file {
        return Ok(false);
    }
    if !index.cfg_available(&source.file)? {
        return Ok(false);
    }
    // CFG pays off when a branch sits between source and sink.
    index.has_conditional_blocks_between(&source.file, source.line, sink.line)
}

/// Verify that at least one unsanitized CFG path connects source to sink.
///
/// Returns `None` when CFG reasoning is unavailable for this pair (caller
/// keeps the flow-insensitive result), `Some(paths)` when it ran — an empty
/// list means every path was sanitized and the pair must be dropped.
pub fn verify_unsanitized_paths<I: TaintIndex>(
    index: &I,
    registry: &TaintRegistry,
    source: &SourceOccurrence,
    sink: &SinkOccurrence,
    source_function: &FunctionRef,
    max_paths: usize,
) -> Result<Option<Vec<TaintPath>>, TaintError> {
    if source.file != sink.file {
        return Ok(None);
    }
    if !index.cfg_available(&source.file)? {
        return Ok(None);
    }
    // The sink must live in the source's function for intra-procedural
    // path reasoning.
    let sink_function = index.containing_function(&sink.file, sink.line)?;
    if sink_function.map(|f| f.name) != Some(source_function.name.clone()) {
        return Ok(None);
    }

    let analyzer = match PathAnalyzer::new(index, registry, &source.file, &source_function.name) {
        Ok(analyzer) => analyzer,
        Err(TaintError::MissingCfg { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };

    let tainted_var = initial_tainted_var(index, source)?;
    let outcomes =
        analyzer.find_vulnerable_paths(source.line, sink.line, &tainted_var, max_paths)?;
    if outcomes.is_empty() {
        return Ok(None);
    }

    let mut paths = Vec::new();
    for outcome in outcomes.iter().filter(|o| o.vulnerable) {
        let mut steps = vec![PathStep::Source {
            location: format!("{}:{}", source.file, source.line),
            var: tainted_var.clone(),
            pattern: source.pattern.clone(),
        }];
        if !outcome.conditions.is_empty() {
            steps.push(PathStep::Conditions {
                conditions: outcome.conditions.clone(),
                summary: outcome.condition_summary.clone(),
            });
        }
        steps.push(PathStep::Sink {
            location: format!("{}:{}", sink.file, sink.line),
            pattern: sink.pattern.clone(),
        });

        let mut path = TaintPath::new(source.clone(), sink.clone(), steps);
        path.flow_sensitive = true;
        path.conditions = outcome.conditions.clone();
        path.tainted_vars_at_sink = outcome.tainted_vars.clone();
        path.sanitized_vars_at_sink = outcome.sanitized_vars.clone();
        paths.push(path);
    }
    Ok(Some(paths))
}

/// The variable initially tainted by a source: dotted accessors taint the
/// full pattern expression; otherwise the variable assigned from the
/// pattern at the source line.
fn initial_tainted_var<I: TaintIndex>(
    index: &I,
    source: &SourceOccurrence,
) -> Result<String, StoreError> {
    if source.pattern.contains('.') {
        return Ok(source.pattern.clone());
    }
    let assignments = index.assignments_in_range(&source.file, source.line, source.line)?;
    for assignment in assignments {
        if assignment.source_expr.contains(source.pattern.as_str()) {
            return Ok(assignment.target_var);
        }
    }
    Ok(source.pattern.clone())
}
