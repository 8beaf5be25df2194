//! Engine-wide constants.

/// Worklist iteration cap for flow-insensitive propagation.
/// Guarantees termination on pathological inputs.
pub const MAX_WORKLIST_ITERATIONS: usize = 100;

/// Recursion ceiling for the inter-procedural effect analyzer.
pub const MAX_INTERPROCEDURAL_DEPTH: usize = 10;

/// Inter-procedural hop limit used when propagation delegates a single
/// tainted variable to the cross-function tracer.
pub const CROSS_FUNCTION_TRACE_DEPTH: u32 = 3;

/// Line window around a file-I/O source in which a network or scraping
/// indicator marks the source as external.
pub const EXTERNAL_SOURCE_WINDOW: i64 = 50;

/// Line window around a sink in which an assignment mentioning a tainted
/// variable counts as reaching the sink.
pub const SINK_ASSIGNMENT_WINDOW: i64 = 5;

/// Conservative function span used when the index carries no `end_line`
/// and the function is the last symbol in its file.
pub const LAST_FUNCTION_SPAN: i64 = 200;
