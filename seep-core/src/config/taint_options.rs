//! Taint analysis options.

use serde::{Deserialize, Serialize};

/// Tunable knobs for one taint analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaintOptions {
    /// Inter-procedural hop ceiling for the cross-function tracer.
    pub max_depth: u32,
    /// Enable flow-sensitive CFG verification.
    pub use_cfg: bool,
    /// Enable the eager in-memory index cache.
    pub use_memory_cache: bool,
    /// Explicit cache memory ceiling in MB; auto-detected when `None`.
    pub memory_limit_mb: Option<u64>,
    /// Escalate fidelity reconciliation failures to errors.
    pub strict_fidelity: bool,
    /// CFG path enumeration cap per (source, sink) pair.
    pub max_paths_per_pair: usize,
}

impl Default for TaintOptions {
    fn default() -> Self {
        Self {
            max_depth: 5,
            use_cfg: true,
            use_memory_cache: true,
            memory_limit_mb: None,
            strict_fidelity: true,
            max_paths_per_pair: 100,
        }
    }
}
