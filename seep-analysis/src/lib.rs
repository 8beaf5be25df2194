//! # seep-analysis
//!
//! The Seep taint engine. Consumes a read-only indexed program representation
//! and produces structured source→sink vulnerability paths:
//!
//! 1. [`registry`] — immutable source/sink/sanitizer pattern sets.
//! 2. [`cache`] — eager in-memory index with precomputed pattern hits and
//!    call graph; [`index::DirectIndex`] is the degraded per-query mode.
//! 3. [`discovery`] — concrete source and sink occurrences.
//! 4. [`propagation`] — flow-insensitive worklist over assignments, call
//!    arguments, and returns.
//! 5. [`cfg`] — flow-sensitive path verification over the control flow graph.
//! 6. [`interprocedural`] — per-callee effect summaries and the
//!    cross-function worklist tracer.
//! 7. [`fidelity`] — per-stage manifest/receipt reconciliation.
//! 8. [`engine`] — orchestration and result assembly.

pub mod cache;
pub mod cfg;
pub mod discovery;
pub mod engine;
pub mod fidelity;
pub mod index;
pub mod interprocedural;
pub mod propagation;
pub mod registry;
pub mod types;

pub use engine::{trace_taint, trace_taint_file};
pub use registry::TaintRegistry;
pub use types::{TaintPath, TaintReport};
