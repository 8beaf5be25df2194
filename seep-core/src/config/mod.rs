//! Analysis configuration.

mod taint_options;

pub use taint_options::TaintOptions;
