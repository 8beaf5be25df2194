//! # seep-core
//!
//! Shared foundation for the Seep taint engine: per-subsystem error enums,
//! analysis configuration, collection aliases, telemetry setup, cooperative
//! cancellation, and memory governance.

pub mod config;
pub mod constants;
pub mod errors;
pub mod memory;
pub mod telemetry;
pub mod traits;
pub mod types;
