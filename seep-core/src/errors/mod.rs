//! Error handling for Seep.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod config_error;
pub mod error_code;
pub mod fidelity_error;
pub mod store_error;
pub mod taint_error;

pub use config_error::ConfigError;
pub use error_code::SeepErrorCode;
pub use fidelity_error::FidelityError;
pub use store_error::StoreError;
pub use taint_error::TaintError;
