//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the Seep tracing/logging system.
///
/// Reads the `SEEP_LOG` environment variable for per-subsystem log levels.
/// Format: `SEEP_LOG=seep_analysis=debug,seep_storage=warn`
///
/// Falls back to `seep=info` if `SEEP_LOG` is not set or is invalid.
///
/// This function is idempotent — calling it multiple times is safe.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("SEEP_LOG").unwrap_or_else(|_| EnvFilter::new("seep=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_line_number(true))
            .with(filter)
            .init();
    });
}
