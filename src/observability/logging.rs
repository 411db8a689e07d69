//! # Logging
//!
//! Installs the global `tracing` subscriber.
//!
//! `RUST_LOG` wins when set; otherwise `LOG_LEVEL` applies to this crate.
//! `LOG_FORMAT=text` switches from JSON lines to human-readable output.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Build the default filter directive for a level name
pub fn default_directive(log_level: &str) -> String {
    let level = match log_level.to_ascii_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    format!("vault_sync_controller={level}")
}

/// Install the global subscriber
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if log_format.eq_ignore_ascii_case("text") {
        builder.try_init()
    } else {
        builder.json().flatten_event(true).try_init()
    };

    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
