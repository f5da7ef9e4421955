//! Tracing initialisation.
//!
//! Logs go to stderr: stdout carries the MCP stdio transport and must stay
//! clean.

use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
