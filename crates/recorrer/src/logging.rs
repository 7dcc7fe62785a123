//! Suite logging setup.
//!
//! Scenario execution logs through `tracing`; embedders that want output
//! call one of these once at startup. Filtering follows `RUST_LOG`, with
//! `info` as the fallback.

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a human-readable subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init();
}

/// Install a JSON subscriber for machine-read logs (CI collectors).
pub fn init_json_tracing() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .try_init();
}
