//! Tracing subscriber setup.
//!
//! The log level follows `RUST_LOG`, falling back to `info` for the app
//! and `tower_http` request traces:
//!
//! ```bash
//! RUST_LOG=academy=debug,tower_http=debug,sqlx=warn cargo run
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,tower_http=info,sqlx=warn";

/// Initialize logging with sensible defaults.
///
/// Call once at startup, before building the `App`.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize JSON-formatted logging for log aggregation in production.
pub fn init_logging_json() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Pick the subscriber for the given environment name.
pub fn init_for_environment(environment: &str) {
    if environment == "production" {
        init_logging_json();
    } else {
        init_logging();
    }
}

/// Install a test subscriber, ignoring the error when one is already set.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
