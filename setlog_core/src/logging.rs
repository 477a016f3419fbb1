//! Logging setup for setlog binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "SETLOG_LOG";

/// Initialize logging at INFO unless overridden by the environment
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific default level
///
/// `SETLOG_LOG` takes precedence, then `RUST_LOG`, then `default_level`.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_with_level(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
