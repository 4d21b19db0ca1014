//! Tracing subscriber setup for the binary.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Log filter directives, e.g. `debug` or `agent_telegram::ipc=trace`.
pub const LOG_ENV: &str = "AGENT_TELEGRAM_LOG";

const DEFAULT_FILTER: &str = "info";

/// Filter from [`LOG_ENV`], falling back to `info` when unset or invalid.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber writing to stderr.
///
/// A detached daemon's stderr is the log file, so colours are only used when
/// stderr is a terminal. Calling this twice is harmless.
pub fn init(detached: bool) {
    let ansi = !detached && std::io::stderr().is_terminal();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
#[path = "tests/logging_tests.rs"]
mod tests;
