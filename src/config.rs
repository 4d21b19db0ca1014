//! Daemon configuration.
//!
//! Values resolve from CLI flags, then environment variables, then defaults.
//! Invalid environment values are ignored.

use crate::daemon_paths;
use crate::updates::DEFAULT_UPDATE_CAPACITY;
use anyhow::Result;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Overrides the socket path.
pub const SOCKET_ENV: &str = "AGENT_TELEGRAM_SOCKET";

/// Overrides the session storage path.
pub const SESSION_PATH_ENV: &str = "AGENT_TELEGRAM_SESSION_PATH";

/// Overrides the update store capacity.
pub const UPDATE_LIMIT_ENV: &str = "AGENT_TELEGRAM_UPDATE_LIMIT";

/// Time allowed for in-flight connections to drain on shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for a live identity refresh in `status`.
pub const STATUS_REFRESH_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-call timeout used by the IPC client.
pub const CLIENT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for the daemon to go away.
pub const STOP_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while `stop` waits.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Retry behaviour of the session supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Start attempts before the supervisor gives up.
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * base_delay`.
    pub base_delay: Duration,
    /// Pause between a reload-triggered disconnect and the next start.
    pub reload_settle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            reload_settle: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Settings for `serve`.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub session_path: PathBuf,
    pub update_capacity: usize,
    pub foreground: bool,
    pub retry: RetryPolicy,
}

impl DaemonConfig {
    pub fn resolve(
        socket: Option<PathBuf>,
        session: Option<PathBuf>,
        foreground: bool,
    ) -> Result<Self> {
        let session_path = match session.or_else(|| env_path(SESSION_PATH_ENV)) {
            Some(path) => path,
            None => daemon_paths::default_session_path()?,
        };
        Ok(Self {
            socket_path: socket_path(socket),
            session_path,
            update_capacity: env_parse(UPDATE_LIMIT_ENV).unwrap_or(DEFAULT_UPDATE_CAPACITY),
            foreground,
            retry: RetryPolicy::default(),
        })
    }
}

/// Resolves the socket path for any command: flag, then env, then default.
pub fn socket_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env_path(SOCKET_ENV))
        .unwrap_or_else(|| PathBuf::from(daemon_paths::DEFAULT_SOCKET_PATH))
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
