//! Per-user storage paths for the daemon.
//!
//! Everything lives under `~/.agent-telegram/` (override with
//! `AGENT_TELEGRAM_HOME`):
//! - `server.lock` - single-instance lock
//! - `server.pid` - PID of the running daemon
//! - `server.log` - output of a detached daemon
//! - `session.json` - default session storage
//!
//! The socket is not stored here; it defaults to [`DEFAULT_SOCKET_PATH`].

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Environment variable that relocates the state directory.
pub const HOME_ENV: &str = "AGENT_TELEGRAM_HOME";

/// Default location of the daemon's Unix socket.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/agent-telegram.sock";

/// The name of the state directory under the user's home.
const STATE_DIR_NAME: &str = ".agent-telegram";

/// Returns the state directory, creating it with mode 0700 if needed.
///
/// # Errors
///
/// Returns an error if:
/// - Home directory cannot be determined (and `AGENT_TELEGRAM_HOME` is unset)
/// - Directory creation fails
pub fn state_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .context("Could not determine home directory for daemon state")?
            .join(STATE_DIR_NAME),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).with_context(|| {
            format!("Failed to restrict state directory: {}", dir.display())
        })?;
    }

    Ok(dir)
}

/// Returns the lock file path: `~/.agent-telegram/server.lock`
pub fn lock_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("server.lock"))
}

/// Returns the PID file path: `~/.agent-telegram/server.pid`
pub fn pid_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("server.pid"))
}

/// Returns the background log path: `~/.agent-telegram/server.log`
pub fn log_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("server.log"))
}

/// Returns the default session file: `~/.agent-telegram/session.json`
pub fn default_session_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("session.json"))
}

#[cfg(test)]
#[path = "tests/daemon_paths_tests.rs"]
mod tests;
