//! Background detachment by re-executing the current binary.
//!
//! The parent spawns a copy of itself with the same arguments and
//! [`DAEMON_CHILD_ENV`] set, in its own process group, with stdin closed and
//! stdout/stderr appended to the log file. The child sees the marker and runs
//! in the foreground of its own session.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Marker telling a re-executed process that it is the detached daemon.
pub const DAEMON_CHILD_ENV: &str = "AGENT_TELEGRAM_DAEMON_CHILD";

/// A daemon process started in the background.
#[derive(Debug, Clone)]
pub struct Detached {
    pub pid: u32,
    pub log_path: PathBuf,
}

/// Whether this process was started by [`spawn_detached`].
pub fn is_daemon_child() -> bool {
    std::env::var_os(DAEMON_CHILD_ENV).is_some_and(|v| v == "1")
}

/// Re-executes the current binary in the background.
pub fn spawn_detached(log_path: &Path) -> Result<Detached> {
    let exe = std::env::current_exe()
        .or_else(|_| which::which("agent-telegram"))
        .context("Failed to find agent-telegram binary")?;
    let mut command = detached_command(&exe, std::env::args_os().skip(1), log_path)?;
    let child = command
        .spawn()
        .with_context(|| format!("Failed to spawn daemon: {}", exe.display()))?;

    Ok(Detached {
        pid: child.id(),
        log_path: log_path.to_path_buf(),
    })
}

/// Builds the command used to start a detached copy of `program`.
fn detached_command(
    program: &Path,
    args: impl IntoIterator<Item = OsString>,
    log_path: &Path,
) -> Result<Command> {
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;
    let log_err = log
        .try_clone()
        .context("Failed to duplicate log file handle")?;

    let mut command = Command::new(program);
    command
        .args(args)
        .env(DAEMON_CHILD_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    Ok(command)
}

#[cfg(test)]
#[path = "tests/daemonize_tests.rs"]
mod tests;
