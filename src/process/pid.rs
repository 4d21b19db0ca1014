//! PID file helpers and liveness checks.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Writes the current process id to `path` with mode 0600.
pub fn write_pid(path: &Path) -> Result<u32> {
    let pid = std::process::id();
    let mut options = fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open PID file: {}", path.display()))?;
    io::Write::write_all(&mut file, pid.to_string().as_bytes())
        .with_context(|| format!("Failed to write PID file: {}", path.display()))?;
    Ok(pid)
}

/// Reads a PID file. Missing or unparsable files yield `None`.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse().ok())
        .filter(|pid| *pid > 0)
}

/// Removes a PID file; a missing file is fine.
pub fn remove_pid(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove PID file: {}", path.display()))
        }
    }
}

/// Checks whether a process with the given PID exists.
pub fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // Zero addresses the caller's process group.
    if raw == 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Exists but belongs to someone else.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Sends SIGKILL to `pid`.
pub fn force_kill(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .with_context(|| format!("Invalid PID: {}", pid))?;
    kill(Pid::from_raw(raw), Signal::SIGKILL)
        .with_context(|| format!("Failed to kill process {}", pid))
}

#[cfg(test)]
#[path = "tests/pid_tests.rs"]
mod tests;
