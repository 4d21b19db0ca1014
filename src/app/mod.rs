//! Command implementations behind the `agent-telegram` binary.

pub mod cli;

use crate::config::{self, DaemonConfig, STOP_POLL_INTERVAL, STOP_WAIT_TIMEOUT};
use crate::daemon::{Daemon, DaemonExit, DaemonSettings};
use crate::daemon_paths;
use crate::ipc::builtin::StatusReport;
use crate::ipc::{is_server_running, ClientError, IpcClient};
use crate::process::daemonize::spawn_detached;
use crate::process::{force_kill, process_alive, read_pid, remove_pid, write_pid, LockFile};
use crate::session::StoredSessionFactory;
use anyhow::{Context, Result};
use cli::Command;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Starts a background copy of this process and reports where it went.
///
/// Runs before any async runtime exists.
pub fn detach() -> Result<ExitCode> {
    let log_path = daemon_paths::log_path()?;
    let detached = spawn_detached(&log_path)?;
    println!("Daemon started in background (pid {})", detached.pid);
    println!("Logs: {}", detached.log_path.display());
    Ok(ExitCode::SUCCESS)
}

pub async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Serve {
            socket,
            session,
            foreground,
        } => serve(DaemonConfig::resolve(socket, session, foreground)?).await,
        Command::Status { json, socket } => status(&config::socket_path(socket), json).await,
        Command::Stop { force, socket } => stop(&config::socket_path(socket), force).await,
        Command::Call {
            method,
            params,
            socket,
        } => call(&config::socket_path(socket), &method, params.as_deref()).await,
    }
}

/// Runs the daemon in this process until it is told to stop.
pub async fn serve(config: DaemonConfig) -> Result<ExitCode> {
    let mut lock = LockFile::new(daemon_paths::lock_path()?);
    let acquired = lock
        .try_lock()
        .with_context(|| format!("Failed to open lock file: {}", lock.path().display()))?;
    if !acquired {
        eprintln!(
            "Another agent-telegram daemon is already running (lock: {})",
            lock.path().display()
        );
        return Ok(ExitCode::FAILURE);
    }

    let pid_path = daemon_paths::pid_path()?;
    let pid = write_pid(&pid_path)?;
    tracing::info!(
        pid,
        foreground = config.foreground,
        socket = %config.socket_path.display(),
        session = %config.session_path.display(),
        "Starting daemon"
    );

    let root = CancellationToken::new();
    let signals = tokio::spawn(watch_signals(root.clone()));

    let mut settings = DaemonSettings::new(&config.socket_path, &config.session_path);
    settings.update_capacity = config.update_capacity;
    settings.retry = config.retry;
    let daemon = Daemon::new(
        settings,
        Arc::new(StoredSessionFactory::new(&config.session_path)),
        root,
    );
    let outcome = bind_and_run(&daemon).await;

    signals.abort();
    if let Err(e) = remove_pid(&pid_path) {
        tracing::warn!(error = %e, "Failed to remove PID file");
    }
    if let Err(e) = lock.unlock() {
        tracing::warn!(error = %e, "Failed to release lock");
    }

    let exit = outcome?;
    if !exit.shutdown.drained {
        tracing::warn!(
            remaining = exit.shutdown.remaining,
            "Connections still open at exit"
        );
    }
    if exit.is_failure() {
        if let Err(e) = &exit.session {
            eprintln!("Daemon stopped: {}", e);
        }
        return Ok(ExitCode::FAILURE);
    }
    tracing::info!("Daemon stopped");
    Ok(ExitCode::SUCCESS)
}

async fn bind_and_run(daemon: &Daemon) -> Result<DaemonExit> {
    daemon.bind().await?;
    daemon.run().await
}

async fn watch_signals(root: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            return;
        }
    };
    tokio::select! {
        _ = root.cancelled() => return,
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
        _ = terminate.recv() => tracing::info!("Received SIGTERM"),
    }
    root.cancel();
}

pub async fn status(socket: &Path, json: bool) -> Result<ExitCode> {
    match IpcClient::new(socket).status().await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", format_status(&report, socket));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(ClientError::NotRunning { .. }) => {
            if json {
                println!("{}", serde_json::json!({ "status": "not_running" }));
            } else {
                println!("Daemon is not running ({})", socket.display());
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("Failed to query daemon status"),
    }
}

/// Human-readable rendering of a status report.
pub fn format_status(report: &StatusReport, socket: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Daemon running (pid {})", report.pid);
    if !report.version.is_empty() {
        let _ = writeln!(out, "  version:    {}", report.version);
    }
    let _ = writeln!(out, "  socket:     {}", socket.display());
    let _ = writeln!(out, "  session:    {}", report.session_path.display());
    let _ = writeln!(out, "  phase:      {}", report.phase);
    let _ = writeln!(
        out,
        "  authorized: {}",
        if report.authorized { "yes" } else { "no" }
    );

    let name = match (&report.username, &report.first_name) {
        (Some(username), _) => Some(format!("@{}", username)),
        (None, Some(first)) => Some(first.clone()),
        (None, None) => None,
    };
    match (name, report.user_id) {
        (Some(name), Some(id)) => {
            let _ = writeln!(out, "  user:       {} ({})", name, id);
        }
        (Some(name), None) => {
            let _ = writeln!(out, "  user:       {}", name);
        }
        (None, Some(id)) => {
            let _ = writeln!(out, "  user:       {}", id);
        }
        (None, None) => {}
    }
    out
}

pub async fn stop(socket: &Path, force: bool) -> Result<ExitCode> {
    let client = IpcClient::new(socket);
    let pid_path = daemon_paths::pid_path()?;

    if force {
        let pid = match read_pid(&pid_path) {
            Some(pid) => Some(pid),
            None => client.status().await.ok().map(|report| report.pid),
        };
        let Some(pid) = pid.filter(|pid| process_alive(*pid)) else {
            println!("Daemon is not running");
            remove_pid(&pid_path)?;
            return Ok(ExitCode::FAILURE);
        };
        force_kill(pid)?;
        remove_pid(&pid_path)?;
        println!("Killed daemon (pid {})", pid);
        return Ok(ExitCode::SUCCESS);
    }

    match client.shutdown().await {
        Ok(result) => println!("{}", result.message),
        Err(ClientError::NotRunning { .. }) => {
            println!("Daemon is not running ({})", socket.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Failed to request shutdown"),
    }

    if wait_until_stopped(socket).await {
        println!("Daemon stopped");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "Daemon still answering after {}s; retry with --force",
            STOP_WAIT_TIMEOUT.as_secs()
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn wait_until_stopped(socket: &Path) -> bool {
    let deadline = Instant::now() + STOP_WAIT_TIMEOUT;
    loop {
        if !is_server_running(socket).await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(STOP_POLL_INTERVAL).await;
    }
}

pub async fn call(socket: &Path, method: &str, params: Option<&str>) -> Result<ExitCode> {
    let params = parse_params(params)?;
    match IpcClient::new(socket).call(method, params).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e.to_error_object());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Parses the optional params argument of `call`.
pub fn parse_params(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|raw| {
        serde_json::from_str::<Value>(raw)
            .with_context(|| format!("Params are not valid JSON: {}", raw))
    })
    .transpose()
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
