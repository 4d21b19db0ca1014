//! agent-telegram: a background daemon that owns one messaging session and
//! serves JSON-RPC requests over a local Unix socket.

#[cfg(not(unix))]
compile_error!("agent-telegram requires a Unix platform");

pub mod app;
pub mod config;
pub mod daemon;
pub mod daemon_paths;
pub mod ipc;
pub mod logging;
pub mod peer;
pub mod process;
pub mod session;
pub mod updates;

/// Git commit the binary was built from, reported by `status`.
pub const BUILD_SHA: &str = env!("AGENT_TELEGRAM_GIT_SHA");
