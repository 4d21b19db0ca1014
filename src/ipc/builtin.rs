//! Administrative methods available from the moment the socket is bound.

use super::protocol::ErrorObject;
use super::registry::{adapt, MethodRegistry};
use crate::config::STATUS_REFRESH_TIMEOUT;
use crate::session::{SessionPhase, SessionSupervisor};
use crate::updates::{StoredUpdate, UpdateStore};
use crate::BUILD_SHA;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Updates returned when the caller gives no usable limit.
pub const DEFAULT_UPDATES_LIMIT: usize = 10;

/// Most updates returned by one `get_updates` call.
pub const MAX_UPDATES_LIMIT: usize = 100;

/// Shared state the built-in methods operate on.
pub struct DaemonContext {
    pub supervisor: Arc<SessionSupervisor>,
    pub updates: Arc<UpdateStore>,
    pub session_path: PathBuf,
    /// Cancelled by the `shutdown` method.
    pub shutdown: CancellationToken,
}

#[derive(Debug, Default, Deserialize)]
struct PingParams {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub message: String,
    pub pong: bool,
}

#[derive(Debug, Default, Deserialize)]
struct EchoParams {
    #[serde(default)]
    message: String,
}

/// Result of the `status` method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub pid: u32,
    #[serde(default)]
    pub version: String,
    pub session_path: PathBuf,
    pub phase: SessionPhase,
    pub initialized: bool,
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// Result of `shutdown` and `reload_session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
struct GetUpdatesParams {
    #[serde(default)]
    limit: i64,
}

#[derive(Debug, Serialize)]
struct UpdatesResult {
    updates: Vec<StoredUpdate>,
    count: usize,
}

/// Maps a requested `get_updates` limit into `1..=100`.
pub fn clamp_updates_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_UPDATES_LIMIT
    } else {
        usize::try_from(limit)
            .unwrap_or(MAX_UPDATES_LIMIT)
            .min(MAX_UPDATES_LIMIT)
    }
}

pub fn register_builtin(registry: &MethodRegistry, ctx: Arc<DaemonContext>) {
    registry.register(
        "ping",
        adapt(|params: PingParams| async move {
            if let Some(message) = params.message {
                tracing::trace!(%message, "Ping");
            }
            Ok(PingResult {
                message: "pong".to_string(),
                pong: true,
            })
        }),
    );

    registry.register(
        "echo",
        adapt(|params: EchoParams| async move {
            Ok(serde_json::json!({ "echo": params.message }))
        }),
    );

    let status_ctx = Arc::clone(&ctx);
    registry.register(
        "status",
        adapt(move |_: serde_json::Value| {
            let ctx = Arc::clone(&status_ctx);
            async move {
                let session = ctx.supervisor.status(STATUS_REFRESH_TIMEOUT).await;
                let identity = session.identity.unwrap_or_default();
                Ok::<_, ErrorObject>(StatusReport {
                    status: "running".to_string(),
                    pid: std::process::id(),
                    version: BUILD_SHA.to_string(),
                    session_path: ctx.session_path.clone(),
                    phase: session.phase,
                    initialized: session.initialized,
                    authorized: session.authorized,
                    username: identity.username,
                    first_name: identity.first_name,
                    user_id: (identity.user_id != 0).then_some(identity.user_id),
                })
            }
        }),
    );

    let shutdown_ctx = Arc::clone(&ctx);
    registry.register(
        "shutdown",
        adapt(move |_: serde_json::Value| {
            let ctx = Arc::clone(&shutdown_ctx);
            async move {
                tracing::info!("Shutdown requested over IPC");
                ctx.shutdown.cancel();
                Ok::<_, ErrorObject>(ActionResult {
                    success: true,
                    message: "Shutting down...".to_string(),
                })
            }
        }),
    );

    let reload_ctx = Arc::clone(&ctx);
    registry.register(
        "reload_session",
        adapt(move |_: serde_json::Value| {
            let ctx = Arc::clone(&reload_ctx);
            async move {
                let result = match ctx.supervisor.reload() {
                    Ok(()) => ActionResult {
                        success: true,
                        message: "Session reload initiated".to_string(),
                    },
                    Err(e) => ActionResult {
                        success: false,
                        message: e.to_string(),
                    },
                };
                Ok::<_, ErrorObject>(result)
            }
        }),
    );

    registry.register(
        "get_updates",
        adapt(move |params: GetUpdatesParams| {
            let ctx = Arc::clone(&ctx);
            async move {
                let updates = ctx.updates.pop(clamp_updates_limit(params.limit));
                Ok::<_, ErrorObject>(UpdatesResult {
                    count: updates.len(),
                    updates,
                })
            }
        }),
    );
}
