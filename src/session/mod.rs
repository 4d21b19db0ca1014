//! Remote session seams and lifecycle supervision.
//!
//! ## Architecture
//!
//! - **Seams (`mod.rs`)**: [`RemoteSession`] and [`SessionFactory`] hide the
//!   remote client library; the daemon never speaks the wire protocol itself.
//! - **Supervisor (`supervisor.rs`)**: owns the one live session, signals
//!   readiness, retries failed starts with backoff and performs hot reloads.
//! - **Stored session (`stored.rs`)**: backend that serves a persisted login
//!   from the session file.

pub mod stored;
pub mod supervisor;

use crate::peer::PeerResolver;
use crate::updates::UpdatePublisher;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use stored::{StoredSession, StoredSessionFactory};
pub use supervisor::SessionSupervisor;

/// Failures raised by sessions and the supervisor.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("not authorized, run the login flow first")]
    NotAuthorized,
    #[error("session file {}: {message}", path.display())]
    SessionFile { path: PathBuf, message: String },
    #[error("peer not found: {0}")]
    PeerNotFound(String),
    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),
    #[error("session not initialized (it may still be starting)")]
    NotInitialized,
    #[error("session supervisor is not running")]
    SupervisorStopped,
    #[error("session start gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("session cancelled")]
    Cancelled,
    #[error("session failed: {0}")]
    Failed(String),
}

/// The account a session is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Lifecycle phase reported by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Stopped,
    Starting,
    Authenticating,
    Ready,
    Running,
    Backoff,
    Restarting,
}

impl SessionPhase {
    /// Whether a live, authorized session is available.
    pub fn is_ready(self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Stopped => "stopped",
            SessionPhase::Starting => "starting",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Ready => "ready",
            SessionPhase::Running => "running",
            SessionPhase::Backoff => "backoff",
            SessionPhase::Restarting => "restarting",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the session, written only by the supervisor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub initialized: bool,
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

/// One connection to the remote service.
///
/// `run` blocks until `cancel` fires (returning `Ok`) or the connection fails.
#[async_trait]
pub trait RemoteSession: PeerResolver {
    async fn connect(&self) -> Result<(), SessionError>;
    async fn is_authorized(&self) -> Result<bool, SessionError>;
    async fn identity(&self) -> Result<Identity, SessionError>;
    async fn run(&self, cancel: CancellationToken) -> Result<(), SessionError>;
}

/// Opens fresh sessions; the supervisor asks for one per start attempt.
pub trait SessionFactory: Send + Sync {
    fn open(&self, publisher: Arc<dyn UpdatePublisher>) -> Arc<dyn RemoteSession>;
}
