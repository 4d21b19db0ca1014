//! In-process composition of the daemon.
//!
//! Wires the update store, peer cache, session supervisor and socket server
//! together and runs them until the root token is cancelled. Process-level
//! concerns (lock, PID file, signals, detachment) live in `app`.

use crate::config::{RetryPolicy, SHUTDOWN_TIMEOUT};
use crate::ipc::builtin::{register_builtin, DaemonContext};
use crate::ipc::domain::register_domain;
use crate::ipc::{MethodRegistry, ShutdownReport, SocketServer};
use crate::peer::PeerCache;
use crate::session::{SessionError, SessionFactory, SessionSupervisor};
use crate::updates::UpdateStore;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything needed to assemble a [`Daemon`].
pub struct DaemonSettings {
    pub socket_path: PathBuf,
    pub session_path: PathBuf,
    pub update_capacity: usize,
    pub retry: RetryPolicy,
    pub drain_timeout: Duration,
}

impl DaemonSettings {
    pub fn new(socket_path: impl Into<PathBuf>, session_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            session_path: session_path.into(),
            update_capacity: 0,
            retry: RetryPolicy::default(),
            drain_timeout: SHUTDOWN_TIMEOUT,
        }
    }
}

/// How a daemon run ended.
#[derive(Debug)]
pub struct DaemonExit {
    pub shutdown: ShutdownReport,
    /// Outcome of the session supervisor.
    pub session: Result<(), SessionError>,
}

impl DaemonExit {
    /// Whether the run ended for a reason that should fail the process.
    pub fn is_failure(&self) -> bool {
        matches!(self.session, Err(SessionError::NotAuthorized))
    }
}

pub struct Daemon {
    root: CancellationToken,
    registry: Arc<MethodRegistry>,
    server: SocketServer,
    supervisor: Arc<SessionSupervisor>,
    updates: Arc<UpdateStore>,
}

impl Daemon {
    pub fn new(
        settings: DaemonSettings,
        factory: Arc<dyn SessionFactory>,
        root: CancellationToken,
    ) -> Self {
        let updates = Arc::new(UpdateStore::new(settings.update_capacity));
        let supervisor = Arc::new(SessionSupervisor::new(
            factory,
            updates.clone(),
            Arc::new(PeerCache::new()),
            settings.retry,
        ));
        let registry = Arc::new(MethodRegistry::new());
        register_builtin(
            &registry,
            Arc::new(DaemonContext {
                supervisor: Arc::clone(&supervisor),
                updates: Arc::clone(&updates),
                session_path: settings.session_path,
                shutdown: root.clone(),
            }),
        );
        let server = SocketServer::new(
            settings.socket_path,
            Arc::clone(&registry),
            &root,
            settings.drain_timeout,
        );

        Self {
            root,
            registry,
            server,
            supervisor,
            updates,
        }
    }

    pub fn socket_path(&self) -> &Path {
        self.server.path()
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<SessionSupervisor> {
        &self.supervisor
    }

    pub fn updates(&self) -> &Arc<UpdateStore> {
        &self.updates
    }

    /// Binds the socket. Fails when another daemon is listening.
    pub async fn bind(&self) -> Result<()> {
        self.server.bind().await
    }

    /// Serves until the root token is cancelled, then shuts everything down.
    ///
    /// An unauthorized session cancels the root token; exhausted retries only
    /// stop the supervisor and the socket keeps serving.
    pub async fn run(&self) -> Result<DaemonExit> {
        let supervisor_task = {
            let supervisor = Arc::clone(&self.supervisor);
            let root = self.root.clone();
            tokio::spawn(async move {
                let result = supervisor.run(root.clone()).await;
                match &result {
                    Err(SessionError::NotAuthorized) => {
                        tracing::error!("Session is not authorized, shutting down");
                        root.cancel();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Session unavailable, daemon keeps serving")
                    }
                    Ok(()) => {}
                }
                result
            })
        };

        let watcher = {
            let supervisor = Arc::clone(&self.supervisor);
            let registry = Arc::clone(&self.registry);
            let root = self.root.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = root.cancelled() => {}
                    _ = supervisor.ready() => {
                        register_domain(&registry, Arc::clone(&supervisor));
                        tracing::info!("Session methods registered");
                    }
                }
            })
        };

        let served = self.server.serve().await;
        self.root.cancel();
        let shutdown = self.server.shutdown().await;
        watcher.abort();

        let session = match supervisor_task.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Failed(format!("supervisor task failed: {}", e))),
        };
        served?;

        Ok(DaemonExit { shutdown, session })
    }
}

#[cfg(test)]
#[path = "tests/daemon_tests.rs"]
mod tests;
