//! Session supervisor.
//!
//! Drives the session through `Starting -> Authenticating -> Ready -> Running`
//! and back. Failed starts are retried with linear backoff; an unauthorized
//! session is fatal. `reload` swaps in a fresh session without restarting the
//! daemon.
//!
//! Control fields (current session, connection token, reload flag) live behind
//! one mutex; the status snapshot lives behind its own lock so readers are
//! never blocked by the run loop.

use super::{Identity, RemoteSession, SessionError, SessionFactory, SessionPhase, SessionStatus};
use crate::config::RetryPolicy;
use crate::peer::{InputPeer, PeerCache};
use crate::updates::UpdatePublisher;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

struct Control {
    session: Option<Arc<dyn RemoteSession>>,
    conn_token: Option<CancellationToken>,
    reload_tx: mpsc::Sender<()>,
    /// Held here while the run loop is not running.
    reload_rx: Option<mpsc::Receiver<()>>,
    running: bool,
}

/// Owns the single live session of the daemon.
pub struct SessionSupervisor {
    factory: Arc<dyn SessionFactory>,
    publisher: Arc<dyn UpdatePublisher>,
    peers: Arc<PeerCache>,
    policy: RetryPolicy,
    control: Mutex<Control>,
    ready: watch::Sender<bool>,
    state: RwLock<SessionStatus>,
}

impl SessionSupervisor {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        publisher: Arc<dyn UpdatePublisher>,
        peers: Arc<PeerCache>,
        policy: RetryPolicy,
    ) -> Self {
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let (ready, _) = watch::channel(false);
        Self {
            factory,
            publisher,
            peers,
            policy,
            control: Mutex::new(Control {
                session: None,
                conn_token: None,
                reload_tx,
                reload_rx: Some(reload_rx),
                running: false,
            }),
            ready,
            state: RwLock::new(SessionStatus::default()),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_state(&self, update: impl FnOnce(&mut SessionStatus)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut state);
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.update_state(|s| s.phase = phase);
        tracing::debug!(?phase, "Session phase changed");
    }

    /// Marks the session unusable after a failed or finished connection.
    fn mark_down(&self) {
        {
            let mut control = self.control();
            control.session = None;
            control.conn_token = None;
            self.ready.send_replace(false);
        }
        self.update_state(|s| {
            s.initialized = false;
            s.authorized = false;
            s.identity = None;
        });
    }

    /// Cached status; never waits on the session.
    pub fn snapshot(&self) -> SessionStatus {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn peers(&self) -> &Arc<PeerCache> {
        &self.peers
    }

    /// Runs the supervision loop until `shutdown` fires or the session cannot
    /// be (re)started.
    ///
    /// Returns `Ok` on cancellation, [`SessionError::NotAuthorized`] when the
    /// stored login is missing, and [`SessionError::RetriesExhausted`] when
    /// every attempt failed.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SessionError> {
        let mut reload_rx = {
            let mut control = self.control();
            if control.running {
                return Err(SessionError::Failed(
                    "session supervisor is already running".to_string(),
                ));
            }
            let rx = control.reload_rx.take().ok_or(SessionError::SupervisorStopped)?;
            control.running = true;
            rx
        };

        let result = self.run_loop(&shutdown, &mut reload_rx).await;

        {
            let mut control = self.control();
            if let Some(token) = control.conn_token.take() {
                token.cancel();
            }
            control.session = None;
            control.running = false;
            while reload_rx.try_recv().is_ok() {}
            control.reload_rx = Some(reload_rx);
            self.ready.send_replace(false);
        }
        self.update_state(|s| {
            s.phase = SessionPhase::Stopped;
            s.initialized = false;
            s.authorized = false;
            s.identity = None;
        });

        match &result {
            Ok(()) => tracing::info!("Session supervisor stopped"),
            Err(e) => tracing::error!(error = %e, "Session supervisor stopped"),
        }
        result
    }

    async fn run_loop(
        &self,
        shutdown: &CancellationToken,
        reload_rx: &mut mpsc::Receiver<()>,
    ) -> Result<(), SessionError> {
        let mut attempt: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let outcome = match self.start(shutdown, reload_rx).await {
                Ok((session, token)) => {
                    attempt = 0;
                    self.set_phase(SessionPhase::Running);
                    match session.run(token.clone()).await {
                        Ok(()) if token.is_cancelled() => Ok(()),
                        Ok(()) => Err(SessionError::Failed(
                            "session ended unexpectedly".to_string(),
                        )),
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };

            if shutdown.is_cancelled() {
                return Ok(());
            }

            match outcome {
                Ok(()) | Err(SessionError::Cancelled) => {
                    let requested = {
                        let _control = self.control();
                        reload_rx.try_recv().is_ok()
                    };
                    tracing::info!(requested, "Session disconnected, restarting");
                    self.mark_down();
                    self.set_phase(SessionPhase::Restarting);
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(self.policy.reload_settle) => {}
                    }
                }
                Err(SessionError::NotAuthorized) => {
                    self.mark_down();
                    return Err(SessionError::NotAuthorized);
                }
                Err(e) => {
                    self.mark_down();
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Session start failed"
                    );
                    if attempt >= self.policy.max_attempts {
                        return Err(SessionError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    self.set_phase(SessionPhase::Backoff);
                    tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                        Some(()) = reload_rx.recv() => {
                            tracing::info!("Reload requested during backoff");
                        }
                    }
                }
            }
        }
    }

    /// Opens a fresh session and takes it to `Ready`.
    async fn start(
        &self,
        shutdown: &CancellationToken,
        reload_rx: &mut mpsc::Receiver<()>,
    ) -> Result<(Arc<dyn RemoteSession>, CancellationToken), SessionError> {
        let session = self.factory.open(Arc::clone(&self.publisher));
        let token = shutdown.child_token();
        {
            let mut control = self.control();
            control.session = Some(Arc::clone(&session));
            control.conn_token = Some(token.clone());
            // A reload raised before this start is satisfied by it.
            while reload_rx.try_recv().is_ok() {}
        }
        self.set_phase(SessionPhase::Starting);

        let identity = tokio::select! {
            _ = token.cancelled() => return Err(SessionError::Cancelled),
            result = self.authenticate(session.as_ref()) => result?,
        };

        {
            let _control = self.control();
            if token.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            self.update_state(|s| {
                s.phase = SessionPhase::Ready;
                s.initialized = true;
                s.authorized = true;
                s.identity = Some(identity.clone());
            });
            self.ready.send_replace(true);
        }

        tracing::info!(
            user_id = identity.user_id,
            username = identity.username.as_deref().unwrap_or(""),
            "Session ready"
        );
        Ok((session, token))
    }

    async fn authenticate(&self, session: &dyn RemoteSession) -> Result<Identity, SessionError> {
        session.connect().await?;
        self.update_state(|s| {
            s.phase = SessionPhase::Authenticating;
            s.initialized = true;
        });
        if !session.is_authorized().await? {
            return Err(SessionError::NotAuthorized);
        }
        session.identity().await
    }

    /// Replaces the live session with a fresh one.
    ///
    /// Readiness drops immediately and the peer cache is emptied; the run loop
    /// reconnects once the current connection has wound down.
    pub fn reload(&self) -> Result<(), SessionError> {
        let control = self.control();
        if !control.running {
            return Err(SessionError::SupervisorStopped);
        }
        self.ready.send_replace(false);
        self.peers.clear();
        if let Some(token) = &control.conn_token {
            token.cancel();
        }
        if control.reload_tx.try_send(()).is_err() {
            tracing::debug!("Reload already pending");
        }
        self.update_state(|s| {
            s.phase = SessionPhase::Restarting;
            s.authorized = false;
            s.identity = None;
        });
        tracing::info!("Session reload requested");
        Ok(())
    }

    /// Status with a best-effort identity refresh from the live session.
    pub async fn status(&self, timeout: Duration) -> SessionStatus {
        let mut snapshot = self.snapshot();
        if !snapshot.phase.is_ready() {
            return snapshot;
        }
        let Ok(session) = self.current_session() else {
            return snapshot;
        };

        match tokio::time::timeout(timeout, session.identity()).await {
            Ok(Ok(identity)) => {
                self.update_state(|s| {
                    if s.phase.is_ready() {
                        s.identity = Some(identity.clone());
                    }
                });
                snapshot.identity = Some(identity);
            }
            Ok(Err(e)) => tracing::debug!(error = %e, "Identity refresh failed"),
            Err(_) => tracing::debug!("Identity refresh timed out"),
        }
        snapshot
    }

    /// The live session, when one is ready.
    pub fn current_session(&self) -> Result<Arc<dyn RemoteSession>, SessionError> {
        let control = self.control();
        if !self.is_ready() {
            return Err(SessionError::NotInitialized);
        }
        control.session.clone().ok_or(SessionError::NotInitialized)
    }

    /// Resolves a peer address through the cache and the live session.
    pub async fn resolve_peer(&self, address: &str) -> Result<InputPeer, SessionError> {
        let session = self.current_session()?;
        self.peers.resolve(session.as_ref(), address).await
    }

    /// Waits until the session is ready.
    pub async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        if rx.wait_for(|ready| *ready).await.is_err() {
            tracing::debug!("Readiness channel closed");
        }
    }

    /// Waits up to `timeout` for readiness; returns whether it was reached.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.ready()).await.is_ok()
    }
}

#[cfg(test)]
#[path = "tests/supervisor_tests.rs"]
mod tests;
