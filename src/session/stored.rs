//! Session backend that serves a persisted login from the session file.
//!
//! The file is written by an external login flow. A missing file means
//! nobody has logged in yet, which surfaces as "not authorized".

use super::{Identity, RemoteSession, SessionError, SessionFactory};
use crate::peer::{InputPeer, PeerAddress, PeerResolver};
use crate::updates::{UpdateKind, UpdatePublisher};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

/// On-disk layout of the session file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub peers: Vec<KnownPeer>,
    /// Updates received while the daemon was offline, delivered on start.
    #[serde(default)]
    pub pending_updates: Vec<PendingUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownPeer {
    #[serde(default)]
    pub username: Option<String>,
    pub peer: InputPeer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SessionData {
    fn find_peer(&self, address: &PeerAddress) -> Option<InputPeer> {
        self.peers
            .iter()
            .find(|known| match (address, &known.peer) {
                (PeerAddress::Username(name), _) => known
                    .username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(name)),
                (PeerAddress::User(id), InputPeer::User { user_id, .. }) => user_id == id,
                (PeerAddress::Channel(id), InputPeer::Channel { channel_id, .. }) => {
                    channel_id == id
                }
                _ => false,
            })
            .map(|known| known.peer.clone())
    }
}

/// A session backed by the session file.
pub struct StoredSession {
    path: PathBuf,
    publisher: Arc<dyn UpdatePublisher>,
    data: RwLock<Option<SessionData>>,
}

impl StoredSession {
    pub fn new(path: impl Into<PathBuf>, publisher: Arc<dyn UpdatePublisher>) -> Self {
        Self {
            path: path.into(),
            publisher,
            data: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_error(&self, message: impl ToString) -> SessionError {
        SessionError::SessionFile {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }

    fn with_data<T>(&self, f: impl FnOnce(&SessionData) -> T) -> Result<T, SessionError> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(f).ok_or(SessionError::NotInitialized)
    }

    fn take_pending_updates(&self) -> Vec<PendingUpdate> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_mut()
            .map(|data| std::mem::take(&mut data.pending_updates))
            .unwrap_or_default()
    }
}

#[async_trait]
impl PeerResolver for StoredSession {
    async fn lookup_peer(&self, address: &PeerAddress) -> Result<InputPeer, SessionError> {
        if let Some(peer) = address.local_peer() {
            return Ok(peer);
        }
        self.with_data(|data| data.find_peer(address))?
            .ok_or_else(|| SessionError::PeerNotFound(address.to_string()))
    }
}

#[async_trait]
impl RemoteSession for StoredSession {
    async fn connect(&self) -> Result<(), SessionError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                serde_json::from_str::<SessionData>(&content).map_err(|e| self.file_error(e))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Session file not found");
                SessionData::default()
            }
            Err(e) => return Err(self.file_error(e)),
        };

        tracing::debug!(
            path = %self.path.display(),
            peers = data.peers.len(),
            pending = data.pending_updates.len(),
            "Loaded session file"
        );
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, SessionError> {
        self.with_data(|data| data.identity.is_some())
    }

    async fn identity(&self) -> Result<Identity, SessionError> {
        self.with_data(|data| data.identity.clone())?
            .ok_or(SessionError::NotAuthorized)
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), SessionError> {
        for update in self.take_pending_updates() {
            self.publisher.publish(update.kind, update.data);
        }
        cancel.cancelled().await;
        Ok(())
    }
}

/// Opens [`StoredSession`]s for one session file.
pub struct StoredSessionFactory {
    path: PathBuf,
}

impl StoredSessionFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionFactory for StoredSessionFactory {
    fn open(&self, publisher: Arc<dyn UpdatePublisher>) -> Arc<dyn RemoteSession> {
        Arc::new(StoredSession::new(self.path.clone(), publisher))
    }
}

#[cfg(test)]
#[path = "tests/stored_tests.rs"]
mod tests;
