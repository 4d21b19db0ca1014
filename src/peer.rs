//! Peer address parsing and the resolution cache.
//!
//! Address grammar:
//! - `me`, `self`, `current_user` - the logged-in account
//! - `@name` - username, looked up through the session
//! - positive integer - user id, looked up through the session
//! - `-100<digits>` - channel id, looked up through the session
//! - any other negative integer - basic chat id
//!
//! Lookups that need the session go through [`PeerResolver`]; everything else
//! resolves locally. Results are memoized until the next session reload.

use crate::session::SessionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

const CHANNEL_PREFIX: &str = "-100";

/// Addressing structure the remote service needs to reach a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPeer {
    #[serde(rename = "self")]
    Me,
    User { user_id: i64, access_hash: i64 },
    Chat { chat_id: i64 },
    Channel { channel_id: i64, access_hash: i64 },
}

/// A parsed peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    Me,
    Username(String),
    User(i64),
    Chat(i64),
    Channel(i64),
}

impl PeerAddress {
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let raw = raw.trim();
        match raw {
            "me" | "self" | "current_user" => return Ok(Self::Me),
            _ => {}
        }

        if let Some(name) = raw.strip_prefix('@') {
            if name.is_empty() {
                return Err(SessionError::InvalidAddress(raw.to_string()));
            }
            return Ok(Self::Username(name.to_string()));
        }

        let id: i64 = raw
            .parse()
            .map_err(|_| SessionError::InvalidAddress(raw.to_string()))?;
        if id > 0 {
            return Ok(Self::User(id));
        }
        if id == 0 {
            return Err(SessionError::InvalidAddress(raw.to_string()));
        }

        if let Some(channel) = raw
            .strip_prefix(CHANNEL_PREFIX)
            .and_then(|digits| digits.parse::<i64>().ok())
            .filter(|channel| *channel > 0)
        {
            return Ok(Self::Channel(channel));
        }
        Ok(Self::Chat(-id))
    }

    /// Returns the peer when it can be built without asking the session.
    pub fn local_peer(&self) -> Option<InputPeer> {
        match self {
            Self::Me => Some(InputPeer::Me),
            Self::Chat(chat_id) => Some(InputPeer::Chat { chat_id: *chat_id }),
            _ => None,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Me => write!(f, "me"),
            Self::Username(name) => write!(f, "@{}", name),
            Self::User(id) => write!(f, "{}", id),
            Self::Chat(id) => write!(f, "-{}", id),
            Self::Channel(id) => write!(f, "{}{}", CHANNEL_PREFIX, id),
        }
    }
}

/// Looks up peers that cannot be resolved locally.
#[async_trait]
pub trait PeerResolver: Send + Sync {
    async fn lookup_peer(&self, address: &PeerAddress) -> Result<InputPeer, SessionError>;
}

/// Memoizes address strings to resolved peers.
///
/// Entries never expire; [`PeerCache::clear`] is the only invalidation.
/// Concurrent cold lookups of one address may both reach the resolver.
#[derive(Default)]
pub struct PeerCache {
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, InputPeer>,
    /// Bumped by every clear; lookups started under an older value are not stored.
    generation: u64,
}

impl PeerCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn resolve<R>(&self, resolver: &R, address: &str) -> Result<InputPeer, SessionError>
    where
        R: PeerResolver + ?Sized,
    {
        let generation = {
            let inner = self.lock();
            if let Some(peer) = inner.entries.get(address) {
                return Ok(peer.clone());
            }
            inner.generation
        };

        let parsed = PeerAddress::parse(address)?;
        let peer = match parsed.local_peer() {
            Some(peer) => peer,
            None => resolver.lookup_peer(&parsed).await?,
        };

        let mut inner = self.lock();
        if inner.generation == generation {
            inner.entries.insert(address.to_string(), peer.clone());
        } else {
            tracing::debug!(%address, "Peer cache cleared during lookup, not storing");
        }
        Ok(peer)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        if !inner.entries.is_empty() {
            tracing::debug!(count = inner.entries.len(), "Clearing peer cache");
        }
        inner.entries.clear();
        inner.generation = inner.generation.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "tests/peer_tests.rs"]
mod tests;
