//! Bounded in-memory log of pushed updates.
//!
//! The session pushes updates as they arrive; callers drain them with
//! `get_updates`. Retrieval is consuming and newest-first, and the log evicts
//! its oldest entries once it reaches capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of updates retained when no explicit capacity is configured.
pub const DEFAULT_UPDATE_CAPACITY: usize = 1000;

/// Category of a pushed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    NewMessage,
    EditMessage,
    NewChat,
    Delete,
    Other,
}

/// An update as held by the store and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUpdate {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// Push seam between a remote session and whatever consumes its updates.
///
/// Called from the session's own task, so implementations must not block.
pub trait UpdatePublisher: Send + Sync {
    fn publish(&self, kind: UpdateKind, data: serde_json::Value);
}

struct StoreInner {
    entries: VecDeque<StoredUpdate>,
    next_id: i64,
}

/// Capacity-bounded FIFO-evicting update log.
pub struct UpdateStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
}

impl UpdateStore {
    /// Creates a store holding at most `capacity` updates. Zero selects
    /// [`DEFAULT_UPDATE_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_UPDATE_CAPACITY
        } else {
            capacity
        };
        Self {
            inner: Mutex::new(StoreInner {
                entries: VecDeque::new(),
                next_id: 1,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends an update, assigning the next id and the current time, and
    /// returns the assigned id.
    pub fn push(&self, kind: UpdateKind, data: serde_json::Value) -> i64 {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push_back(StoredUpdate {
            id,
            kind,
            timestamp: Utc::now(),
            data,
        });
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
        }
        id
    }

    /// Removes up to `max` of the newest updates and returns them newest-first.
    pub fn pop(&self, max: usize) -> Vec<StoredUpdate> {
        let mut inner = self.lock();
        let count = max.min(inner.entries.len());
        let start = inner.entries.len() - count;
        let mut taken: Vec<StoredUpdate> = inner.entries.drain(start..).collect();
        taken.reverse();
        taken
    }
}

impl Default for UpdateStore {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_CAPACITY)
    }
}

impl UpdatePublisher for UpdateStore {
    fn publish(&self, kind: UpdateKind, data: serde_json::Value) {
        let id = self.push(kind, data);
        tracing::trace!(id, ?kind, "Stored update");
    }
}

#[cfg(test)]
#[path = "tests/updates_tests.rs"]
mod tests;
