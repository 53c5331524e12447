use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use jiff::{SignedDuration, Timestamp};
use paylink_core::{InsertOutcome, LinkStore, ShortToken, StoreError};
use std::time::Duration;
use tracing::trace;

/// In-memory storage entry for a short-link mapping.
#[derive(Debug, Clone)]
struct Entry {
    target: String,
    expires_at: Timestamp,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Timestamp::now() >= self.expires_at
    }
}

/// In-memory implementation of [`LinkStore`] using DashMap.
///
/// Expiry is checked on access; expired entries are treated as absent and
/// evicted lazily. Suitable for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    storage: DashMap<String, Entry>,
}

impl InMemoryLinkStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Creates a new in-memory store with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
        }
    }

    /// Number of entries currently held, including not-yet-evicted expired ones.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

fn expiry_from_now(ttl: Duration) -> Result<Timestamp, StoreError> {
    let ttl = SignedDuration::try_from(ttl)
        .map_err(|e| StoreError::InvalidData(format!("ttl out of range: {e}")))?;
    Timestamp::now()
        .checked_add(ttl)
        .map_err(|e| StoreError::InvalidData(format!("ttl out of range: {e}")))
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn insert_if_absent(
        &self,
        token: &ShortToken,
        target: &str,
        ttl: Duration,
    ) -> Result<InsertOutcome, StoreError> {
        let entry = Entry {
            target: target.to_owned(),
            expires_at: expiry_from_now(ttl)?,
        };

        // The shard lock is held for the whole check-and-insert.
        match self.storage.entry(token.as_str().to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                if !occupied.get().is_expired() {
                    trace!(token = %token, "token already taken");
                    return Ok(InsertOutcome::AlreadyExists);
                }
                occupied.insert(entry);
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        Ok(InsertOutcome::Stored)
    }

    async fn get(&self, token: &ShortToken) -> Result<Option<String>, StoreError> {
        let key = token.as_str();

        let Some(entry) = self.storage.get(key) else {
            return Ok(None);
        };

        if entry.is_expired() {
            drop(entry);
            self.storage.remove_if(key, |_, e| e.is_expired());
            return Ok(None);
        }

        Ok(Some(entry.target.clone()))
    }
}
