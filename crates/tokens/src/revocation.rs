//! Revocation list: token ids that must never verify again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use warden_core::TokenId;

use crate::error::RevocationError;

/// Set of revoked token ids with expiry-based cleanup.
///
/// Entries only need to outlive the token they name: once `expires_at` passes
/// the token fails verification as `Expired` anyway and the entry may go.
///
/// Implementations must make a completed `add` visible to every later
/// `is_revoked` in the same process. The in-memory implementation gives no
/// cross-process guarantee; a deployment running several processes needs a
/// shared implementation of this trait.
#[async_trait]
pub trait RevocationList: Send + Sync {
    /// Revoke `id` until `expires_at`. Returns `true` when the id was not
    /// already revoked.
    async fn add(&self, id: &TokenId, expires_at: DateTime<Utc>) -> Result<bool, RevocationError>;

    async fn is_revoked(&self, id: &TokenId) -> Result<bool, RevocationError>;

    /// Forget `id`. Returns `true` when an entry was removed.
    async fn remove(&self, id: &TokenId) -> Result<bool, RevocationError>;

    /// Delete every entry whose expiry is at or before `now`.
    async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize, RevocationError>;

    async fn len(&self) -> Result<usize, RevocationError>;
}

/// In-memory revocation list.
///
/// Backed by a sharded map: readers and writers only contend when their ids
/// hash to the same shard, and the cleanup sweep locks one shard at a time.
#[derive(Debug, Default)]
pub struct InMemoryRevocationList {
    entries: DashMap<TokenId, DateTime<Utc>>,
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationList for InMemoryRevocationList {
    async fn add(&self, id: &TokenId, expires_at: DateTime<Utc>) -> Result<bool, RevocationError> {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut existing) => {
                if *existing.get() < expires_at {
                    existing.insert(expires_at);
                }
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_revoked(&self, id: &TokenId) -> Result<bool, RevocationError> {
        Ok(self.entries.contains_key(id))
    }

    async fn remove(&self, id: &TokenId) -> Result<bool, RevocationError> {
        Ok(self.entries.remove(id).is_some())
    }

    async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize, RevocationError> {
        let mut removed = 0;
        self.entries.retain(|_, expires_at| {
            let keep = *expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, RevocationError> {
        Ok(self.entries.len())
    }
}
