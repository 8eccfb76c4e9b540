//! Token store for opaque tokens.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{AppId, Claims, RequestContext, SubjectId, TenantId, TokenId};

use crate::error::StoreError;
use crate::token::TokenKind;

/// Server-side record behind an opaque token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token_id: TokenId,
    pub kind: TokenKind,
    pub subject_id: SubjectId,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub claims: Claims,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Storage contract for opaque tokens.
///
/// Records are keyed by token id; mutations that name a subject must refuse
/// records belonging to another subject. Every call receives the request
/// context so networked backends can forward cancellation to their driver.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn store(&self, ctx: &RequestContext, record: StoredToken) -> Result<(), StoreError>;

    async fn get(
        &self,
        ctx: &RequestContext,
        token_id: &TokenId,
    ) -> Result<Option<StoredToken>, StoreError>;

    /// Returns `true` when a record was deleted.
    async fn delete(
        &self,
        ctx: &RequestContext,
        subject_id: &SubjectId,
        token_id: &TokenId,
    ) -> Result<bool, StoreError>;

    async fn list(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
    ) -> Result<Vec<StoredToken>, StoreError>;

    /// Mark a record revoked. Returns `true` when it was not revoked before.
    async fn revoke(
        &self,
        ctx: &RequestContext,
        subject_id: &SubjectId,
        token_id: &TokenId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn is_revoked(&self, ctx: &RequestContext, token_id: &TokenId)
    -> Result<bool, StoreError>;

    /// Delete every record that expired at or before `now`.
    async fn cleanup(&self, ctx: &RequestContext, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[async_trait]
impl<S> TokenStore for Arc<S>
where
    S: TokenStore + ?Sized,
{
    async fn store(&self, ctx: &RequestContext, record: StoredToken) -> Result<(), StoreError> {
        (**self).store(ctx, record).await
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        token_id: &TokenId,
    ) -> Result<Option<StoredToken>, StoreError> {
        (**self).get(ctx, token_id).await
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        subject_id: &SubjectId,
        token_id: &TokenId,
    ) -> Result<bool, StoreError> {
        (**self).delete(ctx, subject_id, token_id).await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
    ) -> Result<Vec<StoredToken>, StoreError> {
        (**self).list(ctx, tenant_id, subject_id).await
    }

    async fn revoke(
        &self,
        ctx: &RequestContext,
        subject_id: &SubjectId,
        token_id: &TokenId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        (**self).revoke(ctx, subject_id, token_id, at).await
    }

    async fn is_revoked(
        &self,
        ctx: &RequestContext,
        token_id: &TokenId,
    ) -> Result<bool, StoreError> {
        (**self).is_revoked(ctx, token_id).await
    }

    async fn cleanup(&self, ctx: &RequestContext, now: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).cleanup(ctx, now).await
    }
}

/// In-memory token store for tests/dev and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: RwLock<HashMap<TokenId, StoredToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn store(&self, _ctx: &RequestContext, record: StoredToken) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        records.insert(record.token_id.clone(), record);
        Ok(())
    }

    async fn get(
        &self,
        _ctx: &RequestContext,
        token_id: &TokenId,
    ) -> Result<Option<StoredToken>, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records.get(token_id).cloned())
    }

    async fn delete(
        &self,
        _ctx: &RequestContext,
        subject_id: &SubjectId,
        token_id: &TokenId,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        match records.get(token_id) {
            Some(record) if &record.subject_id != subject_id => {
                Err(StoreError::SubjectMismatch(token_id.to_string()))
            }
            Some(_) => Ok(records.remove(token_id).is_some()),
            None => Ok(false),
        }
    }

    async fn list(
        &self,
        _ctx: &RequestContext,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
    ) -> Result<Vec<StoredToken>, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        let mut out: Vec<StoredToken> = records
            .values()
            .filter(|r| &r.tenant_id == tenant_id && &r.subject_id == subject_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(out)
    }

    async fn revoke(
        &self,
        _ctx: &RequestContext,
        subject_id: &SubjectId,
        token_id: &TokenId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        let Some(record) = records.get_mut(token_id) else {
            return Ok(false);
        };
        if &record.subject_id != subject_id {
            return Err(StoreError::SubjectMismatch(token_id.to_string()));
        }
        if record.revoked_at.is_some() {
            return Ok(false);
        }
        record.revoked_at = Some(at);
        Ok(true)
    }

    async fn is_revoked(
        &self,
        _ctx: &RequestContext,
        token_id: &TokenId,
    ) -> Result<bool, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records.get(token_id).is_some_and(StoredToken::is_revoked))
    }

    async fn cleanup(&self, _ctx: &RequestContext, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok(before - records.len())
    }
}
