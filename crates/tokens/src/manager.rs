//! Token lifecycle: generate, verify, rotate, revoke.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use warden_core::{Claims, Clock, RequestContext, SubjectId, SystemClock, TenantId, TokenId};

use crate::config::{TokenConfig, TokenFormat};
use crate::error::{RevocationError, TokenError};
use crate::opaque;
use crate::revocation::RevocationList;
use crate::signed::SignedCodec;
use crate::store::{InMemoryTokenStore, StoredToken, TokenStore};
use crate::token::{
    Token, TokenDetails, TokenKind, TokenPair, TokenType, VerificationFailure, VerificationResult,
};

enum Backend {
    Signed(SignedCodec),
    Opaque(Arc<dyn TokenStore>),
}

/// Issues and checks tokens of one format.
///
/// Verification checks, in order: structure, signature (or store lookup),
/// expiry, revocation, tenant/app scope. The first failure is reported.
pub struct TokenManager {
    config: TokenConfig,
    backend: Backend,
    revocations: Arc<dyn RevocationList>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenManager")
            .field("format", &self.config.format)
            .field("issuer", &self.config.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Manager for `config.format`. Opaque tokens get an in-memory store.
    pub fn new(config: TokenConfig, revocations: Arc<dyn RevocationList>) -> Result<Self, TokenError> {
        config.validate()?;
        let backend = match config.format {
            TokenFormat::Signed => Backend::Signed(SignedCodec::new(&config)?),
            TokenFormat::Opaque => Backend::Opaque(Arc::new(InMemoryTokenStore::new())),
        };
        Ok(Self {
            config,
            backend,
            revocations,
            clock: Arc::new(SystemClock),
        })
    }

    /// Opaque-token manager over an explicit store.
    pub fn with_store(
        config: TokenConfig,
        store: Arc<dyn TokenStore>,
        revocations: Arc<dyn RevocationList>,
    ) -> Result<Self, TokenError> {
        if config.format != TokenFormat::Opaque {
            return Err(TokenError::Config(
                "a token store requires the opaque format".to_string(),
            ));
        }
        config.validate()?;
        Ok(Self {
            config,
            backend: Backend::Opaque(store),
            revocations,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn token_type(&self) -> TokenType {
        self.config.format
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationList> {
        &self.revocations
    }

    /// The opaque token store, if this manager has one.
    pub fn store(&self) -> Option<&Arc<dyn TokenStore>> {
        match &self.backend {
            Backend::Opaque(store) => Some(store),
            Backend::Signed(_) => None,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue an access token for `claims`.
    pub async fn generate(&self, ctx: &RequestContext, claims: &Claims) -> Result<Token, TokenError> {
        validate_claims(claims)?;
        self.issue(ctx, claims, TokenKind::Access).await
    }

    /// Issue a refresh token for `claims`.
    pub async fn generate_refresh_token(
        &self,
        ctx: &RequestContext,
        claims: &Claims,
    ) -> Result<Token, TokenError> {
        validate_claims(claims)?;
        self.issue(ctx, claims, TokenKind::Refresh).await
    }

    /// Check a bearer value.
    ///
    /// Invalid tokens come back as `Ok` with `valid == false`; `Err` means the
    /// store or revocation backend could not answer.
    pub async fn verify(
        &self,
        ctx: &RequestContext,
        value: &str,
    ) -> Result<VerificationResult, TokenError> {
        let (claims, details, revoked_in_store) = match &self.backend {
            Backend::Signed(codec) => match codec.decode(value) {
                Ok(decoded) => (decoded.claims, decoded.details, false),
                Err(reason) => return Ok(self.reject(reason, None)),
            },
            Backend::Opaque(store) => {
                if !opaque::is_well_formed(value) {
                    return Ok(self.reject(VerificationFailure::Malformed, None));
                }
                let id = opaque::token_id(value);
                let Some(record) = ctx.guard(store.get(ctx, &id)).await?? else {
                    return Ok(self.reject(VerificationFailure::NotFound, Some(&id)));
                };
                let revoked = record.is_revoked();
                let details = TokenDetails {
                    token_id: record.token_id,
                    kind: record.kind,
                    issued_at: record.issued_at,
                    expires_at: record.expires_at,
                };
                (record.claims, details, revoked)
            }
        };

        if self.clock.now() >= details.expires_at {
            return Ok(self.reject(VerificationFailure::Expired, Some(&details.token_id)));
        }

        let revoked = revoked_in_store
            || ctx
                .guard(self.revocations.is_revoked(&details.token_id))
                .await??;
        if revoked {
            return Ok(self.reject(VerificationFailure::Revoked, Some(&details.token_id)));
        }

        if !claims.has_scope() {
            return Ok(self.reject(VerificationFailure::MissingScope, Some(&details.token_id)));
        }

        Ok(VerificationResult::valid(claims, details))
    }

    /// Exchange a refresh token for a new access + refresh pair.
    ///
    /// The presented token is single-use: it is revoked before the new pair
    /// is returned. If two rotations of the same token race, only one wins;
    /// the other gets `Rejected(Revoked)`.
    pub async fn refresh(&self, ctx: &RequestContext, value: &str) -> Result<TokenPair, TokenError> {
        let (claims, details) = self
            .verify(ctx, value)
            .await?
            .into_result()
            .map_err(TokenError::Rejected)?;
        if details.kind != TokenKind::Refresh {
            tracing::warn!(token_id = %details.token_id, kind = %details.kind, "refresh attempted with non-refresh token");
            return Err(TokenError::Rejected(VerificationFailure::WrongKind));
        }

        let access = self.issue(ctx, &claims, TokenKind::Access).await?;
        let refresh = match self.issue(ctx, &claims, TokenKind::Refresh).await {
            Ok(token) => token,
            Err(err) => {
                self.discard(&claims, &[&access]).await;
                return Err(err);
            }
        };

        match self.retire_rotated(&details).await {
            Ok(true) => {
                self.mark_stored_revoked(&claims, &details.token_id).await;
                tracing::info!(
                    old_token_id = %details.token_id,
                    access_token_id = %access.id,
                    refresh_token_id = %refresh.id,
                    "refresh token rotated"
                );
            }
            Ok(false) => {
                // Another rotation of the same token got there first.
                tracing::warn!(token_id = %details.token_id, "refresh token reused during rotation");
                self.discard(&claims, &[&access, &refresh]).await;
                return Err(TokenError::Rejected(VerificationFailure::Revoked));
            }
            Err(err) => {
                tracing::error!(
                    token_id = %details.token_id,
                    error = %err,
                    "failed to revoke rotated refresh token; it remains usable until it expires"
                );
            }
        }

        Ok(TokenPair { access, refresh })
    }

    /// Revoke a token until its natural expiry. Idempotent.
    ///
    /// Values that fail to decode (or, for opaque tokens, fail the structural
    /// check) are rejected; expired and unknown tokens are accepted silently.
    pub async fn revoke(&self, ctx: &RequestContext, value: &str) -> Result<(), TokenError> {
        let now = self.clock.now();
        match &self.backend {
            Backend::Signed(codec) => {
                let decoded = codec.decode(value).map_err(TokenError::Rejected)?;
                let details = decoded.details;
                if now >= details.expires_at {
                    tracing::debug!(token_id = %details.token_id, "revoke skipped: token already expired");
                    return Ok(());
                }
                self.add_revocation(ctx, &details.token_id, details.expires_at)
                    .await
            }
            Backend::Opaque(store) => {
                if !opaque::is_well_formed(value) {
                    return Err(TokenError::Rejected(VerificationFailure::Malformed));
                }
                let id = opaque::token_id(value);
                let Some(record) = ctx.guard(store.get(ctx, &id)).await?? else {
                    tracing::debug!(token_id = %id, "revoke skipped: token not found");
                    return Ok(());
                };
                if record.is_expired(now) {
                    tracing::debug!(token_id = %id, "revoke skipped: token already expired");
                    return Ok(());
                }
                self.add_revocation(ctx, &id, record.expires_at).await?;
                ctx.guard(store.revoke(ctx, &record.subject_id, &id, now))
                    .await??;
                Ok(())
            }
        }
    }

    /// Revoke every live opaque token of a subject. Returns how many were
    /// newly revoked.
    pub async fn revoke_all(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
    ) -> Result<usize, TokenError> {
        let store = self.require_store()?;
        let now = self.clock.now();
        let records = ctx.guard(store.list(ctx, tenant_id, subject_id)).await??;

        let mut revoked = 0;
        for record in records
            .iter()
            .filter(|r| !r.is_revoked() && !r.is_expired(now))
        {
            let newly = ctx
                .guard(self.revocations.add(&record.token_id, record.expires_at))
                .await??;
            ctx.guard(store.revoke(ctx, subject_id, &record.token_id, now))
                .await??;
            if newly {
                revoked += 1;
            }
        }

        tracing::info!(tenant_id = %tenant_id, subject_id = %subject_id, revoked, "revoked all tokens for subject");
        Ok(revoked)
    }

    /// Opaque token records of a subject, oldest first.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
    ) -> Result<Vec<StoredToken>, TokenError> {
        let store = self.require_store()?;
        Ok(ctx.guard(store.list(ctx, tenant_id, subject_id)).await??)
    }

    async fn issue(
        &self,
        ctx: &RequestContext,
        claims: &Claims,
        kind: TokenKind,
    ) -> Result<Token, TokenError> {
        let issued_at = self.clock.now().trunc_subsecs(0);
        let expires_at = issued_at + Duration::seconds(self.ttl_secs(kind));
        let (Some(tenant_id), Some(app_id), Some(subject_id)) =
            (claims.tenant_id(), claims.app_id(), claims.subject_id())
        else {
            return Err(TokenError::InvalidClaims(
                "subject_id, tenant_id and app_id are required".to_string(),
            ));
        };

        let (value, id) = match &self.backend {
            Backend::Signed(codec) => {
                let id = TokenId::new(Uuid::now_v7().to_string());
                let value = codec.encode(claims, &id, kind, issued_at, expires_at)?;
                (value, id)
            }
            Backend::Opaque(store) => {
                let value = opaque::generate_value();
                let id = opaque::token_id(&value);
                let record = StoredToken {
                    token_id: id.clone(),
                    kind,
                    subject_id: subject_id.clone(),
                    tenant_id: tenant_id.clone(),
                    app_id: app_id.clone(),
                    claims: claims.clone(),
                    issued_at,
                    expires_at,
                    revoked_at: None,
                };
                ctx.guard(store.store(ctx, record)).await??;
                (value, id)
            }
        };

        tracing::info!(
            token_id = %id,
            kind = %kind,
            tenant_id = %tenant_id,
            app_id = %app_id,
            subject_id = %subject_id,
            "token issued"
        );

        let mut metadata = BTreeMap::new();
        metadata.insert("subject_id".to_string(), subject_id.to_string());
        metadata.insert("format".to_string(), format_name(self.config.format).to_string());

        Ok(Token {
            value,
            id,
            kind,
            tenant_id,
            app_id,
            issued_at,
            expires_at,
            metadata,
        })
    }

    fn ttl_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.config.access_ttl_secs,
            TokenKind::Refresh => self.config.refresh_ttl_secs,
        }
    }

    fn reject(&self, reason: VerificationFailure, id: Option<&TokenId>) -> VerificationResult {
        let token_id = id.map(TokenId::as_str).unwrap_or("-");
        if reason.is_suspicious() {
            tracing::warn!(token_id, reason = %reason, "token verification failed");
        } else {
            tracing::debug!(token_id, reason = %reason, "token verification failed");
        }
        VerificationResult::invalid(reason)
    }

    async fn add_revocation(
        &self,
        ctx: &RequestContext,
        id: &TokenId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        let newly = ctx.guard(self.revocations.add(id, expires_at)).await??;
        if newly {
            tracing::info!(token_id = %id, expires_at = %expires_at, "token revoked");
        } else {
            tracing::debug!(token_id = %id, "token already revoked");
        }
        Ok(())
    }

    // Not bound to the request context: once the new pair exists the old
    // refresh token has to be retired even if the caller goes away.
    async fn retire_rotated(&self, details: &TokenDetails) -> Result<bool, RevocationError> {
        let attempts = self.config.revoke_retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.revocations.add(&details.token_id, details.expires_at).await {
                Ok(newly) => return Ok(newly),
                Err(err) => {
                    tracing::warn!(token_id = %details.token_id, attempt, error = %err, "revoking rotated refresh token failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| RevocationError::Unavailable("no attempt made".to_string())))
    }

    async fn mark_stored_revoked(&self, claims: &Claims, id: &TokenId) {
        let (Backend::Opaque(store), Some(subject_id)) = (&self.backend, claims.subject_id()) else {
            return;
        };
        let ctx = RequestContext::background();
        if let Err(err) = store.revoke(&ctx, &subject_id, id, self.clock.now()).await {
            tracing::warn!(token_id = %id, error = %err, "failed to mark rotated token revoked in store");
        }
    }

    async fn discard(&self, claims: &Claims, tokens: &[&Token]) {
        let (Backend::Opaque(store), Some(subject_id)) = (&self.backend, claims.subject_id()) else {
            return;
        };
        let ctx = RequestContext::background();
        for token in tokens {
            if let Err(err) = store.delete(&ctx, &subject_id, &token.id).await {
                tracing::warn!(token_id = %token.id, error = %err, "failed to discard unused token");
            }
        }
    }

    fn require_store(&self) -> Result<&Arc<dyn TokenStore>, TokenError> {
        match &self.backend {
            Backend::Opaque(store) => Ok(store),
            Backend::Signed(_) => Err(TokenError::Unsupported("signed")),
        }
    }
}

fn format_name(format: TokenFormat) -> &'static str {
    match format {
        TokenFormat::Signed => "signed",
        TokenFormat::Opaque => "opaque",
    }
}

fn validate_claims(claims: &Claims) -> Result<(), TokenError> {
    if claims.subject_id().is_none() {
        return Err(TokenError::InvalidClaims("subject_id is required".to_string()));
    }
    if !claims.has_scope() {
        return Err(TokenError::InvalidClaims("tenant_id and app_id are required".to_string()));
    }
    let reserved = claims.reserved_keys();
    if !reserved.is_empty() {
        return Err(TokenError::InvalidClaims(format!(
            "reserved claim keys: {}",
            reserved.join(", ")
        )));
    }
    let nested = claims.non_scalar_keys();
    if !nested.is_empty() {
        return Err(TokenError::InvalidClaims(format!(
            "claims must be scalars or arrays of scalars: {}",
            nested.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warden_core::ManualClock;

    use super::*;
    use crate::revocation::InMemoryRevocationList;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn signed(clock: Arc<ManualClock>) -> TokenManager {
        TokenManager::new(
            TokenConfig::signed(SECRET),
            Arc::new(InMemoryRevocationList::new()),
        )
        .unwrap()
        .with_clock(clock)
    }

    fn opaque(clock: Arc<ManualClock>) -> TokenManager {
        TokenManager::new(TokenConfig::opaque(), Arc::new(InMemoryRevocationList::new()))
            .unwrap()
            .with_clock(clock)
    }

    fn alice() -> Claims {
        Claims::for_subject("alice", "acme", "portal")
    }

    #[tokio::test]
    async fn generate_requires_scope_and_rejects_reserved_keys() {
        let ctx = RequestContext::background();
        let manager = signed(Arc::new(ManualClock::starting_now()));

        let no_app = Claims::new().with("subject_id", "alice").with("tenant_id", "acme");
        assert!(matches!(
            manager.generate(&ctx, &no_app).await,
            Err(TokenError::InvalidClaims(_))
        ));
        assert!(matches!(
            manager.generate(&ctx, &alice().with("exp", 1)).await,
            Err(TokenError::InvalidClaims(_))
        ));
        assert!(matches!(
            manager.generate(&ctx, &alice().with("nested", json!({"a": 1}))).await,
            Err(TokenError::InvalidClaims(_))
        ));
    }

    #[tokio::test]
    async fn access_token_rejected_by_refresh() {
        let ctx = RequestContext::background();
        let manager = signed(Arc::new(ManualClock::starting_now()));
        let access = manager.generate(&ctx, &alice()).await.unwrap();

        let err = manager.refresh(&ctx, &access.value).await.unwrap_err();
        assert_eq!(err.rejection(), Some(VerificationFailure::WrongKind));
    }

    #[tokio::test]
    async fn signed_revoke_of_garbage_is_rejected() {
        let ctx = RequestContext::background();
        let manager = signed(Arc::new(ManualClock::starting_now()));
        let err = manager.revoke(&ctx, "garbage").await.unwrap_err();
        assert_eq!(err.rejection(), Some(VerificationFailure::Malformed));
    }

    #[tokio::test]
    async fn revoking_expired_token_is_a_no_op() {
        let ctx = RequestContext::background();
        let clock = Arc::new(ManualClock::starting_now());
        let manager = signed(clock.clone());
        let token = manager.generate(&ctx, &alice()).await.unwrap();

        clock.advance(Duration::minutes(20));
        manager.revoke(&ctx, &token.value).await.unwrap();
        assert_eq!(manager.revocations().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn opaque_round_trip_and_unknown_value() {
        let ctx = RequestContext::background();
        let manager = opaque(Arc::new(ManualClock::starting_now()));
        let token = manager.generate(&ctx, &alice().with("email", "alice@acme.test")).await.unwrap();

        assert_eq!(token.value.len(), opaque::OPAQUE_TOKEN_LEN);
        let result = manager.verify(&ctx, &token.value).await.unwrap();
        assert!(result.valid);
        assert_eq!(result.claims.unwrap().get_str("email"), Some("alice@acme.test"));

        let unknown = "x".repeat(opaque::OPAQUE_TOKEN_LEN);
        let result = manager.verify(&ctx, &unknown).await.unwrap();
        assert_eq!(result.error, Some(VerificationFailure::NotFound));

        let result = manager.verify(&ctx, "short").await.unwrap();
        assert_eq!(result.error, Some(VerificationFailure::Malformed));
    }

    #[tokio::test]
    async fn opaque_revoke_all_logs_out_everywhere() {
        let ctx = RequestContext::background();
        let manager = opaque(Arc::new(ManualClock::starting_now()));
        let a = manager.generate(&ctx, &alice()).await.unwrap();
        let b = manager.generate_refresh_token(&ctx, &alice()).await.unwrap();

        let revoked = manager
            .revoke_all(&ctx, &TenantId::new("acme"), &SubjectId::new("alice"))
            .await
            .unwrap();
        assert_eq!(revoked, 2);

        for value in [&a.value, &b.value] {
            let result = manager.verify(&ctx, value).await.unwrap();
            assert_eq!(result.error, Some(VerificationFailure::Revoked));
        }
        let records = manager
            .list(&ctx, &TenantId::new("acme"), &SubjectId::new("alice"))
            .await
            .unwrap();
        assert!(records.iter().all(StoredToken::is_revoked));
    }

    #[tokio::test]
    async fn signed_manager_has_no_listing() {
        let ctx = RequestContext::background();
        let manager = signed(Arc::new(ManualClock::starting_now()));
        let err = manager
            .list(&ctx, &TenantId::new("acme"), &SubjectId::new("alice"))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::Unsupported("signed"));
    }

    #[tokio::test]
    async fn cancelled_context_aborts_pending_store_call() {
        use async_trait::async_trait;
        use crate::error::StoreError;

        struct Hanging;

        #[async_trait]
        impl TokenStore for Hanging {
            async fn store(&self, _: &RequestContext, _: StoredToken) -> Result<(), StoreError> {
                std::future::pending().await
            }
            async fn get(&self, _: &RequestContext, _: &TokenId) -> Result<Option<StoredToken>, StoreError> {
                std::future::pending().await
            }
            async fn delete(&self, _: &RequestContext, _: &SubjectId, _: &TokenId) -> Result<bool, StoreError> {
                Ok(false)
            }
            async fn list(&self, _: &RequestContext, _: &TenantId, _: &SubjectId) -> Result<Vec<StoredToken>, StoreError> {
                Ok(Vec::new())
            }
            async fn revoke(&self, _: &RequestContext, _: &SubjectId, _: &TokenId, _: DateTime<Utc>) -> Result<bool, StoreError> {
                Ok(false)
            }
            async fn is_revoked(&self, _: &RequestContext, _: &TokenId) -> Result<bool, StoreError> {
                Ok(false)
            }
            async fn cleanup(&self, _: &RequestContext, _: DateTime<Utc>) -> Result<usize, StoreError> {
                Ok(0)
            }
        }

        let manager = TokenManager::with_store(
            TokenConfig::opaque(),
            Arc::new(Hanging),
            Arc::new(InMemoryRevocationList::new()),
        )
        .unwrap();

        let ctx = RequestContext::background().with_timeout(std::time::Duration::from_millis(10));
        let err = manager.verify(&ctx, &"a".repeat(opaque::OPAQUE_TOKEN_LEN)).await.unwrap_err();
        assert_eq!(err, TokenError::Cancelled(warden_core::Cancelled::DeadlineExceeded));
    }

    /// Revocation backend that can be switched off per operation.
    #[derive(Default)]
    struct Unreliable {
        fail_add: bool,
        fail_lookup: bool,
        adds: std::sync::atomic::AtomicU32,
    }

    #[async_trait::async_trait]
    impl RevocationList for Unreliable {
        async fn add(&self, _: &TokenId, _: DateTime<Utc>) -> Result<bool, RevocationError> {
            self.adds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fail_add {
                return Err(RevocationError::Unavailable("revocation store offline".to_string()));
            }
            Ok(true)
        }
        async fn is_revoked(&self, _: &TokenId) -> Result<bool, RevocationError> {
            if self.fail_lookup {
                return Err(RevocationError::Unavailable("revocation store offline".to_string()));
            }
            Ok(false)
        }
        async fn remove(&self, _: &TokenId) -> Result<bool, RevocationError> {
            Ok(false)
        }
        async fn cleanup(&self, _: DateTime<Utc>) -> Result<usize, RevocationError> {
            Ok(0)
        }
        async fn len(&self) -> Result<usize, RevocationError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn rotation_still_issues_when_revoke_keeps_failing() {
        let ctx = RequestContext::background();
        let revocations = Arc::new(Unreliable {
            fail_add: true,
            ..Default::default()
        });
        let manager = TokenManager::new(TokenConfig::signed(SECRET), revocations.clone())
            .unwrap()
            .with_clock(Arc::new(ManualClock::starting_now()));

        let rt1 = manager.generate_refresh_token(&ctx, &alice()).await.unwrap();
        let pair = manager.refresh(&ctx, &rt1.value).await.unwrap();

        assert_eq!(pair.access.kind, TokenKind::Access);
        assert_eq!(pair.refresh.kind, TokenKind::Refresh);
        assert_eq!(
            revocations.adds.load(std::sync::atomic::Ordering::SeqCst),
            manager.config().revoke_retry_attempts
        );
        assert!(manager.verify(&ctx, &pair.access.value).await.unwrap().valid);
    }

    #[tokio::test]
    async fn verify_reports_unreachable_revocation_backend() {
        let ctx = RequestContext::background();
        let manager = TokenManager::new(
            TokenConfig::signed(SECRET),
            Arc::new(Unreliable {
                fail_lookup: true,
                ..Default::default()
            }),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::starting_now()));

        let token = manager.generate(&ctx, &alice()).await.unwrap();
        let err = manager.verify(&ctx, &token.value).await.unwrap_err();
        assert!(matches!(err, TokenError::RevocationUnavailable(_)));
    }
}
