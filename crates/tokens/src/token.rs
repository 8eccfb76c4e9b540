//! Token value objects and verification outcomes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::{AppId, Claims, TenantId, TokenId};

pub use crate::config::TokenFormat as TokenType;

/// Purpose a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issued token. Never mutated; revocation and expiry retire it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Bearer value handed to the client.
    pub value: String,
    /// Identifier used by revocation and stores.
    pub id: TokenId,
    pub kind: TokenKind,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl Token {
    /// Seconds of validity left at `now` (zero once expired).
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

// The bearer value is a credential; keep it out of logs.
impl core::fmt::Debug for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("tenant_id", &self.tenant_id)
            .field("app_id", &self.app_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Access + refresh tokens produced together by a rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: Token,
    pub refresh: Token,
}

/// Facts about a verified token beyond its claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub token_id: TokenId,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Why a token failed verification.
///
/// Callers branch on these: `Expired` means refresh, `Revoked` means
/// re-authenticate, `Malformed`/`InvalidSignature` are worth flagging.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFailure {
    #[error("malformed token")]
    Malformed,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token not found")]
    NotFound,

    #[error("token expired")]
    Expired,

    #[error("token revoked")]
    Revoked,

    #[error("token missing tenant or app scope")]
    MissingScope,

    #[error("token kind not accepted here")]
    WrongKind,
}

impl VerificationFailure {
    /// Failures that suggest tampering or probing rather than normal expiry.
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            VerificationFailure::Malformed | VerificationFailure::InvalidSignature
        )
    }
}

/// Outcome of `TokenManager::verify`.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub details: Option<TokenDetails>,
    pub error: Option<VerificationFailure>,
}

impl VerificationResult {
    pub fn valid(claims: Claims, details: TokenDetails) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            details: Some(details),
            error: None,
        }
    }

    pub fn invalid(reason: VerificationFailure) -> Self {
        Self {
            valid: false,
            claims: None,
            details: None,
            error: Some(reason),
        }
    }

    pub fn kind(&self) -> Option<TokenKind> {
        self.details.as_ref().map(|d| d.kind)
    }

    /// Split into claims + details, or the failure reason.
    pub fn into_result(self) -> Result<(Claims, TokenDetails), VerificationFailure> {
        match (self.valid, self.claims, self.details) {
            (true, Some(claims), Some(details)) => Ok((claims, details)),
            _ => Err(self.error.unwrap_or(VerificationFailure::Malformed)),
        }
    }
}
