use thiserror::Error;

use warden_core::Cancelled;

use crate::token::VerificationFailure;

/// Revocation backend failure (infrastructure, never "token is revoked").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevocationError {
    #[error("revocation store unavailable: {0}")]
    Unavailable(String),
}

/// Token store backend failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),

    #[error("token {0} belongs to another subject")]
    SubjectMismatch(String),
}

/// Errors returned by the token manager.
///
/// Verification outcomes (expired, revoked, malformed...) are *not* errors;
/// they come back inside a `VerificationResult`. `Rejected` is only used by
/// operations that cannot proceed on an invalid token (`refresh`, `revoke`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    #[error("token rejected: {0}")]
    Rejected(VerificationFailure),

    #[error("revocation unavailable: {0}")]
    RevocationUnavailable(String),

    #[error("token store error: {0}")]
    Store(#[from] StoreError),

    #[error("token encoding failed: {0}")]
    Encoding(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation not supported for {0} tokens")]
    Unsupported(&'static str),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<RevocationError> for TokenError {
    fn from(value: RevocationError) -> Self {
        match value {
            RevocationError::Unavailable(msg) => TokenError::RevocationUnavailable(msg),
        }
    }
}

impl TokenError {
    /// The verification failure behind a rejection, if any.
    pub fn rejection(&self) -> Option<VerificationFailure> {
        match self {
            TokenError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}
