use thiserror::Error;

use warden_core::Cancelled;

/// Failure inside a role/permission/group/profile provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Building an identity context failed. No partial context is ever returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("claims carry no subject id")]
    MissingSubject,

    #[error("claims carry no tenant id")]
    MissingTenant,

    #[error("unknown subject type '{0}'")]
    InvalidSubjectType(String),

    #[error("subject has no app scope")]
    MissingAppScope,

    #[error("identity resolution failed in {provider} provider: {source}")]
    ResolutionFailed {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl IdentityError {
    pub(crate) fn from_provider(provider: &'static str, err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled(c) => IdentityError::Cancelled(c),
            other => IdentityError::ResolutionFailed {
                provider,
                source: other,
            },
        }
    }
}

/// Authorization infrastructure or configuration error.
///
/// A denied request is not an error; it is an `AuthorizationDecision` with
/// `allowed == false`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("authorization store unavailable: {0}")]
    Unavailable(String),
}

impl AuthzError {
    pub(crate) fn poisoned(store: &str) -> Self {
        AuthzError::Unavailable(format!("{store} lock poisoned"))
    }
}
