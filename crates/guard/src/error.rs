use thiserror::Error;

use warden_auth::{AuthzError, IdentityError};
use warden_tokens::TokenError;

/// Infrastructure fault while guarding a request.
///
/// Denials are not errors; they come back as `GuardOutcome::Denied`. Callers
/// must still refuse the request on `Err`.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Tokens(#[from] TokenError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Authorization(#[from] AuthzError),
}
