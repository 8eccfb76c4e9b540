//! `warden-tokens`: issuing, verifying, rotating and revoking tokens.
//!
//! Tokens come in two formats behind one [`TokenManager`]: self-contained
//! signed tokens (compact JWS) and opaque random identifiers resolved through
//! a [`TokenStore`]. Revocation state lives in a [`RevocationList`] swept by a
//! background [`CleanupWorker`].

pub mod config;
pub mod error;
pub mod manager;
pub mod opaque;
pub mod revocation;
pub mod signed;
pub mod store;
pub mod token;
pub mod worker;

pub use config::{SigningAlgorithm, TokenConfig, TokenFormat};
pub use error::{RevocationError, StoreError, TokenError};
pub use manager::TokenManager;
pub use revocation::{InMemoryRevocationList, RevocationList};
pub use store::{InMemoryTokenStore, StoredToken, TokenStore};
pub use token::{
    Token, TokenDetails, TokenKind, TokenPair, TokenType, VerificationFailure, VerificationResult,
};
pub use worker::{CleanupWorker, SweepReport, WorkerHandle};
