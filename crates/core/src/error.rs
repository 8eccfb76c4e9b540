//! Error types shared by every crate in the workspace.

use thiserror::Error;

/// A store-backed operation was interrupted before it completed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Cancelled {
    /// The caller cancelled the request.
    #[error("operation cancelled by caller")]
    ByCaller,

    /// The caller-supplied deadline passed.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

/// An identifier failed validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier {kind}: {message}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub message: String,
}

impl InvalidId {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
