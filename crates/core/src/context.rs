//! Per-request cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Caller-supplied cancellation signal and optional deadline.
///
/// In-memory operations ignore it (they finish immediately). Store-backed
/// operations run through [`RequestContext::guard`], which abandons the
/// underlying future once the request is cancelled or the deadline passes.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context driven by an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Child context: cancelled with the parent, may be cancelled alone.
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fails fast when the context is already done.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.cancellation.is_cancelled() {
            return Err(Cancelled::ByCaller);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Cancelled::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless the request is cancelled or times out first.
    ///
    /// The operation is polled before the cancellation branches, so a future
    /// that is already complete always yields its output.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T>,
    {
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            out = fut => Ok(out),
            _ = self.cancellation.cancelled() => Err(Cancelled::ByCaller),
            _ = expired => Err(Cancelled::DeadlineExceeded),
        }
    }
}
