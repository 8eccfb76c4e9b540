//! Background cleanup of expired revocation entries and opaque records.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use warden_core::{Clock, RequestContext};

use crate::manager::TokenManager;
use crate::revocation::RevocationList;
use crate::store::TokenStore;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub revocations_removed: usize,
    pub tokens_removed: usize,
    pub failures: usize,
}

/// Handle to stop a spawned cleanup worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                tracing::warn!(error = %err, "cleanup worker ended abnormally");
            }
        }
    }
}

/// Periodic sweep, independent of request handling.
pub struct CleanupWorker {
    revocations: Arc<dyn RevocationList>,
    store: Option<Arc<dyn TokenStore>>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl CleanupWorker {
    pub fn new(
        revocations: Arc<dyn RevocationList>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            revocations,
            store: None,
            clock,
            interval,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Worker sweeping everything `manager` keeps, at its configured interval.
    pub fn for_manager(manager: &TokenManager) -> Self {
        let worker = Self::new(
            Arc::clone(manager.revocations()),
            Arc::clone(manager.clock()),
            Duration::from_secs(manager.config().cleanup_interval_secs),
        );
        match manager.store() {
            Some(store) => worker.with_store(Arc::clone(store)),
            None => worker,
        }
    }

    /// Run a single sweep. Failures are logged and counted, never returned.
    pub async fn sweep_once(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        match self.revocations.cleanup(now).await {
            Ok(removed) => report.revocations_removed = removed,
            Err(err) => {
                report.failures += 1;
                tracing::warn!(error = %err, "revocation cleanup failed");
            }
        }

        if let Some(store) = &self.store {
            match store.cleanup(&RequestContext::background(), now).await {
                Ok(removed) => report.tokens_removed = removed,
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(error = %err, "token store cleanup failed");
                }
            }
        }

        if report.revocations_removed + report.tokens_removed > 0 {
            tracing::debug!(
                revocations_removed = report.revocations_removed,
                tokens_removed = report.tokens_removed,
                "cleanup sweep finished"
            );
        }
        report
    }

    /// Spawn the sweep loop on the current tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);

        let join = tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval.as_secs_f64(), "cleanup worker started");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = signal.notified() => {
                        tracing::info!("cleanup worker received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
        });

        WorkerHandle {
            shutdown,
            join: Some(join),
        }
    }
}
