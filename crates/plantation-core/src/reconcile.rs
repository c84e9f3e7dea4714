//! Background reconciliation of resident farms with the durable store.
//!
//! [`Reconciler::spawn`] starts a task that flushes every changed resident
//! owner once per `save_interval`. The returned [`ReconcilerHandle`] ends
//! sessions (save then evict) and performs the final flush on shutdown,
//! where each owner's save is bounded by `shutdown_timeout`.
//!
//! Growth is lazy, so nothing here advances farms; it only writes them.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};

use plantation_db::FarmRepository;
use plantation_types::OwnerId;

use crate::error::StoreError;
use crate::store::PlantationStore;

/// Timing of the reconciliation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Interval between periodic flushes.
    pub save_interval: Duration,
    /// Upper bound on each owner's save during the shutdown flush.
    pub shutdown_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            save_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of one flush over the resident owners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Owners whose save completed.
    pub saved: usize,
    /// Owners whose save returned an error.
    pub failed: usize,
    /// Owners whose save did not finish within the bound.
    pub timed_out: usize,
}

/// Spawner of the reconciliation task.
pub struct Reconciler;

impl Reconciler {
    /// Start the periodic flush on the current tokio runtime.
    pub fn spawn<R: FarmRepository>(
        store: Arc<PlantationStore<R>>,
        config: ReconcilerConfig,
    ) -> ReconcilerHandle<R> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run(Arc::clone(&store), config.save_interval, stop_rx));
        tracing::info!(
            save_interval_secs = config.save_interval.as_secs(),
            shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
            "Reconciler started"
        );
        ReconcilerHandle {
            store,
            config,
            stop: Some(stop_tx),
            task,
        }
    }
}

async fn run<R: FarmRepository>(
    store: Arc<PlantationStore<R>>,
    save_interval: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(save_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // The final flush rewrites whatever an interrupted flush left unsaved.
                tokio::select! {
                    report = flush_changed(&store) => {
                        if report.saved > 0 || report.failed > 0 {
                            tracing::debug!(
                                saved = report.saved,
                                failed = report.failed,
                                "Periodic flush complete"
                            );
                        }
                    }
                    _ = &mut stop => {
                        tracing::debug!("Periodic flush interrupted by shutdown");
                        break;
                    }
                }
            }
            _ = &mut stop => break,
        }
    }
    tracing::info!("Reconciler loop stopped");
}

/// Save every resident owner with unsaved changes, one after another.
pub async fn flush_changed<R: FarmRepository>(store: &PlantationStore<R>) -> FlushReport {
    let mut report = FlushReport::default();
    for owner in store.resident_owners() {
        if !store.is_dirty(owner) {
            continue;
        }
        match store.save_if_dirty(owner).await {
            Ok(_) => report.saved = report.saved.saturating_add(1),
            Err(e) => {
                tracing::warn!(owner = %owner, error = %e, "Periodic save failed");
                report.failed = report.failed.saturating_add(1);
            }
        }
    }
    report
}

/// Control handle of a running reconciler.
pub struct ReconcilerHandle<R> {
    store: Arc<PlantationStore<R>>,
    config: ReconcilerConfig,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl<R: FarmRepository> ReconcilerHandle<R> {
    /// Save `owner` and evict them from memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistenceUnavailable`] if the save fails; the
    /// owner stays resident and is retried by the periodic flush.
    pub async fn session_ended(&self, owner: OwnerId) -> Result<(), StoreError> {
        self.store.unload(owner).await
    }

    /// Stop the periodic loop and flush every resident owner.
    ///
    /// Each owner's save is bounded by `shutdown_timeout`; saves that run
    /// over are logged and abandoned.
    pub async fn shutdown(mut self) -> FlushReport {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let bound = self.config.shutdown_timeout;
        match timeout(bound, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Reconciler task ended abnormally"),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = bound.as_millis(),
                    "Reconciler loop did not stop in time, aborted"
                );
                self.task.abort();
            }
        }

        let owners = self.store.resident_owners();
        let store = &self.store;
        let results = join_all(owners.iter().map(|&owner| async move {
            (owner, timeout(bound, store.save_farms(owner)).await)
        }))
        .await;

        let mut report = FlushReport::default();
        for (owner, result) in results {
            match result {
                Ok(Ok(_)) => report.saved = report.saved.saturating_add(1),
                Ok(Err(e)) => {
                    tracing::warn!(owner = %owner, error = %e, "Final save failed");
                    report.failed = report.failed.saturating_add(1);
                }
                Err(_) => {
                    tracing::warn!(
                        owner = %owner,
                        timeout_ms = bound.as_millis(),
                        "Final save timed out, changes dropped"
                    );
                    report.timed_out = report.timed_out.saturating_add(1);
                }
            }
        }
        tracing::info!(
            saved = report.saved,
            failed = report.failed,
            timed_out = report.timed_out,
            "Final flush complete"
        );
        report
    }
}
