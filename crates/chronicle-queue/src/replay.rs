//! Periodic drain of the update queue into the mirror store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chronicle_db::{MirrorStore, dispatch};
use chronicle_types::Update;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{QueueResult, UpdateQueue};

/// Replay loop configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Time between drain cycles. The first cycle runs immediately.
    pub interval: Duration,
    /// Upper bound on a single store operation.
    pub apply_timeout: Duration,
    /// Failed attempts after which an entry is reported as stalled.
    pub stall_warn_attempts: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            apply_timeout: Duration::from_secs(30),
            stall_warn_attempts: 24,
        }
    }
}

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub applied: usize,
    pub failed: usize,
    /// Queue length when the cycle finished, including updates appended
    /// while it ran.
    pub remaining: usize,
}

/// Sole consumer of the update queue.
pub struct Replayer {
    queue: Arc<UpdateQueue>,
    store: Arc<dyn MirrorStore>,
    config: ReplayConfig,
    /// Held for the duration of a drain cycle.
    cycle: Mutex<()>,
}

impl Replayer {
    pub fn new(queue: Arc<UpdateQueue>, store: Arc<dyn MirrorStore>, config: ReplayConfig) -> Self {
        Self {
            queue,
            store,
            config,
            cycle: Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &Arc<UpdateQueue> {
        &self.queue
    }

    /// Run one drain cycle unless another is already in progress, in which
    /// case this returns `None` without touching the queue.
    pub async fn try_drain(&self) -> Option<QueueResult<DrainReport>> {
        let _guard = self.cycle.try_lock().ok()?;
        Some(self.drain_cycle().await)
    }

    /// Drive drain cycles on the configured interval until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.config.interval.as_secs(), "Replay loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Replay loop stopping");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.try_drain().await {
                None => warn!("Drain cycle already running, skipping this trigger"),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "Drain cycle aborted, will retry on next trigger");
                }
            }
        }
    }

    async fn drain_cycle(&self) -> QueueResult<DrainReport> {
        self.queue.reload().await?;

        let pending = self.queue.snapshot_pending().await;
        if pending.is_empty() {
            info!("No updates to replay");
            return Ok(DrainReport::default());
        }

        info!(pending = pending.len(), "Replaying queued updates");
        let mut report = DrainReport::default();

        for entry in pending {
            let kind = entry.update.kind();
            let key = entry.update.key();

            match self.apply(entry.update).await {
                Ok(()) => {
                    self.queue.remove(entry.id).await?;
                    report.applied += 1;
                    debug!(update_id = %entry.id, kind = %kind, key = %key, "Applied update");
                }
                Err(e) => {
                    report.failed += 1;
                    let attempts = self
                        .queue
                        .record_failure(entry.id, &format!("{:#}", e))
                        .await?
                        .unwrap_or(entry.attempts + 1);

                    if attempts >= self.config.stall_warn_attempts {
                        error!(
                            update_id = %entry.id,
                            kind = %kind,
                            key = %key,
                            attempts,
                            error = %format!("{:#}", e),
                            "Update keeps failing, left in queue"
                        );
                    } else {
                        warn!(
                            update_id = %entry.id,
                            kind = %kind,
                            key = %key,
                            attempts,
                            error = %format!("{:#}", e),
                            "Update failed, left in queue for next cycle"
                        );
                    }
                }
            }
        }

        report.remaining = self.queue.len().await;
        info!(
            applied = report.applied,
            failed = report.failed,
            remaining = report.remaining,
            "Drain cycle finished"
        );

        Ok(report)
    }

    /// Apply one update on the blocking pool, bounded by `apply_timeout`. A
    /// timed-out operation may still finish later; that is harmless because
    /// the entry stays queued and every store operation is idempotent.
    async fn apply(&self, update: Update) -> anyhow::Result<()> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || dispatch::apply(store.as_ref(), &update));

        match tokio::time::timeout(self.config.apply_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(anyhow!("Apply task failed: {}", join_err)),
            Err(_) => Err(anyhow!(
                "Apply timed out after {}ms",
                self.config.apply_timeout.as_millis()
            )),
        }
    }
}
