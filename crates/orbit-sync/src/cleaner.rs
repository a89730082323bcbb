//! # Retention Cleaner
//!
//! Periodic housekeeping for the sync queue:
//!
//! 1. **Stale reclaim** - processing items abandoned by a crashed worker
//!    (claimed, but no outcome recorded within the stale timeout) return
//!    to pending so they are retried instead of stuck forever.
//! 2. **Retention purge** - succeeded items older than the retention
//!    window are deleted in bounded batches. Pending, processing, and
//!    dead-lettered items are never purged regardless of age;
//!    dead-letter rows stay for operator inspection.
//!
//! Runs on its own interval, far slower than the dispatch loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::service::QueueService;

/// Background task that reclaims stale claims and purges old items.
pub struct RetentionCleaner {
    service: Arc<QueueService>,

    /// Interval between cleanup passes.
    interval: Duration,

    /// Age at which a processing item counts as abandoned.
    stale_timeout: chrono::Duration,

    /// Retention window for succeeded items.
    retention: chrono::Duration,

    /// Rows deleted per batch during a purge.
    batch_size: u32,

    /// Shutdown receiver.
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the retention cleaner.
#[derive(Clone)]
pub struct RetentionCleanerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl RetentionCleanerHandle {
    /// Triggers graceful shutdown; the cleaner stops between passes.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Cleaner shutdown channel closed".into()))
    }
}

impl RetentionCleaner {
    /// Creates a new retention cleaner and returns a handle.
    pub fn new(service: Arc<QueueService>, config: &SyncConfig) -> (Self, RetentionCleanerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let cleaner = RetentionCleaner {
            service,
            interval: config.cleanup_interval(),
            stale_timeout: config.stale_claim_timeout(),
            retention: config.retention_window(),
            batch_size: config.retention.cleanup_batch_size,
            shutdown_rx,
        };

        (cleaner, RetentionCleanerHandle { shutdown_tx })
    }

    /// Runs the cleanup loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_hours = self.retention.num_hours(),
            "Retention cleaner starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Cleanup pass failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Retention cleaner shutting down");
                    break;
                }
            }
        }

        info!("Retention cleaner stopped");
    }

    /// Runs a single cleanup pass.
    pub async fn run_once(&self) -> SyncResult<()> {
        let reclaimed = self.service.reclaim_stale(self.stale_timeout).await?;
        let purged = self
            .service
            .cleanup_expired(self.retention, self.batch_size)
            .await?;

        debug!(reclaimed, purged, "Cleanup pass complete");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orbit_core::{BackoffPolicy, QueueItem, QueueStatus};
    use orbit_db::{Database, DbConfig};

    async fn setup() -> (Database, Arc<QueueService>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = Arc::new(QueueService::new(db.clone(), BackoffPolicy::default()));
        (db, service)
    }

    #[tokio::test]
    async fn test_pass_reclaims_and_purges() {
        let (db, service) = setup().await;
        let repo = db.queue();
        let now = Utc::now();

        // An old succeeded item (purged) and an abandoned claim (reclaimed).
        let old = QueueItem::new("Stock", "Out", "{}", None, now - chrono::Duration::hours(48));
        repo.insert(&old).await.unwrap();
        let claimed = repo.claim_next(now).await.unwrap().unwrap();
        repo.mark_succeeded(&claimed.id, now).await.unwrap();

        let orphan = QueueItem::new("Product", "Out", "{}", None, now);
        repo.insert(&orphan).await.unwrap();
        repo.claim_next(now).await.unwrap().unwrap();

        let mut config = SyncConfig::default();
        config.worker.stale_claim_timeout_secs = 0;
        let (cleaner, _handle) = RetentionCleaner::new(service, &config);

        cleaner.run_once().await.unwrap();

        // The succeeded item is gone, the orphan is pending again.
        assert!(repo.find_by_id(&old.id).await.unwrap().is_none());
        let reclaimed = repo.find_by_id(&orphan.id).await.unwrap().unwrap();
        assert_eq!(reclaimed.status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_shutdown() {
        let (_db, service) = setup().await;
        let mut config = SyncConfig::default();
        config.retention.cleanup_interval_secs = 1;

        let (cleaner, handle) = RetentionCleaner::new(service, &config);
        let task = tokio::spawn(cleaner.run());

        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("cleaner did not stop after shutdown")
            .unwrap();
    }
}
