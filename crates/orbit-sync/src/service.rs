//! # Queue Service
//!
//! Typed operations over the durable sync queue: enqueue, claim, outcome
//! marking, stale-claim reclaim, and retention cleanup. Owns the backoff
//! computation - repositories only store the timestamps this service
//! hands them.
//!
//! ## Single-Writer Discipline
//! Correctness of claim-next depends on one dispatch worker per store
//! calling it. Dashboards may read concurrently (the store's row-level
//! guarantees cover them), but a multi-worker deployment would need an
//! optimistic-concurrency token added to the claim.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use orbit_core::{BackoffPolicy, QueueItem, QueueStatus, RetryClass};
use orbit_db::Database;

use crate::error::SyncResult;
use crate::jitter;

/// Service facade over the sync queue.
#[derive(Debug, Clone)]
pub struct QueueService {
    db: Database,
    policy: BackoffPolicy,
}

impl QueueService {
    /// Creates a service over the given store with the given retry policy.
    pub fn new(db: Database, policy: BackoffPolicy) -> Self {
        QueueService { db, policy }
    }

    /// Returns the retry policy in use.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Creates a Pending item claimable immediately and returns its id.
    ///
    /// Channel and direction are stored as-is; validation happens at
    /// dispatch time so producers never block on a routing mistake.
    pub async fn enqueue(
        &self,
        channel: &str,
        direction: &str,
        payload: &str,
        correlation_id: Option<&str>,
    ) -> SyncResult<String> {
        let item = QueueItem::new(
            channel,
            direction,
            payload,
            correlation_id.map(str::to_string),
            Utc::now(),
        );

        self.db.queue().insert(&item).await?;

        debug!(id = %item.id, channel, direction, "Enqueued sync item");
        Ok(item.id)
    }

    /// Claims the oldest eligible Pending item, flipping it to Processing.
    pub async fn claim_next_pending(&self) -> SyncResult<Option<QueueItem>> {
        let claimed = self.db.queue().claim_next(Utc::now()).await?;
        if let Some(ref item) = claimed {
            debug!(
                id = %item.id,
                channel = %item.channel,
                retry_count = item.retry_count,
                "Claimed queue item"
            );
        }
        Ok(claimed)
    }

    /// Marks a Processing item as Succeeded (terminal).
    ///
    /// Returns false when the item was not in Processing (e.g. it was
    /// reclaimed as stale while the outcome was in flight).
    pub async fn mark_succeeded(&self, id: &str) -> SyncResult<bool> {
        let applied = self.db.queue().mark_succeeded(id, Utc::now()).await?;
        if !applied {
            warn!(id, "mark_succeeded did not apply - item not in processing");
        }
        Ok(applied)
    }

    /// Records a retryable failure.
    ///
    /// The item returns to Pending with retry_count incremented and
    /// next_attempt_at pushed out by the policy delay:
    /// the configured sequence entry for the new retry count (or
    /// `backoff_override_secs` when the remote suggested a delay),
    /// doubled for rate-limited failures, plus 0-20% jitter.
    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        class: RetryClass,
        backoff_override_secs: Option<u64>,
    ) -> SyncResult<bool> {
        let now = Utc::now();

        let item = match self.db.queue().find_by_id(id).await? {
            Some(item) => item,
            None => {
                warn!(id, "mark_failed on unknown item");
                return Ok(false);
            }
        };

        let retry_count = item.retry_count + 1;
        let delay_secs = self.policy.delay_secs(
            retry_count,
            backoff_override_secs,
            class,
            jitter::unit_fraction(),
        );
        let next_attempt_at = now + Duration::milliseconds((delay_secs * 1000.0) as i64);

        let applied = self
            .db
            .queue()
            .mark_failed(id, error, next_attempt_at, now)
            .await?;

        if applied {
            debug!(
                id,
                retry_count,
                class = %class,
                delay_secs = format!("{delay_secs:.1}"),
                "Queue item failed, scheduled for retry"
            );
        } else {
            warn!(id, "mark_failed did not apply - item not in processing");
        }
        Ok(applied)
    }

    /// Routes a Processing item to the terminal dead-letter state.
    pub async fn mark_dead_lettered(&self, id: &str, error: &str) -> SyncResult<bool> {
        let applied = self.db.queue().mark_dead_lettered(id, error, Utc::now()).await?;
        if applied {
            warn!(id, error, "Queue item dead-lettered");
        } else {
            warn!(id, "mark_dead_lettered did not apply - item not in processing");
        }
        Ok(applied)
    }

    /// Returns Processing items older than `older_than` to Pending.
    ///
    /// Covers items orphaned by a crash between claim and outcome.
    pub async fn reclaim_stale(&self, older_than: Duration) -> SyncResult<u64> {
        let now = Utc::now();
        let reclaimed = self.db.queue().reclaim_stale(now - older_than, now).await?;
        if reclaimed > 0 {
            info!(reclaimed, "Reclaimed stale processing items");
        }
        Ok(reclaimed)
    }

    /// Purges Succeeded items older than `retention`, in bounded batches.
    ///
    /// Pending, Processing, and DeadLettered items are never touched
    /// regardless of age. Returns the total number of deleted rows.
    pub async fn cleanup_expired(&self, retention: Duration, batch_size: u32) -> SyncResult<u64> {
        let cutoff = Utc::now() - retention;
        let mut total = 0u64;

        loop {
            let deleted = self
                .db
                .queue()
                .delete_succeeded_before(cutoff, batch_size)
                .await?;
            total += deleted;
            if deleted < batch_size as u64 {
                break;
            }
        }

        if total > 0 {
            info!(deleted = total, "Purged expired queue items");
        }
        Ok(total)
    }

    /// Number of items waiting to be dispatched.
    pub async fn pending_count(&self) -> SyncResult<i64> {
        Ok(self.db.queue().count_with_status(QueueStatus::Pending).await?)
    }

    /// Number of permanently failed items.
    pub async fn dead_letter_count(&self) -> SyncResult<i64> {
        Ok(self
            .db
            .queue()
            .count_with_status(QueueStatus::DeadLettered)
            .await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_db::DbConfig;

    async fn service_with(sequence: Vec<u64>) -> QueueService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        QueueService::new(db, BackoffPolicy::new(sequence).unwrap())
    }

    async fn service() -> QueueService {
        service_with(vec![30, 60, 300]).await
    }

    #[tokio::test]
    async fn test_enqueue_creates_claimable_item() {
        let svc = service().await;

        let id = svc
            .enqueue("Stock", "Out", r#"{"ProductId":42,"Quantity":5}"#, Some("corr-1"))
            .await
            .unwrap();

        let item = svc.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.status, QueueStatus::Processing);
        assert_eq!(item.correlation_id.as_deref(), Some("corr-1"));
    }

    #[tokio::test]
    async fn test_transient_failure_uses_sequence_with_jitter() {
        let svc = service().await;
        svc.enqueue("Stock", "Out", "{}", None).await.unwrap();
        let item = svc.claim_next_pending().await.unwrap().unwrap();

        let before = Utc::now();
        assert!(svc
            .mark_failed(&item.id, "connection reset", RetryClass::Transient, None)
            .await
            .unwrap());
        let after = Utc::now();

        let stored = svc.db.queue().find_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Pending);
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.last_error.as_deref(), Some("connection reset"));

        // First retry: 30s base, up to 20% jitter.
        let min = before + Duration::seconds(30);
        let max = after + Duration::seconds(36) + Duration::seconds(1);
        assert!(stored.next_attempt_at >= min, "too early: {}", stored.next_attempt_at);
        assert!(stored.next_attempt_at <= max, "too late: {}", stored.next_attempt_at);
    }

    #[tokio::test]
    async fn test_rate_limited_failure_doubles_backoff() {
        // Scenario: first dispatch attempt hits "429 Too Many Requests".
        let svc = service().await;
        svc.enqueue("Stock", "Out", r#"{"ProductId":42,"Quantity":5}"#, None)
            .await
            .unwrap();
        let item = svc.claim_next_pending().await.unwrap().unwrap();

        let before = Utc::now();
        svc.mark_failed(
            &item.id,
            "429 Too Many Requests",
            RetryClass::RateLimited,
            None,
        )
        .await
        .unwrap();
        let after = Utc::now();

        let stored = svc.db.queue().find_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.status, QueueStatus::Pending);

        // Doubled base of 60s, plus up to 20% jitter.
        let min = before + Duration::seconds(60);
        let max = after + Duration::seconds(72) + Duration::seconds(1);
        assert!(stored.next_attempt_at >= min);
        assert!(stored.next_attempt_at <= max);
    }

    #[tokio::test]
    async fn test_retry_count_indexes_into_sequence() {
        let svc = service_with(vec![10, 100]).await;
        svc.enqueue("Stock", "Out", "{}", None).await.unwrap();

        // First failure: base 10s (sequence[0]).
        let item = svc.claim_next_pending().await.unwrap().unwrap();
        svc.mark_failed(&item.id, "t1", RetryClass::Transient, None)
            .await
            .unwrap();

        // Not claimable right away, but claimable once the maximum
        // jittered delay (12s) has passed.
        assert!(svc.db.queue().claim_next(Utc::now()).await.unwrap().is_none());
        let eligible_at = Utc::now() + Duration::seconds(13);
        let again = svc.db.queue().claim_next(eligible_at).await.unwrap().unwrap();
        assert_eq!(again.id, item.id);

        // Second failure: base 100s (sequence[1]).
        let before = Utc::now();
        svc.mark_failed(&item.id, "t2", RetryClass::Transient, None)
            .await
            .unwrap();

        let stored = svc.db.queue().find_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 2);
        assert!(stored.next_attempt_at >= before + Duration::seconds(100));
        assert!(stored.next_attempt_at <= before + Duration::seconds(122));
    }

    #[tokio::test]
    async fn test_backoff_override_replaces_sequence() {
        let svc = service().await;
        svc.enqueue("Stock", "Out", "{}", None).await.unwrap();
        let item = svc.claim_next_pending().await.unwrap().unwrap();

        let before = Utc::now();
        svc.mark_failed(&item.id, "throttled", RetryClass::Transient, Some(120))
            .await
            .unwrap();
        let after = Utc::now();

        let stored = svc.db.queue().find_by_id(&item.id).await.unwrap().unwrap();
        let min = before + Duration::seconds(120);
        let max = after + Duration::seconds(144) + Duration::seconds(1);
        assert!(stored.next_attempt_at >= min);
        assert!(stored.next_attempt_at <= max);
    }

    #[tokio::test]
    async fn test_mark_succeeded_is_terminal_via_service() {
        let svc = service().await;
        svc.enqueue("Product", "Out", r#"{"ProductId":7,"Price":19.99}"#, None)
            .await
            .unwrap();
        let item = svc.claim_next_pending().await.unwrap().unwrap();

        assert!(svc.mark_succeeded(&item.id).await.unwrap());
        // Succeeded never transitions away.
        assert!(!svc
            .mark_failed(&item.id, "late failure", RetryClass::Transient, None)
            .await
            .unwrap());
        assert!(!svc.mark_dead_lettered(&item.id, "late").await.unwrap());
    }

    #[tokio::test]
    async fn test_dead_letter_counts() {
        let svc = service().await;
        svc.enqueue("Foo", "Out", "{}", None).await.unwrap();
        let item = svc.claim_next_pending().await.unwrap().unwrap();

        svc.mark_dead_lettered(&item.id, "Unsupported channel/direction: Foo/Out")
            .await
            .unwrap();

        assert_eq!(svc.dead_letter_count().await.unwrap(), 1);
        assert_eq!(svc.pending_count().await.unwrap(), 0);
        // Dead-lettered items are never claimed again.
        assert!(svc.claim_next_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_deletes_exactly_the_expired_succeeded_items() {
        // Scenario: 40 succeeded items older than the retention window
        // and 5 newer ones; cleanup deletes exactly 40.
        let svc = service().await;
        let repo = svc.db.queue();
        let now = Utc::now();

        for i in 0..45 {
            let age = if i < 40 {
                Duration::hours(30)
            } else {
                Duration::hours(1)
            };
            let item = QueueItem::new("Stock", "Out", "{}", None, now - age);
            repo.insert(&item).await.unwrap();
            let claimed = repo.claim_next(now).await.unwrap().unwrap();
            repo.mark_succeeded(&claimed.id, now).await.unwrap();
        }

        let deleted = svc
            .cleanup_expired(Duration::hours(24), 16)
            .await
            .unwrap();
        assert_eq!(deleted, 40);

        // The 5 recent items survive.
        let remaining: i64 = repo.count_with_status(QueueStatus::Succeeded).await.unwrap();
        assert_eq!(remaining, 5);
    }

    #[tokio::test]
    async fn test_reclaim_stale_through_service() {
        let svc = service().await;
        svc.enqueue("Stock", "Out", "{}", None).await.unwrap();
        let item = svc.claim_next_pending().await.unwrap().unwrap();

        // Claim is fresh: nothing to reclaim.
        assert_eq!(svc.reclaim_stale(Duration::minutes(15)).await.unwrap(), 0);

        // With a zero threshold the claim immediately counts as stale.
        assert_eq!(svc.reclaim_stale(Duration::zero()).await.unwrap(), 1);

        let stored = svc.db.queue().find_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Pending);
    }
}
