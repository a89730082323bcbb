//! # Sync Queue Repository
//!
//! Persistence for the offline-durable synchronization queue.
//!
//! ## The Queue Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Durable Queue Implementation                         │
//! │                                                                         │
//! │  LOCAL OPERATION (e.g., stock adjustment screen)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO sync_queue (channel, direction, payload, ...)             │
//! │  status = 'pending', next_attempt_at = now                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            BACKGROUND DISPATCH WORKER (async)                   │   │
//! │  │                                                                 │   │
//! │  │  1. claim_next: atomically flip the oldest eligible pending    │   │
//! │  │     row to 'processing' and return it                          │   │
//! │  │  2. Send to the remote catalog                                 │   │
//! │  │  3. On success:  status = 'succeeded'                          │   │
//! │  │     On failure:  status = 'pending', retry_count += 1,         │   │
//! │  │                  next_attempt_at pushed out by backoff         │   │
//! │  │     On permanent failure: status = 'dead_lettered'             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • A local change is never lost (it's in the local DB)                 │
//! │  • Offline? No problem - entries queue up                              │
//! │  • Back online? Worker drains pending entries oldest-first             │
//! │  • Terminal rows never transition again (enforced in SQL)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status filters in every UPDATE enforce the state machine at the
//! storage layer: a mark against a row in the wrong state affects zero
//! rows and is reported back to the caller as `false`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use orbit_core::{QueueItem, QueueStatus};

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw row shape of the sync_queue table.
///
/// Status is decoded from TEXT separately so a corrupt value surfaces as
/// a typed error instead of a silent default.
#[derive(Debug, Clone, FromRow)]
struct QueueItemRow {
    id: String,
    channel: String,
    direction: String,
    payload: String,
    status: String,
    retry_count: i64,
    next_attempt_at: DateTime<Utc>,
    last_error: Option<String>,
    correlation_id: Option<String>,
    created_date: DateTime<Utc>,
    modified_date: DateTime<Utc>,
}

impl TryFrom<QueueItemRow> for QueueItem {
    type Error = DbError;

    fn try_from(row: QueueItemRow) -> Result<Self, Self::Error> {
        let status: QueueStatus = row
            .status
            .parse()
            .map_err(|e| DbError::Internal(format!("corrupt sync_queue row {}: {e}", row.id)))?;

        Ok(QueueItem {
            id: row.id,
            channel: row.channel,
            direction: row.direction,
            payload: row.payload,
            status,
            retry_count: row.retry_count,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            correlation_id: row.correlation_id,
            created_date: row.created_date,
            modified_date: row.modified_date,
        })
    }
}

const SELECT_COLUMNS: &str = "id, channel, direction, payload, status, retry_count, \
     next_attempt_at, last_error, correlation_id, created_date, modified_date";

// =============================================================================
// Queue Repository
// =============================================================================

/// Repository for sync queue operations.
#[derive(Debug, Clone)]
pub struct QueueRepository {
    pool: SqlitePool,
}

impl QueueRepository {
    /// Creates a new QueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QueueRepository { pool }
    }

    /// Inserts a fully-formed queue item.
    pub async fn insert(&self, item: &QueueItem) -> DbResult<()> {
        debug!(
            id = %item.id,
            channel = %item.channel,
            direction = %item.direction,
            "Inserting queue item"
        );

        sqlx::query(
            r#"
            INSERT INTO sync_queue (
                id, channel, direction, payload, status, retry_count,
                next_attempt_at, last_error, correlation_id, created_date, modified_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&item.id)
        .bind(&item.channel)
        .bind(&item.direction)
        .bind(&item.payload)
        .bind(item.status.as_str())
        .bind(item.retry_count)
        .bind(item.next_attempt_at)
        .bind(&item.last_error)
        .bind(&item.correlation_id)
        .bind(item.created_date)
        .bind(item.modified_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetches an item by id.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<QueueItem>> {
        let row = sqlx::query_as::<_, QueueItemRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM sync_queue WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueueItem::try_from).transpose()
    }

    /// Atomically claims the oldest eligible pending item.
    ///
    /// Eligible means status = 'pending' and next_attempt_at <= `now`.
    /// The row is flipped to 'processing' and returned in one statement;
    /// under the single-writer discipline this is race-free, and the
    /// database's row-level guarantees cover concurrent dashboard reads.
    pub async fn claim_next(&self, now: DateTime<Utc>) -> DbResult<Option<QueueItem>> {
        let row = sqlx::query_as::<_, QueueItemRow>(&format!(
            r#"
            UPDATE sync_queue
            SET status = 'processing', modified_date = ?1
            WHERE id = (
                SELECT id FROM sync_queue
                WHERE status = 'pending' AND next_attempt_at <= ?2
                ORDER BY created_date ASC, id ASC
                LIMIT 1
            )
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueueItem::try_from).transpose()
    }

    /// Marks a processing item as succeeded (terminal).
    ///
    /// Returns false if the item was not in 'processing'.
    pub async fn mark_succeeded(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'succeeded', last_error = NULL, modified_date = ?2
            WHERE id = ?1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a retryable failure: the item returns to 'pending' with an
    /// incremented retry count and a pushed-out next_attempt_at.
    ///
    /// Returns false if the item was not in 'processing'.
    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'pending',
                retry_count = retry_count + 1,
                last_error = ?2,
                next_attempt_at = ?3,
                modified_date = ?4
            WHERE id = ?1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Routes a processing item to the terminal dead-letter state.
    ///
    /// Returns false if the item was not in 'processing'.
    pub async fn mark_dead_lettered(
        &self,
        id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'dead_lettered',
                retry_count = retry_count + 1,
                last_error = ?2,
                modified_date = ?3
            WHERE id = ?1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns abandoned 'processing' items to 'pending'.
    ///
    /// An item counts as abandoned when its modified_date is older than
    /// `cutoff` - the worker that claimed it crashed or was killed before
    /// recording an outcome. Returns the number of reclaimed items.
    pub async fn reclaim_stale(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'pending', modified_date = ?2
            WHERE status = 'processing' AND modified_date < ?1
            "#,
        )
        .bind(cutoff)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes up to `limit` succeeded items created before `cutoff`.
    ///
    /// Only 'succeeded' rows are eligible; pending, processing, and
    /// dead-lettered rows are never touched regardless of age. Returns
    /// the number of deleted rows so the caller can loop in batches.
    pub async fn delete_succeeded_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sync_queue
            WHERE id IN (
                SELECT id FROM sync_queue
                WHERE status = 'succeeded' AND created_date < ?1
                ORDER BY created_date ASC
                LIMIT ?2
            )
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Counts items in the given status.
    pub async fn count_with_status(&self, status: QueueStatus) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = ?1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
