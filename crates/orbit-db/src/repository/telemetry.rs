//! # Telemetry Repository
//!
//! Append-only persistence for outbound-call records and circuit breaker
//! transitions. Rows are written by the sync engine's telemetry logger,
//! which treats every failure here as non-fatal; nothing in this module
//! participates in the primary sync flow.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use orbit_core::{ApiCallRecord, CircuitTransitionRecord};

/// Repository for the api_call_log and circuit_state_log tables.
#[derive(Debug, Clone)]
pub struct TelemetryRepository {
    pool: SqlitePool,
}

impl TelemetryRepository {
    /// Creates a new TelemetryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TelemetryRepository { pool }
    }

    /// Appends one outbound catalog call record.
    pub async fn insert_api_call(&self, record: &ApiCallRecord) -> DbResult<()> {
        debug!(
            endpoint = %record.endpoint,
            success = record.success,
            duration_ms = record.duration_ms,
            "Recording api call"
        );

        sqlx::query(
            r#"
            INSERT INTO api_call_log (
                endpoint, method, success, status_code, duration_ms,
                category, timestamp_utc, correlation_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&record.endpoint)
        .bind(&record.method)
        .bind(record.success)
        .bind(record.status_code)
        .bind(record.duration_ms)
        .bind(&record.category)
        .bind(record.timestamp_utc)
        .bind(&record.correlation_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Appends one circuit state transition record.
    pub async fn insert_circuit_transition(
        &self,
        record: &CircuitTransitionRecord,
    ) -> DbResult<()> {
        debug!(
            previous = %record.previous_state,
            new = %record.new_state,
            reason = %record.reason,
            "Recording circuit transition"
        );

        sqlx::query(
            r#"
            INSERT INTO circuit_state_log (
                previous_state, new_state, reason, failure_rate,
                transition_time_utc, correlation_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(record.previous_state.as_str())
        .bind(record.new_state.as_str())
        .bind(&record.reason)
        .bind(record.failure_rate)
        .bind(record.transition_time_utc)
        .bind(&record.correlation_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts persisted api call records (dashboards and tests).
    pub async fn count_api_calls(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_call_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts persisted circuit transitions (dashboards and tests).
    pub async fn count_circuit_transitions(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM circuit_state_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
