//! # Health Tracker
//!
//! In-memory rolling counters for operational visibility: when did a
//! dispatch last succeed or fail, how many failures in a row, what did
//! the last failure say.
//!
//! The tracker is an explicit instance owned by the composition root and
//! shared by `Arc` between the dispatch worker (writer) and dashboard
//! consumers (readers). Nothing here is persisted; a restart starts the
//! counters from zero.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// Point-in-time copy of the health counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthSnapshot {
    /// When a dispatch last succeeded.
    pub last_success_utc: Option<DateTime<Utc>>,

    /// When a dispatch last failed.
    pub last_failure_utc: Option<DateTime<Utc>>,

    /// Failures since the last success. Reset to zero on success.
    pub consecutive_failures: u64,

    /// Message of the most recent failure.
    pub last_error_message: Option<String>,

    /// Total successfully processed items since startup.
    pub processed_count: u64,
}

/// Thread-safe health counters behind a single lock.
#[derive(Debug, Default)]
pub struct HealthTracker {
    inner: Mutex<HealthSnapshot>,
}

impl HealthTracker {
    /// Creates a tracker with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful dispatch.
    pub fn on_success(&self) {
        let mut inner = self.lock();
        inner.last_success_utc = Some(Utc::now());
        inner.consecutive_failures = 0;
        inner.processed_count += 1;
    }

    /// Records a failed dispatch.
    pub fn on_failure(&self, message: &str) {
        let mut inner = self.lock();
        inner.last_failure_utc = Some(Utc::now());
        inner.consecutive_failures += 1;
        inner.last_error_message = Some(message.to_string());
    }

    /// Returns a copy of the current counters.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.lock().clone()
    }

    // A poisoned lock means a panic mid-update; the counters are still
    // usable, so recover the guard instead of propagating the panic.
    fn lock(&self) -> std::sync::MutexGuard<'_, HealthSnapshot> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
