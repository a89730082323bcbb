//! # Domain Types
//!
//! Core domain types for the catalog sync queue.
//!
//! ## Queue Item Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Queue Item State Machine                           │
//! │                                                                         │
//! │                 enqueue                                                 │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │              ┌──────────┐   claim    ┌────────────┐                    │
//! │       ┌─────►│ Pending  ├───────────►│ Processing │                    │
//! │       │      └──────────┘            └─────┬──────┘                    │
//! │       │                                    │                           │
//! │       │ retryable failure                  │                           │
//! │       │ (retry_count += 1,     ┌───────────┼───────────┐               │
//! │       │  next_attempt_at       │           │           │               │
//! │       │  pushed out)           ▼           ▼           ▼               │
//! │       │                  ┌──────────┐ ┌─────────┐ ┌──────────────┐    │
//! │       └──────────────────┤ failure  │ │Succeeded│ │ DeadLettered │    │
//! │                          └──────────┘ └─────────┘ └──────────────┘    │
//! │                                        (terminal)   (terminal)         │
//! │                                                                         │
//! │  An item is CLAIMABLE only when status = Pending and                   │
//! │  next_attempt_at <= now.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual Identity
//! Queue items carry a UUID v4 `id` (primary key) and an optional
//! `correlation_id` supplied by the producer for cross-system tracing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// =============================================================================
// Queue Status
// =============================================================================

/// Lifecycle state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting to be claimed (possibly after a failed attempt).
    Pending,

    /// Claimed by the dispatch worker; at most one item is in this state
    /// per process under the single-writer discipline.
    Processing,

    /// Delivered to the remote catalog. Terminal.
    Succeeded,

    /// Permanently undeliverable (malformed payload, unsupported route,
    /// or a permanent remote rejection). Terminal, never retried.
    DeadLettered,
}

impl QueueStatus {
    /// Returns the canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Succeeded => "succeeded",
            QueueStatus::DeadLettered => "dead_lettered",
        }
    }

    /// Returns true for states that never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Succeeded | QueueStatus::DeadLettered)
    }

    /// Checks whether a transition to `next` is allowed by the state machine.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        match (self, next) {
            (QueueStatus::Pending, QueueStatus::Processing) => true,
            (QueueStatus::Processing, QueueStatus::Succeeded) => true,
            (QueueStatus::Processing, QueueStatus::Pending) => true,
            (QueueStatus::Processing, QueueStatus::DeadLettered) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "succeeded" => Ok(QueueStatus::Succeeded),
            "dead_lettered" => Ok(QueueStatus::DeadLettered),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Channel & Direction
// =============================================================================

/// Logical category of synchronized data.
///
/// Channels are stored as raw strings on the queue item (enqueue performs
/// no validation); parsing happens at dispatch time so an unknown channel
/// can be routed to the dead-letter state with a descriptive error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    /// Stock level changes.
    Stock,

    /// Product price changes.
    Product,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stock => "Stock",
            Channel::Product => "Product",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stock" => Ok(Channel::Stock),
            "product" => Ok(Channel::Product),
            other => Err(CoreError::UnknownChannel(other.to_string())),
        }
    }
}

/// Flow orientation of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Local change pushed to the remote catalog.
    Out,

    /// Remote change applied locally. Reserved, no handlers yet.
    In,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Out => "Out",
            Direction::In => "In",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "out" => Ok(Direction::Out),
            "in" => Ok(Direction::In),
            other => Err(CoreError::UnknownDirection(other.to_string())),
        }
    }
}

// =============================================================================
// Retry Classification
// =============================================================================

/// Typed classification of a failed remote call.
///
/// The catalog client reports failures as one of these classes instead of
/// free-form text, so retry decisions never depend on fragile message
/// parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    /// The remote throttled us (HTTP 429 or an explicit throttle signal).
    /// Retried with a doubled backoff base.
    RateLimited,

    /// Timeout, connectivity loss, or a 5xx response. Retried with the
    /// standard backoff schedule.
    Transient,

    /// The request can never succeed as-is (validation rejection, 4xx
    /// other than 429). Routed to the dead-letter state.
    Permanent,
}

impl RetryClass {
    /// Returns true if an item failing with this class goes back to Pending.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RetryClass::Permanent)
    }
}

impl std::fmt::Display for RetryClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryClass::RateLimited => write!(f, "rate_limited"),
            RetryClass::Transient => write!(f, "transient"),
            RetryClass::Permanent => write!(f, "permanent"),
        }
    }
}

// =============================================================================
// Queue Item
// =============================================================================

/// A unit of pending synchronization work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Logical category, stored raw (e.g. "Stock", "Product").
    pub channel: String,

    /// Flow orientation, stored raw ("Out"; "In" reserved).
    pub direction: String,

    /// Opaque serialized payload (JSON).
    pub payload: String,

    /// Lifecycle state.
    pub status: QueueStatus,

    /// Number of failed attempts so far. Never decreases.
    pub retry_count: i64,

    /// Earliest time the item may be claimed again.
    pub next_attempt_at: DateTime<Utc>,

    /// Error message from the most recent failed attempt.
    pub last_error: Option<String>,

    /// Producer-supplied id for cross-system tracing.
    pub correlation_id: Option<String>,

    /// When the item was enqueued.
    pub created_date: DateTime<Utc>,

    /// When the item was last mutated.
    pub modified_date: DateTime<Utc>,
}

impl QueueItem {
    /// Creates a new Pending item, claimable immediately.
    ///
    /// The caller supplies `now` so that item construction stays
    /// deterministic under test.
    pub fn new(
        channel: impl Into<String>,
        direction: impl Into<String>,
        payload: impl Into<String>,
        correlation_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        QueueItem {
            id: Uuid::new_v4().to_string(),
            channel: channel.into(),
            direction: direction.into(),
            payload: payload.into(),
            status: QueueStatus::Pending,
            retry_count: 0,
            next_attempt_at: now,
            last_error: None,
            correlation_id,
            created_date: now,
            modified_date: now,
        }
    }

    /// Returns true if the item may be claimed at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Pending && self.next_attempt_at <= now
    }
}

// =============================================================================
// Circuit State
// =============================================================================

/// State of the circuit protecting the remote catalog dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally; outcomes feed the sliding window.
    Closed,

    /// Calls are refused until the open duration elapses.
    Open,

    /// A bounded number of trial calls probe whether the remote recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Telemetry Records
// =============================================================================

/// One outbound catalog call, as persisted to the api_call_log table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCallRecord {
    /// Remote endpoint path (e.g. "catalog/stock").
    pub endpoint: String,

    /// HTTP method of the call.
    pub method: String,

    /// Whether the call succeeded.
    pub success: bool,

    /// HTTP status code, when one was received.
    pub status_code: Option<i64>,

    /// Wall-clock duration of the call.
    pub duration_ms: i64,

    /// Logical category (channel name) for dashboard grouping.
    pub category: String,

    /// When the call completed.
    pub timestamp_utc: DateTime<Utc>,

    /// Correlation id of the queue item that triggered the call.
    pub correlation_id: Option<String>,
}

/// One circuit state change, as persisted to the circuit_state_log table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitTransitionRecord {
    pub previous_state: CircuitState,
    pub new_state: CircuitState,

    /// Human-readable trigger (e.g. "failure rate 0.80 over 10 calls").
    pub reason: String,

    /// Failure rate over the sliding window at transition time.
    pub failure_rate: f64,

    pub transition_time_utc: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            QueueStatus::Pending,
            QueueStatus::Processing,
            QueueStatus::Succeeded,
            QueueStatus::DeadLettered,
        ] {
            assert_eq!(status.as_str().parse::<QueueStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_transitions_follow_state_machine() {
        use QueueStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Succeeded));
        assert!(Processing.can_transition_to(Pending));
        assert!(Processing.can_transition_to(DeadLettered));

        // Terminal states never move again.
        assert!(!Succeeded.can_transition_to(Pending));
        assert!(!Succeeded.can_transition_to(Processing));
        assert!(!DeadLettered.can_transition_to(Pending));

        // No shortcuts around Processing.
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!Pending.can_transition_to(DeadLettered));
    }

    #[test]
    fn test_channel_parsing_is_case_insensitive() {
        assert_eq!("Stock".parse::<Channel>().unwrap(), Channel::Stock);
        assert_eq!("stock".parse::<Channel>().unwrap(), Channel::Stock);
        assert_eq!("PRODUCT".parse::<Channel>().unwrap(), Channel::Product);
        assert!("Foo".parse::<Channel>().is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("Out".parse::<Direction>().unwrap(), Direction::Out);
        assert_eq!("in".parse::<Direction>().unwrap(), Direction::In);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_new_item_is_claimable_immediately() {
        let now = Utc::now();
        let item = QueueItem::new("Stock", "Out", "{}", None, now);

        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert!(item.last_error.is_none());
        assert!(item.is_claimable(now));
    }

    #[test]
    fn test_item_with_future_attempt_is_not_claimable() {
        let now = Utc::now();
        let mut item = QueueItem::new("Stock", "Out", "{}", None, now);
        item.next_attempt_at = now + chrono::Duration::seconds(60);

        assert!(!item.is_claimable(now));
        assert!(item.is_claimable(now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn test_retry_class() {
        assert!(RetryClass::RateLimited.is_retryable());
        assert!(RetryClass::Transient.is_retryable());
        assert!(!RetryClass::Permanent.is_retryable());
    }
}
