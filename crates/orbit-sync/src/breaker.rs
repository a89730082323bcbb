//! # Circuit Breaker
//!
//! Halts calls to the remote catalog once the recent failure rate crosses
//! a configured threshold, then probes for recovery after a cooldown.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Circuit Breaker States                             │
//! │                                                                         │
//! │                 failure rate ≥ threshold                                │
//! │                 (and ≥ min_throughput calls)                            │
//! │   ┌──────────┐ ───────────────────────────►  ┌──────────┐              │
//! │   │  Closed  │                               │   Open   │              │
//! │   └──────────┘ ◄─────────────┐               └────┬─────┘              │
//! │        ▲                     │                    │                     │
//! │        │                     │                    │ open_duration       │
//! │        │    all trial calls  │                    │ elapsed             │
//! │        │    succeeded        │                    ▼                     │
//! │        │               ┌─────┴─────┐    any trial ┌──────────┐         │
//! │        └───────────────┤ HalfOpen  │ ────────────►│   Open   │         │
//! │                        └───────────┘    fails     └──────────┘         │
//! │                                                                         │
//! │  Outcomes feed a sliding window (ring buffer bounded by entry count    │
//! │  AND age). The window is cleared on every Open/Closed transition so    │
//! │  stale history can't re-trip the breaker.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Time is always passed in by the caller, never read from a clock here,
//! so every transition is reproducible under test. The dispatch worker
//! records each returned [`CircuitTransition`] through the audit log.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use orbit_core::CircuitState;

use crate::config::BreakerSettings;

// =============================================================================
// Transition
// =============================================================================

/// A state change, reported to the caller for audit logging.
#[derive(Debug, Clone)]
pub struct CircuitTransition {
    pub previous: CircuitState,
    pub next: CircuitState,

    /// Human-readable trigger for the audit log.
    pub reason: String,

    /// Failure rate over the window at transition time.
    pub failure_rate: f64,
}

// =============================================================================
// Circuit Breaker
// =============================================================================

/// One timestamped call outcome in the sliding window.
#[derive(Debug, Clone, Copy)]
struct CallSample {
    at: DateTime<Utc>,
    success: bool,
}

/// Failure-rate driven circuit breaker for the catalog dependency.
///
/// Not thread-safe by itself; the dispatch worker wraps it in a mutex and
/// is the only writer.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    state: CircuitState,
    window: VecDeque<CallSample>,
    opened_at: Option<DateTime<Utc>>,
    half_open_calls: u32,
    half_open_successes: u32,
}

impl CircuitBreaker {
    /// Creates a closed breaker with an empty window.
    pub fn new(settings: BreakerSettings) -> Self {
        let capacity = settings.window_size;
        CircuitBreaker {
            settings,
            state: CircuitState::Closed,
            window: VecDeque::with_capacity(capacity),
            opened_at: None,
            half_open_calls: 0,
            half_open_successes: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Failure rate over the current window (0.0 when empty).
    pub fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|s| !s.success).count();
        failures as f64 / self.window.len() as f64
    }

    /// Whether a call may be attempted at `now`.
    ///
    /// An Open breaker whose cooldown has elapsed moves to HalfOpen here;
    /// the returned transition must be audit-logged by the caller. This
    /// check does NOT consume a half-open trial slot - call
    /// [`begin_call`](Self::begin_call) right before the remote call.
    pub fn permits_call(&mut self, now: DateTime<Utc>) -> (bool, Option<CircuitTransition>) {
        match self.state {
            CircuitState::Closed => (true, None),

            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| now - at >= Duration::seconds(self.settings.open_duration_secs as i64))
                    .unwrap_or(true);

                if elapsed {
                    self.half_open_calls = 0;
                    self.half_open_successes = 0;
                    let transition = self.transition_to(
                        CircuitState::HalfOpen,
                        "open duration elapsed, probing with trial calls".to_string(),
                    );
                    (true, Some(transition))
                } else {
                    (false, None)
                }
            }

            CircuitState::HalfOpen => (
                self.half_open_calls < self.settings.half_open_max_calls,
                None,
            ),
        }
    }

    /// Marks a call as started; consumes a trial slot while half-open.
    pub fn begin_call(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_calls += 1;
        }
    }

    /// Records a call outcome and evaluates transitions.
    pub fn record_outcome(
        &mut self,
        success: bool,
        now: DateTime<Utc>,
    ) -> Option<CircuitTransition> {
        match self.state {
            CircuitState::Closed => {
                self.window.push_back(CallSample { at: now, success });
                self.prune(now);

                let total = self.window.len();
                let rate = self.failure_rate();
                if total >= self.settings.min_throughput as usize
                    && rate >= self.settings.failure_rate_threshold
                {
                    self.opened_at = Some(now);
                    return Some(self.transition_to(
                        CircuitState::Open,
                        format!(
                            "failure rate {:.2} over {} calls reached threshold {:.2}",
                            rate, total, self.settings.failure_rate_threshold
                        ),
                    ));
                }
                None
            }

            CircuitState::HalfOpen => {
                if success {
                    self.half_open_successes += 1;
                    if self.half_open_successes >= self.settings.half_open_max_calls {
                        self.window.clear();
                        return Some(self.transition_to(
                            CircuitState::Closed,
                            "trial calls succeeded, resuming normal dispatch".to_string(),
                        ));
                    }
                    None
                } else {
                    self.opened_at = Some(now);
                    self.window.clear();
                    Some(self.transition_to(
                        CircuitState::Open,
                        "trial call failed while half-open".to_string(),
                    ))
                }
            }

            // A call that was in flight when the state flipped; its
            // outcome no longer participates in any decision.
            CircuitState::Open => None,
        }
    }

    /// Drops samples outside the window bounds (age and capacity).
    fn prune(&mut self, now: DateTime<Utc>) {
        let max_age = Duration::seconds(self.settings.window_secs as i64);
        while let Some(front) = self.window.front() {
            if now - front.at > max_age {
                self.window.pop_front();
            } else {
                break;
            }
        }
        while self.window.len() > self.settings.window_size {
            self.window.pop_front();
        }
    }

    fn transition_to(&mut self, next: CircuitState, reason: String) -> CircuitTransition {
        let transition = CircuitTransition {
            previous: self.state,
            next,
            reason,
            failure_rate: self.failure_rate(),
        };
        self.state = next;
        transition
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
