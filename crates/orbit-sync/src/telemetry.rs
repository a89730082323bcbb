//! # Telemetry Logger
//!
//! Best-effort persistence of outbound-call records and circuit breaker
//! transitions.
//!
//! Telemetry must never affect the primary sync flow: every persistence
//! failure is caught here, logged at warn, and discarded. Callers cannot
//! observe a telemetry failure.

use std::time::Duration;
use tracing::warn;

use orbit_core::{ApiCallRecord, CircuitTransitionRecord};
use orbit_db::TelemetryRepository;

use crate::breaker::CircuitTransition;

/// Writes audit rows through the telemetry repository, swallowing errors.
#[derive(Debug, Clone)]
pub struct TelemetryLogger {
    repo: TelemetryRepository,
}

impl TelemetryLogger {
    /// Creates a logger over the given repository.
    pub fn new(repo: TelemetryRepository) -> Self {
        TelemetryLogger { repo }
    }

    /// Records one outbound catalog call.
    #[allow(clippy::too_many_arguments)]
    pub async fn log_api_call(
        &self,
        endpoint: &str,
        method: &str,
        success: bool,
        status_code: Option<u16>,
        duration: Duration,
        category: &str,
        correlation_id: Option<&str>,
    ) {
        let record = ApiCallRecord {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            success,
            status_code: status_code.map(i64::from),
            duration_ms: duration.as_millis() as i64,
            category: category.to_string(),
            timestamp_utc: chrono::Utc::now(),
            correlation_id: correlation_id.map(str::to_string),
        };

        if let Err(e) = self.repo.insert_api_call(&record).await {
            warn!(error = %e, endpoint, "Failed to persist api call record, dropping it");
        }
    }

    /// Records one circuit breaker transition.
    pub async fn log_circuit_transition(
        &self,
        transition: &CircuitTransition,
        correlation_id: Option<&str>,
    ) {
        let record = CircuitTransitionRecord {
            previous_state: transition.previous,
            new_state: transition.next,
            reason: transition.reason.clone(),
            failure_rate: transition.failure_rate,
            transition_time_utc: chrono::Utc::now(),
            correlation_id: correlation_id.map(str::to_string),
        };

        if let Err(e) = self.repo.insert_circuit_transition(&record).await {
            warn!(
                error = %e,
                previous = %record.previous_state,
                new = %record.new_state,
                "Failed to persist circuit transition, dropping it"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
