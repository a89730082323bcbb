//! # Retry Backoff Policy
//!
//! Pure delay math for failed queue items.
//!
//! The delay for a retry is looked up in an ordered, operator-configured
//! sequence of seconds rather than computed from an exponential formula,
//! so the schedule can be shaped precisely ("retry quickly twice, then
//! back way off"). Rate-limited failures double the base delay; a uniform
//! jitter of 0-20% is then added on top to avoid synchronized retry
//! storms across installations.
//!
//! ```text
//!   delay = base(retry_count) × rate_limit_multiplier? × (1 + jitter)
//!
//!   base(k)    = sequence[min(k - 1, sequence.len() - 1)]
//!   multiplier = 2.0 when the failure was rate-limited
//!   jitter     ∈ [0, 0.2), uniform
//! ```
//!
//! All inputs (retry count, classification, jitter sample) come from the
//! caller; nothing here reads a clock or a random source.

use crate::error::CoreError;
use crate::types::RetryClass;

/// Multiplier applied to the base delay when the remote throttled us.
pub const RATE_LIMIT_MULTIPLIER: f64 = 2.0;

/// Upper bound of the uniform jitter fraction.
pub const MAX_JITTER_FRACTION: f64 = 0.2;

/// Ordered sequence of retry delays, indexed by retry count.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    sequence: Vec<u64>,
}

impl BackoffPolicy {
    /// Creates a policy from an ordered sequence of delays in seconds.
    pub fn new(sequence: Vec<u64>) -> Result<Self, CoreError> {
        if sequence.is_empty() {
            return Err(CoreError::EmptyBackoffSequence);
        }
        Ok(BackoffPolicy { sequence })
    }

    /// Returns the configured delay sequence.
    pub fn sequence(&self) -> &[u64] {
        &self.sequence
    }

    /// Base delay in seconds for the given retry count, before jitter.
    ///
    /// ## Arguments
    /// * `retry_count` - Attempt count AFTER the failure was recorded
    ///   (first failure => 1). Values below 1 are clamped to 1.
    /// * `override_secs` - Caller-supplied delay that replaces the
    ///   sequence lookup (e.g. a Retry-After header from the remote).
    /// * `class` - Failure classification; rate-limited doubles the base.
    pub fn base_delay_secs(
        &self,
        retry_count: i64,
        override_secs: Option<u64>,
        class: RetryClass,
    ) -> f64 {
        let index = (retry_count.max(1) as usize - 1).min(self.sequence.len() - 1);
        let base = override_secs.unwrap_or(self.sequence[index]) as f64;

        if class == RetryClass::RateLimited {
            base * RATE_LIMIT_MULTIPLIER
        } else {
            base
        }
    }

    /// Effective delay in seconds including jitter.
    ///
    /// `unit_jitter` is a uniform sample in [0, 1); it is scaled to the
    /// 0-20% jitter band. Out-of-range samples are clamped.
    pub fn delay_secs(
        &self,
        retry_count: i64,
        override_secs: Option<u64>,
        class: RetryClass,
        unit_jitter: f64,
    ) -> f64 {
        let base = self.base_delay_secs(retry_count, override_secs, class);
        let jitter = unit_jitter.clamp(0.0, 1.0) * MAX_JITTER_FRACTION;
        base * (1.0 + jitter)
    }
}

impl Default for BackoffPolicy {
    /// Default schedule: 30s, 2m, 10m, 30m, then hourly.
    fn default() -> Self {
        BackoffPolicy {
            sequence: vec![30, 120, 600, 1800, 3600],
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(vec![30, 60, 300]).unwrap()
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        assert!(BackoffPolicy::new(vec![]).is_err());
    }

    #[test]
    fn test_sequence_is_indexed_by_retry_count() {
        let p = policy();
        assert_eq!(p.base_delay_secs(1, None, RetryClass::Transient), 30.0);
        assert_eq!(p.base_delay_secs(2, None, RetryClass::Transient), 60.0);
        assert_eq!(p.base_delay_secs(3, None, RetryClass::Transient), 300.0);
    }

    #[test]
    fn test_retry_count_clamps_to_last_entry() {
        let p = policy();
        assert_eq!(p.base_delay_secs(4, None, RetryClass::Transient), 300.0);
        assert_eq!(p.base_delay_secs(100, None, RetryClass::Transient), 300.0);
    }

    #[test]
    fn test_retry_count_below_one_is_clamped() {
        let p = policy();
        assert_eq!(p.base_delay_secs(0, None, RetryClass::Transient), 30.0);
        assert_eq!(p.base_delay_secs(-5, None, RetryClass::Transient), 30.0);
    }

    #[test]
    fn test_rate_limited_doubles_base() {
        let p = policy();
        for k in 1..=5 {
            let plain = p.base_delay_secs(k, None, RetryClass::Transient);
            let limited = p.base_delay_secs(k, None, RetryClass::RateLimited);
            assert_eq!(limited, plain * 2.0);
        }
    }

    #[test]
    fn test_override_replaces_sequence_lookup() {
        let p = policy();
        assert_eq!(p.base_delay_secs(1, Some(45), RetryClass::Transient), 45.0);
        // The rate-limit multiplier still applies to an override.
        assert_eq!(
            p.base_delay_secs(1, Some(45), RetryClass::RateLimited),
            90.0
        );
    }

    #[test]
    fn test_jitter_stays_within_twenty_percent() {
        let p = policy();
        let base = p.base_delay_secs(1, None, RetryClass::Transient);

        assert_eq!(p.delay_secs(1, None, RetryClass::Transient, 0.0), base);
        let max = p.delay_secs(1, None, RetryClass::Transient, 1.0);
        assert!((max - base * 1.2).abs() < 1e-9);

        let mid = p.delay_secs(1, None, RetryClass::Transient, 0.5);
        assert!(mid >= base && mid <= base * 1.2);
    }

    #[test]
    fn test_out_of_range_jitter_is_clamped() {
        let p = policy();
        let base = p.base_delay_secs(1, None, RetryClass::Transient);
        assert_eq!(p.delay_secs(1, None, RetryClass::Transient, -3.0), base);
        assert!(
            (p.delay_secs(1, None, RetryClass::Transient, 7.0) - base * 1.2).abs() < 1e-9
        );
    }
}
