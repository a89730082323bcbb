//! Cheap randomness for retry jitter and tick desynchronization.
//!
//! Not cryptographically secure and doesn't need to be: the only goal is
//! that independent installations don't retry in lockstep.

use std::time::{Duration, SystemTime};

/// Simple random number source seeded from the system clock.
pub(crate) fn rand_u64() -> u64 {
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    // Mix in nanoseconds for some randomness
    duration.as_nanos() as u64 ^ (duration.as_secs() * 1_000_000_007)
}

/// Uniform sample in [0, 1).
pub(crate) fn unit_fraction() -> f64 {
    (rand_u64() % 10_000) as f64 / 10_000.0
}

/// Uniform duration in [0, max).
pub(crate) fn duration_up_to(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand_u64() % max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_fraction_in_range() {
        for _ in 0..100 {
            let f = unit_fraction();
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn test_duration_up_to_respects_bound() {
        let max = Duration::from_millis(500);
        for _ in 0..100 {
            assert!(duration_up_to(max) < max);
        }
        assert_eq!(duration_up_to(Duration::ZERO), Duration::ZERO);
    }
}
