//! # Sync Configuration
//!
//! Configuration for the catalog sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ORBIT_SYNC_POLL_INTERVAL_SECS=60                                   │
//! │     ORBIT_SYNC_AUTO_ENABLED=false                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/orbit-pos/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.orbit.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [worker]
//! poll_interval_secs = 300
//! tick_jitter_ms = 2000
//! auto_sync_enabled = true
//! stale_claim_timeout_secs = 900
//!
//! [retry]
//! backoff_seconds = [30, 120, 600, 1800, 3600]
//!
//! [breaker]
//! failure_rate_threshold = 0.5
//! window_secs = 120
//! window_size = 64
//! open_duration_secs = 60
//! half_open_max_calls = 2
//! min_throughput = 5
//!
//! [retention]
//! queue_retention_hours = 24
//! cleanup_interval_secs = 3600
//! cleanup_batch_size = 200
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use orbit_core::BackoffPolicy;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Worker Settings
// =============================================================================

/// Dispatch worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Interval between dispatch ticks (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound of the random delay applied before each tick, to
    /// desynchronize multiple processes sharing one store (milliseconds).
    #[serde(default = "default_tick_jitter")]
    pub tick_jitter_ms: u64,

    /// Master switch for background synchronization.
    #[serde(default = "default_true")]
    pub auto_sync_enabled: bool,

    /// Processing items untouched for longer than this are treated as
    /// abandoned by a crashed worker and returned to pending (seconds).
    #[serde(default = "default_stale_claim_timeout")]
    pub stale_claim_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    300
}
fn default_tick_jitter() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}
fn default_stale_claim_timeout() -> u64 {
    900
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            poll_interval_secs: default_poll_interval(),
            tick_jitter_ms: default_tick_jitter(),
            auto_sync_enabled: true,
            stale_claim_timeout_secs: default_stale_claim_timeout(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Retry schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Ordered retry delays in seconds, indexed by retry count. The last
    /// entry repeats for every retry beyond the end of the sequence.
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: Vec<u64>,
}

fn default_backoff_seconds() -> Vec<u64> {
    vec![30, 120, 600, 1800, 3600]
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            backoff_seconds: default_backoff_seconds(),
        }
    }
}

// =============================================================================
// Circuit Breaker Settings
// =============================================================================

/// Circuit breaker thresholds protecting the remote catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Failure rate over the sliding window that opens the circuit (0-1].
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,

    /// Age bound of the sliding window (seconds).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Entry bound of the sliding window (ring buffer capacity).
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// How long the circuit stays open before probing (seconds).
    #[serde(default = "default_open_duration")]
    pub open_duration_secs: u64,

    /// Number of trial calls allowed while half-open.
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,

    /// Minimum calls in the window before the failure rate is evaluated.
    #[serde(default = "default_min_throughput")]
    pub min_throughput: u32,
}

fn default_failure_rate_threshold() -> f64 {
    0.5
}
fn default_window_secs() -> u64 {
    120
}
fn default_window_size() -> usize {
    64
}
fn default_open_duration() -> u64 {
    60
}
fn default_half_open_max_calls() -> u32 {
    2
}
fn default_min_throughput() -> u32 {
    5
}

impl Default for BreakerSettings {
    fn default() -> Self {
        BreakerSettings {
            failure_rate_threshold: default_failure_rate_threshold(),
            window_secs: default_window_secs(),
            window_size: default_window_size(),
            open_duration_secs: default_open_duration(),
            half_open_max_calls: default_half_open_max_calls(),
            min_throughput: default_min_throughput(),
        }
    }
}

// =============================================================================
// Retention Settings
// =============================================================================

/// Queue retention and cleanup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Succeeded items older than this are purged (hours).
    #[serde(default = "default_retention_hours")]
    pub queue_retention_hours: u64,

    /// Interval between cleanup passes (seconds).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Rows deleted per batch during a cleanup pass.
    #[serde(default = "default_cleanup_batch_size")]
    pub cleanup_batch_size: u32,
}

fn default_retention_hours() -> u64 {
    24
}
fn default_cleanup_interval() -> u64 {
    3600
}
fn default_cleanup_batch_size() -> u32 {
    200
}

impl Default for RetentionSettings {
    fn default() -> Self {
        RetentionSettings {
            queue_retention_hours: default_retention_hours(),
            cleanup_interval_secs: default_cleanup_interval(),
            cleanup_batch_size: default_cleanup_batch_size(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Dispatch worker settings.
    #[serde(default)]
    pub worker: WorkerSettings,

    /// Retry schedule settings.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Circuit breaker thresholds.
    #[serde(default)]
    pub breaker: BreakerSettings,

    /// Retention and cleanup settings.
    #[serde(default)]
    pub retention: RetentionSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.retry.backoff_seconds.is_empty() {
            return Err(SyncError::InvalidConfig(
                "retry.backoff_seconds must not be empty".into(),
            ));
        }

        if self.worker.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "worker.poll_interval_secs must be greater than 0".into(),
            ));
        }

        let threshold = self.breaker.failure_rate_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(SyncError::InvalidConfig(format!(
                "breaker.failure_rate_threshold must be in (0, 1], got {threshold}"
            )));
        }

        if self.breaker.half_open_max_calls == 0 {
            return Err(SyncError::InvalidConfig(
                "breaker.half_open_max_calls must be greater than 0".into(),
            ));
        }

        if self.breaker.window_size == 0 {
            return Err(SyncError::InvalidConfig(
                "breaker.window_size must be greater than 0".into(),
            ));
        }

        if self.retention.cleanup_batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "retention.cleanup_batch_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(secs) = std::env::var("ORBIT_SYNC_POLL_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                debug!(poll_interval_secs = s, "Overriding poll interval from environment");
                self.worker.poll_interval_secs = s;
            }
        }

        if let Ok(enabled) = std::env::var("ORBIT_SYNC_AUTO_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.worker.auto_sync_enabled = true,
                "0" | "false" | "no" => self.worker.auto_sync_enabled = false,
                other => warn!(value = %other, "Unknown ORBIT_SYNC_AUTO_ENABLED value"),
            }
        }

        if let Ok(seq) = std::env::var("ORBIT_SYNC_BACKOFF_SECONDS") {
            let parsed: Result<Vec<u64>, _> =
                seq.split(',').map(|s| s.trim().parse::<u64>()).collect();
            match parsed {
                Ok(values) if !values.is_empty() => {
                    debug!(?values, "Overriding backoff sequence from environment");
                    self.retry.backoff_seconds = values;
                }
                _ => warn!(value = %seq, "Unparseable ORBIT_SYNC_BACKOFF_SECONDS"),
            }
        }

        if let Ok(hours) = std::env::var("ORBIT_SYNC_RETENTION_HOURS") {
            if let Ok(h) = hours.parse::<u64>() {
                self.retention.queue_retention_hours = h;
            }
        }

        if let Ok(secs) = std::env::var("ORBIT_SYNC_STALE_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.worker.stale_claim_timeout_secs = s;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "orbit", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Dispatch poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker.poll_interval_secs)
    }

    /// Upper bound of the pre-tick jitter.
    pub fn tick_jitter(&self) -> Duration {
        Duration::from_millis(self.worker.tick_jitter_ms)
    }

    /// Age at which a processing item counts as abandoned.
    pub fn stale_claim_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.worker.stale_claim_timeout_secs as i64)
    }

    /// Retention window for succeeded items.
    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention.queue_retention_hours as i64)
    }

    /// Interval between cleanup passes.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.retention.cleanup_interval_secs)
    }

    /// Builds the retry policy from the configured sequence.
    ///
    /// `validate()` guarantees the sequence is non-empty; a default
    /// schedule is used as a last resort if construction still fails.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.retry.backoff_seconds.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.backoff_seconds, vec![30, 120, 600, 1800, 3600]);
        assert!(config.worker.auto_sync_enabled);
        assert_eq!(config.retention.queue_retention_hours, 24);
    }

    #[test]
    fn test_validation_rejects_empty_backoff() {
        let mut config = SyncConfig::default();
        config.retry.backoff_seconds.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let mut config = SyncConfig::default();
        config.breaker.failure_rate_threshold = 0.0;
        assert!(config.validate().is_err());

        config.breaker.failure_rate_threshold = 1.5;
        assert!(config.validate().is_err());

        config.breaker.failure_rate_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_half_open_budget() {
        let mut config = SyncConfig::default();
        config.breaker.half_open_max_calls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[worker]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[breaker]"));
        assert!(toml_str.contains("[retention]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.worker.poll_interval_secs, config.worker.poll_interval_secs);
        assert_eq!(parsed.retry.backoff_seconds, config.retry.backoff_seconds);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: SyncConfig = toml::from_str(
            r#"
            [worker]
            poll_interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(parsed.worker.poll_interval_secs, 60);
        assert_eq!(parsed.worker.tick_jitter_ms, 2000);
        assert_eq!(parsed.retry.backoff_seconds, vec![30, 120, 600, 1800, 3600]);
    }

    #[test]
    fn test_backoff_policy_reflects_sequence() {
        let mut config = SyncConfig::default();
        config.retry.backoff_seconds = vec![10, 20];
        assert_eq!(config.backoff_policy().sequence(), &[10, 20]);
    }
}
