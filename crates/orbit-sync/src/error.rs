//! # Sync Error Types
//!
//! Error types for the catalog sync engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Database     │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Database       │  │  ChannelError           │ │
//! │  │  ConfigLoad     │  │  (typed DbError │  │  Internal               │ │
//! │  │  ConfigSave     │  │   kept intact)  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Remote-call failures are NOT SyncErrors: the catalog client reports   │
//! │  them as typed ClientErrors, which the worker converts into queue      │
//! │  outcomes (retry / dead-letter) rather than propagating.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync engine error type.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Store failures keep their typed `DbError` so the dispatch loop can
///   classify them (missing schema / connectivity / generic) before
///   logging and carrying on
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] orbit_db::DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed (a component is gone).
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Internal sync engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}
