//! # orbit-db: Database Layer for Orbit POS Catalog Sync
//!
//! SQLite persistence for the catalog sync engine, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Orbit POS Data Flow                               │
//! │                                                                         │
//! │  orbit-sync (queue service, dispatch worker, cleaner)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     orbit-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ QueueRepo      │    │              │ │   │
//! │  │   │ SqlitePool    │◄───│ TelemetryRepo  │    │ 001_sync_    │ │   │
//! │  │   │ WAL config    │    │                │    │   core.sql   │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (queue, telemetry)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orbit_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/orbit.db")).await?;
//! let claimed = db.queue().claim_next(chrono::Utc::now()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::queue::QueueRepository;
pub use repository::telemetry::TelemetryRepository;
