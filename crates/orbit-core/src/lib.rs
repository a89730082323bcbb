//! # orbit-core: Pure Domain Logic for Orbit POS Catalog Sync
//!
//! This crate is the foundation of the catalog sync engine. It contains
//! the queue's domain model and every pure policy decision, with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Orbit POS Sync Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  orbit-sync (engine crate)                      │   │
//! │  │     dispatch worker ── queue service ── retention cleaner       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 ★ orbit-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  payload  │  │  backoff  │  │   error   │  │   │
//! │  │   │ QueueItem │  │ schemas + │  │ delay     │  │ CoreError │  │   │
//! │  │   │ statuses  │  │ validate  │  │ policy    │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO HIDDEN CLOCKS         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    orbit-db (persistence)                       │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Queue item model, status machine, routing enums,
//!   telemetry record types
//! - [`payload`] - Wire payload schemas and validation
//! - [`backoff`] - Retry delay policy (sequence lookup, rate-limit
//!   doubling, jitter band)
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output; clocks and random
//!    samples are passed in by callers
//! 2. **No I/O**: database, network, and file system access are
//!    FORBIDDEN here
//! 3. **Explicit Errors**: all errors are typed, never strings or panics

pub mod backoff;
pub mod error;
pub mod payload;
pub mod types;

// Re-exports for convenience
pub use backoff::{BackoffPolicy, MAX_JITTER_FRACTION, RATE_LIMIT_MULTIPLIER};
pub use error::{CoreError, CoreResult};
pub use payload::{PricePayload, StockPayload};
pub use types::{
    ApiCallRecord, Channel, CircuitState, CircuitTransitionRecord, Direction, QueueItem,
    QueueStatus, RetryClass,
};
