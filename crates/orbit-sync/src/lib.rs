//! # orbit-sync: Catalog Sync Engine for Orbit POS
//!
//! This crate keeps the local store and the remote catalog convergent:
//! every local inventory or price change is queued durably and pushed to
//! the catalog by a background worker that survives network failures,
//! rate limiting, and process restarts.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Catalog Sync Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    SyncAgent (Composition Root)                  │  │
//! │  │                                                                  │  │
//! │  │  Builds shared components, spawns background tasks,              │  │
//! │  │  exposes the status surface                                      │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼──────────────────────┐                 │
//! │         ▼                     ▼                      ▼                  │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ DispatchWorker │  │  QueueService  │  │   RetentionCleaner     │    │
//! │  │                │  │                │  │                        │    │
//! │  │ One item per   │  │ Enqueue/claim/ │  │ Stale-claim reclaim +  │    │
//! │  │ tick, routed   │  │ mark ops, owns │  │ bounded-batch purge of │    │
//! │  │ by channel +   │  │ backoff math   │  │ old succeeded items    │    │
//! │  │ direction      │  │                │  │                        │    │
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────┘    │
//! │          │                                                              │
//! │          ├──────────────────┬─────────────────────┐                    │
//! │          ▼                  ▼                     ▼                     │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ CircuitBreaker │  │ HealthTracker  │  │   TelemetryLogger      │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Sliding-window │  │ Rolling        │  │ Best-effort api call   │    │
//! │  │ failure rate,  │  │ counters for   │  │ + circuit transition   │    │
//! │  │ Open/HalfOpen  │  │ dashboards     │  │ audit rows             │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │          CatalogClient trait (HTTP transport lives              │  │
//! │  │          outside this crate; test doubles in tests)             │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - Composition root and status surface
//! - [`breaker`] - Circuit breaker state machine
//! - [`cleaner`] - Stale-claim reclaim and retention purge
//! - [`client`] - Catalog client trait and typed call errors
//! - [`config`] - Engine configuration (TOML + env + defaults)
//! - [`error`] - Sync error types
//! - [`health`] - Rolling health counters
//! - [`service`] - Queue operations and backoff computation
//! - [`telemetry`] - Best-effort audit logging
//! - [`worker`] - The dispatch loop
//!
//! ## Delivery Semantics
//!
//! At-least-once: an item is marked succeeded only after the catalog call
//! returns, so a crash between the call and the mark replays the call on
//! restart. Catalog operations must therefore be idempotent per product.
//! Exactly-once delivery and multi-process queue coordination are
//! explicitly out of scope (single-process, single-writer queue).

pub mod agent;
pub mod breaker;
pub mod cleaner;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
mod jitter;
pub mod service;
pub mod telemetry;
pub mod worker;

// Re-exports for convenience
pub use agent::{SyncAgent, SyncAgentBuilder, SyncStatus};
pub use breaker::{CircuitBreaker, CircuitTransition};
pub use cleaner::{RetentionCleaner, RetentionCleanerHandle};
pub use client::{CatalogClient, ClientError, ClientResult};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use health::{HealthSnapshot, HealthTracker};
pub use service::QueueService;
pub use telemetry::TelemetryLogger;
pub use worker::{DispatchWorker, DispatchWorkerHandle, TickOutcome};
