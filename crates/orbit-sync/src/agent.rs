//! # Sync Agent
//!
//! Composition root for the catalog sync engine. Builds the queue
//! service, health tracker, circuit breaker, and telemetry logger, then
//! spawns and supervises the dispatch worker and retention cleaner.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                          SyncAgent                               │  │
//! │  │                                                                  │  │
//! │  │  • Owns the shared components (service, health, breaker)        │  │
//! │  │  • Spawns the background tasks when auto-sync is enabled        │  │
//! │  │  • Exposes the status surface polled by operational UI          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┴──────────────────┐                     │
//! │         ▼                                        ▼                     │
//! │  ┌────────────────┐                     ┌────────────────────┐         │
//! │  │ DispatchWorker │                     │  RetentionCleaner  │         │
//! │  │                │                     │                    │         │
//! │  │ Claims + pushes│                     │ Reclaims stale     │         │
//! │  │ queue items to │                     │ claims, purges old │         │
//! │  │ the catalog    │                     │ succeeded items    │         │
//! │  └────────────────┘                     └────────────────────┘         │
//! │                                                                         │
//! │  STATUS SURFACE (polled by dashboards):                                │
//! │  health counters • pending/dead-letter counts • circuit state          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};
use tracing::info;

use orbit_core::CircuitState;
use orbit_db::Database;

use crate::breaker::CircuitBreaker;
use crate::cleaner::{RetentionCleaner, RetentionCleanerHandle};
use crate::client::CatalogClient;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::health::{HealthSnapshot, HealthTracker};
use crate::service::QueueService;
use crate::telemetry::TelemetryLogger;
use crate::worker::{DispatchWorker, DispatchWorkerHandle};

// =============================================================================
// Sync Status
// =============================================================================

/// Current engine status for external queries.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Whether background sync is configured on.
    pub auto_sync_enabled: bool,

    /// Whether the background tasks are currently running.
    pub is_running: bool,

    /// Circuit breaker state toward the remote catalog.
    pub circuit_state: CircuitState,

    /// Items waiting to be dispatched.
    pub pending_count: i64,

    /// Permanently failed items awaiting operator attention.
    pub dead_letter_count: i64,

    /// Rolling health counters.
    pub health: HealthSnapshot,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Owns and supervises the sync engine's moving parts.
pub struct SyncAgent {
    config: SyncConfig,
    service: Arc<QueueService>,
    health: Arc<HealthTracker>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    telemetry: TelemetryLogger,
    client: Arc<dyn CatalogClient>,

    /// Worker handle (set while running).
    worker_handle: Option<DispatchWorkerHandle>,

    /// Cleaner handle (set while running).
    cleaner_handle: Option<RetentionCleanerHandle>,
}

impl SyncAgent {
    /// Creates an agent over a validated configuration.
    pub fn new(
        config: SyncConfig,
        db: Database,
        client: Arc<dyn CatalogClient>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let service = Arc::new(QueueService::new(db.clone(), config.backoff_policy()));
        let health = Arc::new(HealthTracker::new());
        let breaker = Arc::new(Mutex::new(CircuitBreaker::new(config.breaker.clone())));
        let telemetry = TelemetryLogger::new(db.telemetry());

        Ok(SyncAgent {
            config,
            service,
            health,
            breaker,
            telemetry,
            client,
            worker_handle: None,
            cleaner_handle: None,
        })
    }

    /// The queue service, for producers (stock/price screens) to enqueue
    /// changes and for dashboards to read counts.
    pub fn service(&self) -> Arc<QueueService> {
        self.service.clone()
    }

    /// The health tracker, for dashboard consumers.
    pub fn health(&self) -> Arc<HealthTracker> {
        self.health.clone()
    }

    /// Starts the background tasks.
    ///
    /// A no-op (beyond a log line) when auto-sync is disabled; producers
    /// can still enqueue, the queue simply isn't drained.
    pub async fn start(&mut self) -> SyncResult<()> {
        if !self.config.worker.auto_sync_enabled {
            info!("Auto-sync is disabled; dispatch worker not started");
            return Ok(());
        }

        if self.worker_handle.is_some() {
            return Err(SyncError::Internal("Sync agent already started".into()));
        }

        info!(
            poll_interval_secs = self.config.worker.poll_interval_secs,
            "Starting sync agent"
        );

        let (worker, worker_handle) = DispatchWorker::new(
            self.service.clone(),
            self.client.clone(),
            self.health.clone(),
            self.breaker.clone(),
            self.telemetry.clone(),
            &self.config,
        );
        self.worker_handle = Some(worker_handle);

        let (cleaner, cleaner_handle) = RetentionCleaner::new(self.service.clone(), &self.config);
        self.cleaner_handle = Some(cleaner_handle);

        tokio::spawn(worker.run());
        tokio::spawn(cleaner.run());

        info!("Sync agent started");
        Ok(())
    }

    /// Stops the background tasks gracefully (between ticks).
    ///
    /// An in-flight catalog call is awaited by its worker before the
    /// loop observes the signal; it cannot be aborted mid-call.
    pub async fn shutdown(&mut self) -> SyncResult<()> {
        info!("Shutting down sync agent");

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.shutdown().await;
        }

        if let Some(handle) = self.cleaner_handle.take() {
            let _ = handle.shutdown().await;
        }

        info!("Sync agent stopped");
        Ok(())
    }

    /// Returns the status surface polled by operational UI.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let circuit_state = self
            .breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .state();

        Ok(SyncStatus {
            auto_sync_enabled: self.config.worker.auto_sync_enabled,
            is_running: self.worker_handle.is_some(),
            circuit_state,
            pending_count: self.service.pending_count().await?,
            dead_letter_count: self.service.dead_letter_count().await?,
            health: self.health.snapshot(),
        })
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a SyncAgent with options.
pub struct SyncAgentBuilder {
    config: SyncConfig,
    db: Option<Database>,
    client: Option<Arc<dyn CatalogClient>>,
}

impl SyncAgentBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: SyncConfig) -> Self {
        SyncAgentBuilder {
            config,
            db: None,
            client: None,
        }
    }

    /// Sets the database connection.
    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Sets the catalog client.
    pub fn with_client(mut self, client: Arc<dyn CatalogClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the SyncAgent.
    pub fn build(self) -> SyncResult<SyncAgent> {
        let db = self
            .db
            .ok_or_else(|| SyncError::InvalidConfig("Database required".into()))?;
        let client = self
            .client
            .ok_or_else(|| SyncError::InvalidConfig("Catalog client required".into()))?;

        SyncAgent::new(self.config, db, client)
    }
}

// =============================================================================
// Tests
// =============================================================================
