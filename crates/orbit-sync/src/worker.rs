//! # Dispatch Worker
//!
//! Drains the sync queue one item per tick and pushes each change to the
//! remote catalog.
//!
//! ## Tick Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dispatch Tick Flow                               │
//! │                                                                         │
//! │  interval tick (+ random pre-tick jitter)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  circuit breaker permits calls? ──no──► skip tick (nothing claimed)    │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  claim oldest eligible pending item ──none──► idle                     │
//! │       │ item                                                            │
//! │       ▼                                                                 │
//! │  route by (channel, direction)                                         │
//! │       │                                                                 │
//! │       ├── ("Stock","Out")   → parse {ProductId, Quantity}              │
//! │       ├── ("Product","Out") → parse {ProductId, Price}                 │
//! │       └── anything else    → dead-letter (never retried)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  invalid payload? → dead-letter with a descriptive error               │
//! │       │ valid                                                           │
//! │       ▼                                                                 │
//! │  call catalog client (measured, telemetry-logged, breaker-recorded)    │
//! │       │                                                                 │
//! │       ├── Ok          → mark succeeded  + health.on_success            │
//! │       ├── RateLimited → mark failed (doubled backoff) + on_failure     │
//! │       ├── Transient   → mark failed (standard backoff) + on_failure    │
//! │       └── Permanent   → dead-letter + on_failure                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One item per tick keeps dispatch strictly ordered and the store free
//! of in-process races; the loop itself is the re-entrancy guard. Store
//! failures inside a tick are classified, logged, and swallowed - the
//! loop is never allowed to die. Shutdown lands between ticks; an
//! in-flight catalog call is awaited, not aborted.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use chrono::Utc;
use orbit_core::{Channel, Direction, PricePayload, QueueItem, RetryClass, StockPayload};

use crate::breaker::CircuitBreaker;
use crate::client::CatalogClient;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::health::HealthTracker;
use crate::jitter;
use crate::service::QueueService;
use crate::telemetry::TelemetryLogger;

// =============================================================================
// Tick Outcome
// =============================================================================

/// What a single dispatch cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No eligible item was waiting.
    Idle,

    /// The circuit breaker refused calls; nothing was claimed.
    CircuitOpen,

    /// One item was claimed and an outcome was recorded for it.
    Dispatched,
}

// =============================================================================
// Prepared Call
// =============================================================================

/// A routed, validated catalog call ready to execute.
enum PreparedCall {
    Stock(StockPayload),
    Price(PricePayload),
}

impl PreparedCall {
    fn endpoint(&self) -> &'static str {
        match self {
            PreparedCall::Stock(_) => "catalog/stock",
            PreparedCall::Price(_) => "catalog/price",
        }
    }
}

// =============================================================================
// Dispatch Worker
// =============================================================================

/// Background worker that drains the sync queue.
pub struct DispatchWorker {
    /// Queue operations and backoff computation.
    service: Arc<QueueService>,

    /// Remote catalog boundary.
    client: Arc<dyn CatalogClient>,

    /// Rolling health counters (shared with dashboards).
    health: Arc<HealthTracker>,

    /// Circuit breaker (shared with the status surface).
    breaker: Arc<Mutex<CircuitBreaker>>,

    /// Best-effort call/audit logging.
    telemetry: TelemetryLogger,

    /// Interval between dispatch ticks.
    poll_interval: Duration,

    /// Upper bound of the random pre-tick delay.
    tick_jitter: Duration,

    /// Shutdown receiver.
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the dispatch worker.
#[derive(Clone)]
pub struct DispatchWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatchWorkerHandle {
    /// Triggers graceful shutdown; the worker stops between ticks.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Worker shutdown channel closed".into()))
    }
}

impl DispatchWorker {
    /// Creates a new dispatch worker and returns a handle.
    pub fn new(
        service: Arc<QueueService>,
        client: Arc<dyn CatalogClient>,
        health: Arc<HealthTracker>,
        breaker: Arc<Mutex<CircuitBreaker>>,
        telemetry: TelemetryLogger,
        config: &SyncConfig,
    ) -> (Self, DispatchWorkerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = DispatchWorker {
            service,
            client,
            health,
            breaker,
            telemetry,
            poll_interval: config.poll_interval(),
            tick_jitter: config.tick_jitter(),
            shutdown_rx,
        };

        (worker, DispatchWorkerHandle { shutdown_tx })
    }

    /// Runs the dispatch loop.
    ///
    /// This should be spawned as a background task. The loop survives
    /// every tick failure; only a shutdown signal stops it.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Dispatch worker starting"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Desynchronize processes sharing one store.
                    let delay = jitter::duration_up_to(self.tick_jitter);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    match self.tick().await {
                        Ok(TickOutcome::Dispatched) => debug!("Dispatch tick processed an item"),
                        Ok(TickOutcome::Idle) => {}
                        Ok(TickOutcome::CircuitOpen) => debug!("Circuit open, dispatch skipped"),
                        Err(e) => self.log_tick_error(&e),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Dispatch worker shutting down");
                    break;
                }
            }
        }

        info!("Dispatch worker stopped");
    }

    /// Runs a single dispatch cycle.
    pub async fn tick(&self) -> SyncResult<TickOutcome> {
        // Gate on the breaker BEFORE claiming so items don't sit in
        // processing while the remote is known to be down.
        let (allowed, transition) = self.lock_breaker().permits_call(Utc::now());
        if let Some(t) = transition {
            self.telemetry.log_circuit_transition(&t, None).await;
        }
        if !allowed {
            return Ok(TickOutcome::CircuitOpen);
        }

        let item = match self.service.claim_next_pending().await? {
            Some(item) => item,
            None => return Ok(TickOutcome::Idle),
        };

        self.dispatch(&item).await?;
        Ok(TickOutcome::Dispatched)
    }

    /// Routes a claimed item and records its outcome.
    async fn dispatch(&self, item: &QueueItem) -> SyncResult<()> {
        let call = match Self::prepare(item) {
            Ok(call) => call,
            Err(reason) => {
                // Never reached the remote: no breaker sample, but the
                // failure is visible on the health surface.
                self.health.on_failure(&reason);
                self.service.mark_dead_lettered(&item.id, &reason).await?;
                return Ok(());
            }
        };

        let endpoint = call.endpoint();
        let correlation_id = item.correlation_id.as_deref();

        self.lock_breaker().begin_call();

        let started = Instant::now();
        let result = match &call {
            PreparedCall::Stock(p) => self.client.update_stock(p.product_id, p.quantity).await,
            PreparedCall::Price(p) => self.client.update_price(p.product_id, p.price).await,
        };
        let elapsed = started.elapsed();

        let status_code = result.as_ref().err().and_then(|e| e.status_code());
        self.telemetry
            .log_api_call(
                endpoint,
                "POST",
                result.is_ok(),
                status_code,
                elapsed,
                &item.channel,
                correlation_id,
            )
            .await;

        let transition = self.lock_breaker().record_outcome(result.is_ok(), Utc::now());
        if let Some(t) = transition {
            self.telemetry.log_circuit_transition(&t, correlation_id).await;
        }

        match result {
            Ok(()) => {
                self.health.on_success();
                self.service.mark_succeeded(&item.id).await?;
                debug!(id = %item.id, endpoint, "Dispatched queue item");
            }
            Err(err) => {
                let message = err.to_string();
                self.health.on_failure(&message);

                match err.retry_class() {
                    RetryClass::Permanent => {
                        self.service.mark_dead_lettered(&item.id, &message).await?;
                    }
                    class => {
                        self.service
                            .mark_failed(&item.id, &message, class, err.retry_after_secs())
                            .await?;
                        warn!(
                            id = %item.id,
                            endpoint,
                            class = %class,
                            error = %message,
                            "Catalog call failed, item scheduled for retry"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Parses routing and payload; an Err is a dead-letter reason.
    fn prepare(item: &QueueItem) -> Result<PreparedCall, String> {
        let route = (
            item.channel.parse::<Channel>(),
            item.direction.parse::<Direction>(),
        );

        match route {
            (Ok(Channel::Stock), Ok(Direction::Out)) => StockPayload::parse(&item.payload)
                .map(PreparedCall::Stock)
                .map_err(|e| e.to_string()),

            (Ok(Channel::Product), Ok(Direction::Out)) => PricePayload::parse(&item.payload)
                .map(PreparedCall::Price)
                .map_err(|e| e.to_string()),

            _ => Err(format!(
                "Unsupported channel/direction: {}/{}",
                item.channel, item.direction
            )),
        }
    }

    /// Classifies a tick failure before logging it; the loop carries on
    /// either way.
    fn log_tick_error(&self, err: &SyncError) {
        match err {
            SyncError::Database(db) if db.is_missing_schema() => {
                error!(error = %db, "Sync store schema missing - run migrations before enabling sync");
            }
            SyncError::Database(db) if db.is_connectivity() => {
                warn!(error = %db, "Sync store unavailable, retrying next tick");
            }
            other => {
                error!(error = %other, "Dispatch tick failed");
            }
        }
    }

    fn lock_breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use orbit_core::{BackoffPolicy, CircuitState, QueueStatus};
    use orbit_db::{Database, DbConfig};

    use crate::client::{ClientError, ClientResult};

    /// Catalog client double that replays scripted results and counts calls.
    struct ScriptedClient {
        responses: tokio::sync::Mutex<VecDeque<ClientResult<()>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: Vec<ClientResult<()>>) -> Self {
            ScriptedClient {
                responses: tokio::sync::Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn always_ok() -> Self {
            Self::new(vec![])
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn next_response(&self) -> ClientResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().await.pop_front().unwrap_or(Ok(()))
        }
    }

    #[async_trait::async_trait]
    impl CatalogClient for ScriptedClient {
        async fn update_stock(&self, _product_id: i64, _quantity: i64) -> ClientResult<()> {
            self.next_response().await
        }

        async fn update_price(&self, _product_id: i64, _price: f64) -> ClientResult<()> {
            self.next_response().await
        }
    }

    struct Harness {
        db: Database,
        service: Arc<QueueService>,
        health: Arc<HealthTracker>,
        breaker: Arc<Mutex<CircuitBreaker>>,
        client: Arc<ScriptedClient>,
        worker: DispatchWorker,
        _handle: DispatchWorkerHandle,
    }

    async fn harness(client: ScriptedClient, config: SyncConfig) -> Harness {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = Arc::new(QueueService::new(
            db.clone(),
            BackoffPolicy::new(config.retry.backoff_seconds.clone()).unwrap(),
        ));
        let health = Arc::new(HealthTracker::new());
        let breaker = Arc::new(Mutex::new(CircuitBreaker::new(config.breaker.clone())));
        let telemetry = TelemetryLogger::new(db.telemetry());
        let client = Arc::new(client);

        let (worker, handle) = DispatchWorker::new(
            service.clone(),
            client.clone(),
            health.clone(),
            breaker.clone(),
            telemetry,
            &config,
        );

        Harness {
            db,
            service,
            health,
            breaker,
            client,
            worker,
            _handle: handle,
        }
    }

    fn test_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.retry.backoff_seconds = vec![30, 60, 300];
        config.worker.poll_interval_secs = 1;
        config.worker.tick_jitter_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_idle_tick_claims_nothing() {
        let h = harness(ScriptedClient::always_ok(), test_config()).await;
        assert_eq!(h.worker.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(h.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_price_dispatch() {
        // Scenario: a price update dispatches cleanly.
        let h = harness(ScriptedClient::always_ok(), test_config()).await;
        let id = h
            .service
            .enqueue("Product", "Out", r#"{"ProductId":7,"Price":19.99}"#, None)
            .await
            .unwrap();

        assert_eq!(h.worker.tick().await.unwrap(), TickOutcome::Dispatched);

        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Succeeded);

        let snap = h.health.snapshot();
        assert_eq!(snap.processed_count, 1);
        assert_eq!(snap.consecutive_failures, 0);

        // One telemetry row for the outbound call.
        assert_eq!(h.db.telemetry().count_api_calls().await.unwrap(), 1);
        assert_eq!(h.client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_failure_retries_with_doubled_backoff() {
        // Scenario: first dispatch of a stock change hits 429.
        let h = harness(
            ScriptedClient::new(vec![Err(ClientError::RateLimited {
                message: "429 Too Many Requests".into(),
                retry_after_secs: None,
            })]),
            test_config(),
        )
        .await;

        let id = h
            .service
            .enqueue("Stock", "Out", r#"{"ProductId":42,"Quantity":5}"#, None)
            .await
            .unwrap();

        let before = Utc::now();
        assert_eq!(h.worker.tick().await.unwrap(), TickOutcome::Dispatched);

        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Pending);
        assert_eq!(stored.retry_count, 1);
        assert!(stored.last_error.as_deref().unwrap().contains("Rate limited"));

        // Doubled first delay (2 x 30s) plus up to 20% jitter.
        assert!(stored.next_attempt_at >= before + chrono::Duration::seconds(60));
        assert!(stored.next_attempt_at <= Utc::now() + chrono::Duration::seconds(73));

        assert_eq!(h.health.snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_retry_after_hint_overrides_schedule() {
        let h = harness(
            ScriptedClient::new(vec![Err(ClientError::RateLimited {
                message: "throttled".into(),
                retry_after_secs: Some(10),
            })]),
            test_config(),
        )
        .await;

        let id = h
            .service
            .enqueue("Stock", "Out", r#"{"ProductId":1,"Quantity":1}"#, None)
            .await
            .unwrap();

        let before = Utc::now();
        h.worker.tick().await.unwrap();

        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        // Override 10s, doubled for rate limiting, plus jitter: 20-24s.
        assert!(stored.next_attempt_at >= before + chrono::Duration::seconds(20));
        assert!(stored.next_attempt_at <= Utc::now() + chrono::Duration::seconds(25));
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let h = harness(
            ScriptedClient::new(vec![
                Err(ClientError::timeout("request timed out")),
                Ok(()),
            ]),
            test_config(),
        )
        .await;

        let id = h
            .service
            .enqueue("Stock", "Out", r#"{"ProductId":3,"Quantity":9}"#, None)
            .await
            .unwrap();

        h.worker.tick().await.unwrap();
        assert_eq!(h.health.snapshot().consecutive_failures, 1);

        // Make the item eligible again by claiming at a future time.
        let retry_at = Utc::now() + chrono::Duration::seconds(40);
        let reclaimed = h.db.queue().claim_next(retry_at).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
        h.worker.dispatch(&reclaimed).await.unwrap();

        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Succeeded);

        let snap = h.health.snapshot();
        assert_eq!(snap.processed_count, 1);
        assert_eq!(snap.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_permanent_rejection_dead_letters() {
        let h = harness(
            ScriptedClient::new(vec![Err(ClientError::from_status(404, "unknown product"))]),
            test_config(),
        )
        .await;

        let id = h
            .service
            .enqueue("Stock", "Out", r#"{"ProductId":9,"Quantity":2}"#, None)
            .await
            .unwrap();

        h.worker.tick().await.unwrap();

        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::DeadLettered);
        assert_eq!(h.service.dead_letter_count().await.unwrap(), 1);

        // Never claimed again.
        assert_eq!(h.worker.tick().await.unwrap(), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_unsupported_channel_dead_letters_without_calling_remote() {
        // Scenario: Enqueue("Foo","Out","{}") is permanently undeliverable.
        let h = harness(ScriptedClient::always_ok(), test_config()).await;
        let id = h.service.enqueue("Foo", "Out", "{}", None).await.unwrap();

        assert_eq!(h.worker.tick().await.unwrap(), TickOutcome::Dispatched);

        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::DeadLettered);
        assert!(stored
            .last_error
            .as_deref()
            .unwrap()
            .contains("Unsupported channel/direction: Foo/Out"));

        // The remote was never involved.
        assert_eq!(h.client.call_count(), 0);
        assert_eq!(h.db.telemetry().count_api_calls().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reserved_inbound_direction_dead_letters() {
        let h = harness(ScriptedClient::always_ok(), test_config()).await;
        let id = h
            .service
            .enqueue("Stock", "In", r#"{"ProductId":1,"Quantity":1}"#, None)
            .await
            .unwrap();

        h.worker.tick().await.unwrap();
        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::DeadLettered);
        assert_eq!(h.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_dead_letters_with_descriptive_error() {
        let h = harness(ScriptedClient::always_ok(), test_config()).await;
        let id = h
            .service
            .enqueue("Stock", "Out", r#"{"ProductId":0,"Quantity":5}"#, None)
            .await
            .unwrap();

        h.worker.tick().await.unwrap();

        let stored = h.db.queue().find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::DeadLettered);
        assert!(stored.last_error.as_deref().unwrap().contains("ProductId"));
        assert_eq!(h.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_breaker_opens_and_skips_dispatch() {
        let mut config = test_config();
        config.breaker.min_throughput = 2;
        config.breaker.window_size = 8;

        let h = harness(
            ScriptedClient::new(vec![
                Err(ClientError::timeout("down")),
                Err(ClientError::timeout("down")),
            ]),
            config,
        )
        .await;

        for _ in 0..2 {
            h.service
                .enqueue("Stock", "Out", r#"{"ProductId":1,"Quantity":1}"#, None)
                .await
                .unwrap();
        }

        // Two failing dispatches trip the breaker (the first item backs
        // off after its failure, so the second tick claims the other).
        h.worker.tick().await.unwrap();
        h.worker.tick().await.unwrap();
        assert_eq!(h.breaker.lock().unwrap().state(), CircuitState::Open);

        // The open transition was audit-logged.
        assert_eq!(h.db.telemetry().count_circuit_transitions().await.unwrap(), 1);

        // A waiting item is NOT claimed while the circuit is open.
        h.service
            .enqueue("Stock", "Out", r#"{"ProductId":2,"Quantity":1}"#, None)
            .await
            .unwrap();
        assert_eq!(h.worker.tick().await.unwrap(), TickOutcome::CircuitOpen);
        assert!(h.service.pending_count().await.unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_shutdown() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("orbit_sync=debug")
            .with_test_writer()
            .try_init();

        let mut config = test_config();
        config.worker.poll_interval_secs = 1;

        let h = harness(ScriptedClient::always_ok(), config).await;
        let handle = h._handle.clone();

        let task = tokio::spawn(h.worker.run());
        handle.shutdown().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("worker did not stop after shutdown")
            .unwrap();
    }
}
