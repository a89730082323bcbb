//! # Catalog Client Boundary
//!
//! The trait the dispatch worker calls to push changes to the remote
//! catalog, plus the typed error it reports back.
//!
//! Concrete transports (the production HTTP client, test doubles) live
//! outside this crate; the engine only depends on this seam. Failures
//! come back as a typed [`ClientError`] that classifies itself into a
//! [`RetryClass`], so retry decisions never parse error message text.

use async_trait::async_trait;
use thiserror::Error;

use orbit_core::RetryClass;

// =============================================================================
// Client Error
// =============================================================================

/// A failed catalog call, classified at the transport boundary.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The catalog throttled us (HTTP 429 or an explicit throttle signal).
    #[error("Rate limited by catalog: {message}")]
    RateLimited {
        message: String,
        /// Server-suggested delay, used as a backoff override when present.
        retry_after_secs: Option<u64>,
    },

    /// Timeout, connectivity loss, or a 5xx response. Worth retrying.
    #[error("Transient catalog failure: {message}")]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// The catalog rejected the request outright (4xx other than 429).
    /// Retrying the same payload can never succeed.
    #[error("Permanent catalog rejection: {message}")]
    Permanent {
        status: Option<u16>,
        message: String,
    },
}

impl ClientError {
    /// Maps an HTTP status to the matching error classification.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ClientError::RateLimited {
                message,
                retry_after_secs: None,
            },
            s if s >= 500 => ClientError::Transient {
                status: Some(s),
                message,
            },
            s => ClientError::Permanent {
                status: Some(s),
                message,
            },
        }
    }

    /// A timeout or connection failure with no HTTP response.
    pub fn timeout(message: impl Into<String>) -> Self {
        ClientError::Transient {
            status: None,
            message: message.into(),
        }
    }

    /// The retry classification of this failure.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            ClientError::RateLimited { .. } => RetryClass::RateLimited,
            ClientError::Transient { .. } => RetryClass::Transient,
            ClientError::Permanent { .. } => RetryClass::Permanent,
        }
    }

    /// The HTTP status code, when one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::RateLimited { .. } => Some(429),
            ClientError::Transient { status, .. } => *status,
            ClientError::Permanent { status, .. } => *status,
        }
    }

    /// Server-suggested retry delay, if the catalog provided one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ClientError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for catalog calls.
pub type ClientResult<T> = Result<T, ClientError>;

// =============================================================================
// Catalog Client Trait
// =============================================================================

/// Remote catalog operations consumed by the dispatch worker.
///
/// Implementations must be idempotent per (operation, product): the queue
/// guarantees at-least-once delivery, so a retried call may repeat an
/// update the catalog already applied.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Pushes a stock level for a product.
    async fn update_stock(&self, product_id: i64, quantity: i64) -> ClientResult<()>;

    /// Pushes a price for a product.
    async fn update_price(&self, product_id: i64, price: f64) -> ClientResult<()>;
}

// =============================================================================
// Unit Tests
// =============================================================================
