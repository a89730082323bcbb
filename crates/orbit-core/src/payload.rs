//! # Payload Schemas
//!
//! Wire schemas for the payloads carried by queue items.
//!
//! Payloads are stored opaque on the queue (enqueue never inspects them)
//! and parsed at dispatch time. Field names follow the catalog API's
//! PascalCase contract:
//!
//! ```json
//! { "ProductId": 42, "Quantity": 5 }     // Stock/Out
//! { "ProductId": 7, "Price": 19.99 }     // Product/Out
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// =============================================================================
// Stock
// =============================================================================

/// Payload of a Stock/Out item: push a stock level to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StockPayload {
    /// Catalog product id. Must be positive.
    pub product_id: i64,

    /// Absolute stock level. Negative values are allowed (oversell
    /// corrections propagate like any other change).
    pub quantity: i64,
}

impl StockPayload {
    /// Parses and validates a raw payload string.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let payload: StockPayload =
            serde_json::from_str(raw).map_err(|e| CoreError::InvalidPayload {
                reason: format!("malformed stock payload: {e}"),
            })?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.product_id <= 0 {
            return Err(CoreError::InvalidPayload {
                reason: format!("ProductId must be positive, got {}", self.product_id),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Price
// =============================================================================

/// Payload of a Product/Out item: push a price to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PricePayload {
    /// Catalog product id. Must be positive.
    pub product_id: i64,

    /// New unit price in the catalog's currency.
    pub price: f64,
}

impl PricePayload {
    /// Parses and validates a raw payload string.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let payload: PricePayload =
            serde_json::from_str(raw).map_err(|e| CoreError::InvalidPayload {
                reason: format!("malformed price payload: {e}"),
            })?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.product_id <= 0 {
            return Err(CoreError::InvalidPayload {
                reason: format!("ProductId must be positive, got {}", self.product_id),
            });
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CoreError::InvalidPayload {
                reason: format!("Price must be a non-negative number, got {}", self.price),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
