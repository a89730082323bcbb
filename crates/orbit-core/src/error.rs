//! # Error Types
//!
//! Domain-specific error types for orbit-core.
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (channel, reason, etc.)
//! 3. Errors are enum variants, never bare Strings

use thiserror::Error;

/// Core domain errors.
///
/// These represent violations of the queue's wire contracts: unknown
/// routing values and payloads that can never be delivered. They are the
/// inputs to dead-letter routing at dispatch time.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Stored status string does not match any lifecycle state.
    #[error("Unknown queue status: '{0}'")]
    UnknownStatus(String),

    /// Channel string has no registered handler.
    #[error("Unknown channel: '{0}'")]
    UnknownChannel(String),

    /// Direction string is not a recognized flow orientation.
    #[error("Unknown direction: '{0}'")]
    UnknownDirection(String),

    /// Payload failed to parse or failed validation.
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// A backoff policy needs at least one delay entry.
    #[error("Backoff sequence must not be empty")]
    EmptyBackoffSequence,
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = CoreError::UnknownChannel("Foo".to_string());
        assert_eq!(err.to_string(), "Unknown channel: 'Foo'");

        let err = CoreError::InvalidPayload {
            reason: "ProductId must be positive, got -1".to_string(),
        };
        assert!(err.to_string().contains("ProductId"));
    }
}
