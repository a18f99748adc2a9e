//! # Error Taxonomy
//!
//! All failure modes of the resilience layer in one place. The guiding rule:
//! an admission denial is **not** an error (limiters report it as a wait
//! duration), while everything here is a real failure the caller must
//! handle.
//!
//! ```text
//!     Error Disposition Guide:
//!
//!     CircuitOpen ──────► Skip / fall back (operation was never invoked)
//!     RetryExhausted ───► Alert / surface (operation kept failing)
//!     NonRetryable ─────► Surface immediately (wrong kind of failure)
//!     Operation ────────► The wrapped call's own error, passed through
//!     Unknown* / Invalid* ► Fix your configuration
//! ```
//!
//! Layers never swallow errors: a non-retryable or exhausted failure
//! propagates unchanged, carrying the underlying error so the caller
//! decides final disposition (log, surface, fail the enclosing request).

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error type used for the wrapped operation's failures.
///
/// Operations passed into [`RetryHandler`](crate::RetryHandler),
/// [`CircuitBreaker`](crate::CircuitBreaker) and
/// [`RetryWithCircuitBreaker`](crate::RetryWithCircuitBreaker) report their
/// failures as this type, so the layer stays agnostic to the caller's
/// domain errors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced by the resilience layer.
///
/// Variants are deliberately distinguishable so callers can apply different
/// fallback logic per failure class, e.g. treat [`PacerError::CircuitOpen`]
/// as "skip quietly" while [`PacerError::RetryExhausted`] pages someone.
#[derive(Debug, Error)]
pub enum PacerError {
    /// The circuit breaker is tripped and its reset timeout has not
    /// elapsed. The wrapped operation was **not** invoked.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Every configured attempt failed. Carries the attempt count and the
    /// last error observed from the wrapped operation.
    #[error("all {attempts} attempts failed: {last_error}")]
    RetryExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The error returned by the final attempt.
        last_error: BoxError,
    },

    /// The wrapped operation failed with an error class outside the
    /// configured retryable set. Propagated immediately without retry.
    #[error("non-retryable error: {0}")]
    NonRetryable(BoxError),

    /// The wrapped operation's own error, passed through unchanged by a
    /// layer that performs no retries of its own (the circuit breaker).
    #[error("operation failed: {0}")]
    Operation(BoxError),

    /// No rate limiter is registered under the requested name.
    #[error("no rate limiter registered under name: {0}")]
    UnknownLimiter(String),

    /// A rate-limit algorithm name did not match any known variant.
    #[error("unknown rate limit algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A backoff strategy name did not match any known variant.
    #[error("unknown backoff strategy: {0}")]
    UnknownStrategy(String),

    /// A policy object failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl From<BoxError> for PacerError {
    /// Wraps a raw operation error for layers that pass it through
    /// unchanged (see [`PacerError::Operation`]).
    fn from(err: BoxError) -> Self {
        PacerError::Operation(err)
    }
}

impl PacerError {
    /// Returns `true` if this error means the operation was never invoked.
    ///
    /// Useful for callers that want to distinguish "the remote service
    /// failed" from "we refused to even try".
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PacerError::CircuitOpen)
    }

    /// Returns the underlying operation error, if this variant carries one.
    pub fn operation_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            PacerError::RetryExhausted { last_error, .. } => Some(last_error.as_ref()),
            PacerError::NonRetryable(err) | PacerError::Operation(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PacerError::UnknownLimiter("api".to_string());
        assert!(err.to_string().contains("api"));

        let err = PacerError::RetryExhausted {
            attempts: 3,
            last_error: "connection refused".into(),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_operation_error_accessor() {
        let err = PacerError::NonRetryable("bad credentials".into());
        assert!(err.operation_error().is_some());

        let err = PacerError::CircuitOpen;
        assert!(err.operation_error().is_none());
        assert!(err.is_circuit_open());
    }

    #[test]
    fn test_from_box_error() {
        let raw: BoxError = "boom".into();
        let err: PacerError = raw.into();
        assert!(matches!(err, PacerError::Operation(_)));
    }
}
