//! # Combined Retry + Circuit Breaker
//!
//! Composes the two layers in the order that keeps their accounting
//! honest: the breaker guards the *whole* retry sequence, not each
//! attempt.
//!
//! ```text
//!     execute(op)
//!         │
//!         ▼
//!     CircuitBreaker ──(open)──► Err(CircuitOpen), op never invoked
//!         │
//!         ▼
//!     RetryHandler ── attempt 1 ─✗─ backoff ── attempt 2 ─✓
//!         │
//!         ▼
//!     one success / one failure recorded by the breaker
//! ```
//!
//! An upstream that recovers within the attempt budget therefore never
//! moves the breaker at all, and an upstream that exhausts every attempt
//! costs exactly one unit of the failure streak, however many attempts
//! the retry layer burned.

use std::future::Future;

use crate::breaker::CircuitBreaker;
use crate::error::{BoxError, PacerError};
use crate::retry::RetryHandler;

/// Retry loop wrapped in a circuit breaker.
///
/// # Examples
///
/// ```rust
/// use pacer::{CircuitBreaker, RetryConfig, RetryHandler, RetryWithCircuitBreaker};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), pacer::PacerError> {
/// let guard = RetryWithCircuitBreaker::new(
///     RetryHandler::new(RetryConfig::new(3)),
///     CircuitBreaker::new(5, Duration::from_secs(30)),
/// );
///
/// let value = guard
///     .execute(|| async { Ok::<_, pacer::BoxError>("response") })
///     .await?;
/// assert_eq!(value, "response");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RetryWithCircuitBreaker {
    retry: RetryHandler,
    breaker: CircuitBreaker,
}

impl RetryWithCircuitBreaker {
    /// Combines a retry handler and a circuit breaker.
    pub fn new(retry: RetryHandler, breaker: CircuitBreaker) -> Self {
        Self { retry, breaker }
    }

    /// The inner retry layer.
    pub fn retry(&self) -> &RetryHandler {
        &self.retry
    }

    /// The outer breaker layer.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `op` through the retry loop, guarded by the breaker.
    ///
    /// # Errors
    ///
    /// - [`PacerError::CircuitOpen`] if the breaker rejects the sequence;
    ///   `op` is never invoked.
    /// - [`PacerError::RetryExhausted`] or [`PacerError::NonRetryable`]
    ///   from the retry layer; either counts as one failure against the
    ///   breaker's streak.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, PacerError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, BoxError>> + Send,
    {
        self.breaker.execute(|| self.retry.execute(op)).await
    }
}
