//! # Circuit Breaker
//!
//! Stops hammering an upstream that is already failing. After
//! `failure_threshold` consecutive failures the circuit opens and calls are
//! rejected outright; after `reset_timeout` one probe call is let through,
//! and its outcome decides whether the circuit closes again.
//!
//! ```text
//!     State Machine:
//!
//!                  failures < threshold
//!                 ┌─────────┐
//!                 ▼         │
//!              ┌──────────────┐
//!       ┌─────►│    CLOSED    │
//!       │      └──────┬───────┘
//!       │             │ failures ≥ threshold
//!       │             ▼
//!       │      ┌──────────────┐◄──────────┐
//!       │      │     OPEN     │           │ probe fails
//!       │      └──────┬───────┘           │
//!       │             │ reset_timeout     │
//!       │             ▼ elapsed           │
//!       │      ┌──────────────┐───────────┘
//!       └──────┤   HALF-OPEN  │
//!   probe      └──────────────┘
//!   succeeds
//! ```
//!
//! The breaker serializes the guarded calls of one instance: the lock taken
//! for the state decision stays held through the call itself, so exactly
//! one probe runs in the half-open state and no burst can slip through in
//! the instant before a failure is recorded. Wrap independent upstreams in
//! independent breakers.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::PacerError;

/// Where the breaker currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through; failures are being counted.
    Closed,
    /// Calls are rejected without invoking the operation.
    Open,
    /// One probe call is allowed through to test recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
            Self::HalfOpen => f.write_str("half-open"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
}

/// Consecutive-failure circuit breaker guarding one upstream.
///
/// # Examples
///
/// ```rust
/// use pacer::{CircuitBreaker, BoxError};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), pacer::PacerError> {
/// let breaker = CircuitBreaker::new(5, Duration::from_secs(30));
///
/// let value = breaker
///     .execute(|| async { Ok::<_, BoxError>("response") })
///     .await?;
/// assert_eq!(value, "response");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// A `failure_threshold` of 0 is treated as 1: the first failure opens
    /// the circuit.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
            }),
        }
    }

    /// Consecutive failures required to open the circuit.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Cool-down before an open circuit allows a probe.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// The current state.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// The current consecutive-failure streak.
    pub async fn failure_count(&self) -> u32 {
        self.inner.lock().await.failures
    }

    /// Force-closes the circuit and clears the failure streak.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.last_failure = None;
        info!("circuit breaker manually reset");
    }

    /// Runs `op` if the circuit allows it, recording the outcome.
    ///
    /// The state decision and the guarded call happen under one lock, so
    /// concurrent callers of the same breaker serialize. A rejected call
    /// returns [`PacerError::CircuitOpen`] without invoking `op` at all.
    ///
    /// The operation's error type converts into [`PacerError`], which lets
    /// both raw [`BoxError`](crate::BoxError) operations and already-wrapped
    /// layers (like a retry handler) sit behind the same breaker.
    ///
    /// # Errors
    ///
    /// - [`PacerError::CircuitOpen`] if the circuit is open and the reset
    ///   timeout has not elapsed.
    /// - The operation's own error, converted, if the call fails.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, PacerError>
    where
        E: Into<PacerError>,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let mut inner = self.inner.lock().await;

        if inner.state == CircuitState::Open {
            match inner.last_failure {
                Some(at) if at.elapsed() >= self.reset_timeout => {
                    inner.state = CircuitState::HalfOpen;
                    info!("reset timeout elapsed, probing the upstream");
                }
                _ => {
                    debug!("circuit open, rejecting call");
                    return Err(PacerError::CircuitOpen);
                }
            }
        }

        match op().await {
            Ok(value) => {
                if inner.state == CircuitState::HalfOpen {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.last_failure = None;
                    info!("probe succeeded, circuit closed");
                }
                Ok(value)
            }
            Err(err) => {
                inner.failures += 1;
                inner.last_failure = Some(Instant::now());

                let should_open =
                    inner.state == CircuitState::HalfOpen || inner.failures >= self.failure_threshold;
                if should_open && inner.state != CircuitState::Open {
                    warn!(
                        failures = inner.failures,
                        threshold = self.failure_threshold,
                        "circuit opened"
                    );
                    inner.state = CircuitState::Open;
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn fail(breaker: &CircuitBreaker) -> PacerError {
        breaker
            .execute(|| async { Err::<(), BoxError>("upstream down".into()) })
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_closed_passes_results_through() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));

        let value = breaker
            .execute(|| async { Ok::<_, BoxError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(breaker.state().await, CircuitState::Closed);

        let err = fail(&breaker).await;
        assert!(matches!(err, PacerError::Operation(_)));
        assert_eq!(breaker.failure_count().await, 1);
    }

    #[tokio::test]
    async fn test_opens_at_threshold_and_rejects() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));

        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Rejected without invoking the operation.
        let invoked = AtomicU32::new(0);
        let err = breaker
            .execute(|| {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, BoxError>(()) }
            })
            .await
            .unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_success_closes_and_clears() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));

        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;

        let value = breaker
            .execute(|| async { Ok::<_, BoxError>("recovered") })
            .await
            .unwrap();
        assert_eq!(value, "recovered");
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));

        fail(&breaker).await;
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        // A single probe failure is enough, threshold notwithstanding.
        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        let err = breaker
            .execute(|| async { Ok::<_, BoxError>(()) })
            .await
            .unwrap_err();
        assert!(err.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_success_does_not_clear_the_streak() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));

        fail(&breaker).await;
        fail(&breaker).await;
        breaker
            .execute(|| async { Ok::<_, BoxError>(()) })
            .await
            .unwrap();

        // The streak survives closed-state successes; one more failure
        // still opens the circuit.
        assert_eq!(breaker.failure_count().await, 2);
        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_manual_reset() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(3600));

        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);

        breaker
            .execute(|| async { Ok::<_, BoxError>(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_threshold_behaves_as_one() {
        let breaker = CircuitBreaker::new(0, Duration::from_secs(30));
        assert_eq!(breaker.failure_threshold(), 1);

        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }
}
