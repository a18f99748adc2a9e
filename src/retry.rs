//! # Retry With Backoff
//!
//! Re-invokes a failing operation until it succeeds or the attempt budget
//! runs out, sleeping a growing delay between attempts.
//!
//! ```text
//!     Attempt Timeline (exponential, base = 1s, jitter off):
//!
//!     try ──✗── wait 1s ── try ──✗── wait 2s ── try ──✓
//!      #1                   #2                   #3
//! ```
//!
//! ## Failure Classes
//!
//! Not every failure deserves a retry. An [`ErrorClassifier`] splits the
//! operation's errors into transient (timeouts, connection resets: retry)
//! and permanent (bad credentials, malformed requests: fail fast). A
//! permanent failure surfaces immediately as
//! [`PacerError::NonRetryable`]; running out of attempts surfaces as
//! [`PacerError::RetryExhausted`] carrying the last error observed.
//!
//! ## Jitter
//!
//! With jitter enabled (the default) each computed delay is multiplied by
//! a random factor in `[0.5, 1.5)` and clamped to `max_delay`, decorrelating
//! clients that started failing at the same moment.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{BoxError, PacerError};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffStrategy {
    /// `base_delay × 2^(attempt − 1)`: 1s, 2s, 4s, 8s, ...
    Exponential,
    /// `base_delay × attempt`: 1s, 2s, 3s, 4s, ...
    Linear,
    /// `base_delay × fib(attempt)`: 1s, 1s, 2s, 3s, 5s, 8s, ...
    Fibonacci,
    /// Uniformly random in `[base_delay, base_delay × attempt)`.
    Random,
}

impl BackoffStrategy {
    /// Stable string form, the inverse of [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exponential => "exponential",
            Self::Linear => "linear",
            Self::Fibonacci => "fibonacci",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackoffStrategy {
    type Err = PacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exponential" => Ok(Self::Exponential),
            "linear" => Ok(Self::Linear),
            "fibonacci" => Ok(Self::Fibonacci),
            "random" => Ok(Self::Random),
            other => Err(PacerError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Policy for a retry loop: how often, how long, and how the delay grows.
///
/// # Examples
///
/// ```rust
/// use pacer::{BackoffStrategy, RetryConfig};
/// use std::time::Duration;
///
/// let config = RetryConfig::new(5)
///     .with_base_delay(Duration::from_millis(200))
///     .with_strategy(BackoffStrategy::Fibonacci)
///     .without_jitter();
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total invocation budget, including the first attempt. At least 1.
    pub max_attempts: u32,

    /// Delay before the first re-attempt; the unit the strategy scales.
    pub base_delay: Duration,

    /// Hard ceiling every computed delay is clamped to, jitter included.
    pub max_delay: Duration,

    /// Whether to multiply each delay by a random factor in `[0.5, 1.5)`.
    pub jitter: bool,

    /// How the delay grows across attempts.
    pub strategy: BackoffStrategy,
}

impl RetryConfig {
    /// Creates a config with the given attempt budget and the defaults
    /// for everything else (1s base, 60s cap, jitter on, exponential).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sets the delay ceiling.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the growth strategy.
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Disables jitter, making every delay deterministic (except for the
    /// [`BackoffStrategy::Random`] strategy itself).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidConfig`] if:
    /// - `max_attempts` is 0
    /// - `base_delay` is zero
    /// - `max_delay` is below `base_delay`
    pub fn validate(&self) -> Result<(), PacerError> {
        if self.max_attempts == 0 {
            return Err(PacerError::InvalidConfig("max_attempts must be at least 1"));
        }
        if self.base_delay.is_zero() {
            return Err(PacerError::InvalidConfig("base_delay must be greater than 0"));
        }
        if self.max_delay < self.base_delay {
            return Err(PacerError::InvalidConfig(
                "max_delay must be at least base_delay",
            ));
        }
        Ok(())
    }

    /// Delay the strategy assigns to the given attempt (1-based), clamped
    /// to `max_delay`. Jitter is not applied here.
    ///
    /// For [`BackoffStrategy::Random`] this samples a fresh value on every
    /// call; the other strategies are deterministic.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(
            self.strategy_delay_secs(attempt)
                .min(self.max_delay.as_secs_f64()),
        )
    }

    /// Unclamped strategy delay in seconds. Jitter multiplies this value
    /// and only then does the `max_delay` clamp apply, so a saturated
    /// strategy delay still sleeps the full cap.
    fn strategy_delay_secs(&self, attempt: u32) -> f64 {
        let attempt = attempt.max(1);
        let base = self.base_delay.as_secs_f64();
        match self.strategy {
            BackoffStrategy::Exponential => base * 2f64.powi(attempt as i32 - 1),
            BackoffStrategy::Linear => base * attempt as f64,
            BackoffStrategy::Fibonacci => base * fibonacci(attempt),
            BackoffStrategy::Random => {
                let hi = base * attempt as f64;
                if hi > base {
                    rand::thread_rng().gen_range(base..hi)
                } else {
                    base
                }
            }
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
            strategy: BackoffStrategy::Exponential,
        }
    }
}

/// `fib(1) = 1, fib(2) = 1, fib(3) = 2, ...` in f64 so large attempt
/// numbers degrade to the clamp instead of overflowing.
fn fibonacci(n: u32) -> f64 {
    let (mut a, mut b) = (0f64, 1f64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

/// Splits an operation's failures into transient and permanent.
///
/// Any `Fn(&BoxError) -> bool` closure qualifies, so ad-hoc classifiers
/// need no type of their own:
///
/// ```rust
/// use pacer::{ErrorClassifier, BoxError};
///
/// let transient_only = |err: &BoxError| err.to_string().contains("timeout");
/// let err: BoxError = "connection timeout".into();
/// assert!(transient_only.retryable(&err));
/// ```
pub trait ErrorClassifier: Send + Sync {
    /// Returns `true` if the failure is worth another attempt.
    fn retryable(&self, err: &BoxError) -> bool;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&BoxError) -> bool + Send + Sync,
{
    fn retryable(&self, err: &BoxError) -> bool {
        self(err)
    }
}

/// Classifier that treats every failure as transient. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryAll;

impl ErrorClassifier for RetryAll {
    fn retryable(&self, _err: &BoxError) -> bool {
        true
    }
}

/// Retry bookkeeping for a [`RetryHandler`].
///
/// Counts retry events, not plain first-attempt successes: an operation
/// that works on the first try leaves every counter untouched. Each failed
/// retryable attempt records one failed event; a recovery after one or
/// more failures records one successful event.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    /// Retry events recorded: one per failed attempt, plus one per
    /// recovery.
    pub total_retries: u64,
    /// Calls to `execute` that succeeded after at least one failure.
    pub successful_retries: u64,
    /// Failed attempts that scheduled a backoff.
    pub failed_retries: u64,
    /// Calls cut short by a non-retryable failure.
    pub non_retryable: u64,
    /// Total time spent sleeping between attempts.
    pub total_delay: Duration,
    /// When the most recent retry event was recorded.
    pub last_retry: Option<Instant>,
    /// Message of the most recent failure that triggered a retry.
    pub last_error: Option<String>,
}

impl RetryStats {
    /// Fraction of retry events that were recoveries (0.0 to 1.0).
    ///
    /// Returns 0.0 before any retry event has been recorded.
    pub fn success_rate(&self) -> f64 {
        if self.total_retries == 0 {
            0.0
        } else {
            self.successful_retries as f64 / self.total_retries as f64
        }
    }

    /// Average backoff delay per retry.
    ///
    /// Returns [`Duration::ZERO`] before any retry has happened.
    pub fn average_delay(&self) -> Duration {
        if self.total_retries == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(self.total_delay.as_secs_f64() / self.total_retries as f64)
        }
    }
}

/// Retry loop with configurable backoff and failure classification.
///
/// The handler is cheap to share behind an `Arc` and serializes nothing
/// but its own statistics: concurrent `execute` calls run their attempts
/// independently.
///
/// # Examples
///
/// ```rust
/// use pacer::{RetryConfig, RetryHandler};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), pacer::PacerError> {
/// let handler = RetryHandler::new(
///     RetryConfig::new(3).with_base_delay(Duration::from_millis(10)),
/// );
///
/// let value = handler.execute(|| async { Ok::<_, pacer::BoxError>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub struct RetryHandler {
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
    stats: Mutex<RetryStats>,
}

impl RetryHandler {
    /// Creates a handler that retries every failure.
    ///
    /// # Panics
    ///
    /// Panics if the config is invalid (see [`RetryConfig::validate`]).
    pub fn new(config: RetryConfig) -> Self {
        Self::with_classifier(config, RetryAll)
    }

    /// Creates a handler with a custom failure classifier.
    ///
    /// # Panics
    ///
    /// Panics if the config is invalid (see [`RetryConfig::validate`]).
    pub fn with_classifier(config: RetryConfig, classifier: impl ErrorClassifier + 'static) -> Self {
        if let Err(err) = config.validate() {
            panic!("invalid retry config: {err}");
        }
        Self {
            config,
            classifier: Arc::new(classifier),
            stats: Mutex::new(RetryStats::default()),
        }
    }

    /// The policy this handler runs.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Snapshot of the outcome counters.
    pub async fn stats(&self) -> RetryStats {
        self.stats.lock().await.clone()
    }

    /// Zeroes the outcome counters.
    pub async fn reset_stats(&self) {
        *self.stats.lock().await = RetryStats::default();
    }

    /// Runs `op` until it succeeds or the attempt budget runs out.
    ///
    /// The operation is a factory producing a fresh future per attempt, so
    /// it can capture request state by reference and rebuild the call each
    /// time.
    ///
    /// # Errors
    ///
    /// - [`PacerError::NonRetryable`] if the classifier rejects a failure;
    ///   no further attempts are made.
    /// - [`PacerError::RetryExhausted`] if every attempt failed, carrying
    ///   the final attempt's error.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, PacerError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, BoxError>> + Send,
    {
        let mut last_error: Option<BoxError> = None;

        for attempt in 1..=self.config.max_attempts {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation recovered after retries");
                        let mut stats = self.stats.lock().await;
                        stats.total_retries += 1;
                        stats.successful_retries += 1;
                        stats.last_retry = Some(Instant::now());
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !self.classifier.retryable(&err) {
                        warn!(attempt, error = %err, "non-retryable failure, giving up");
                        self.stats.lock().await.non_retryable += 1;
                        return Err(PacerError::NonRetryable(err));
                    }

                    // Order matters: strategy delay first, jitter second,
                    // clamp last, so a strategy delay at the cap still
                    // sleeps the full cap.
                    let delay = {
                        let mut secs = self.config.strategy_delay_secs(attempt);
                        if self.config.jitter {
                            secs *= rand::thread_rng().gen_range(0.5..1.5);
                        }
                        Duration::from_secs_f64(secs.min(self.config.max_delay.as_secs_f64()))
                    };
                    warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    {
                        let mut stats = self.stats.lock().await;
                        stats.total_retries += 1;
                        stats.failed_retries += 1;
                        stats.total_delay += delay;
                        stats.last_retry = Some(Instant::now());
                        stats.last_error = Some(err.to_string());
                    }
                    last_error = Some(err);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(PacerError::RetryExhausted {
            attempts: self.config.max_attempts,
            // Unreachable with a validated config (max_attempts ≥ 1), but
            // keeps the error path total.
            last_error: last_error.unwrap_or_else(|| "no attempts were made".into()),
        })
    }
}

impl fmt::Debug for RetryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
