//! # Admission Statistics
//!
//! Every limiter owns one [`RateLimitStats`] and is the only thing allowed
//! to mutate it. Callers get snapshots, which makes the counters safe to
//! poll from monitoring code without perturbing the limiter.
//!
//! ```text
//!     Stats Dashboard:
//!     ┌─────────────────────────────────────┐
//!     │  Total Requests:   1200             │
//!     │  Throttled:        180  (15.0%)     │
//!     │  Avg Wait:         320ms            │
//!     │  Max Wait:         2.1s             │
//!     │  Health: ✅ Healthy                 │
//!     └─────────────────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Throttle ratio above which a limiter is considered degraded.
const DEGRADED_THROTTLE_RATIO: f64 = 0.3;

/// Throttle ratio above which a limiter is considered critical.
const CRITICAL_THROTTLE_RATIO: f64 = 0.6;

/// Monotonically accumulating admission counters for one limiter.
///
/// Counters only move forward between resets; `reset()` zeroes everything
/// and stamps `last_reset`. The derived ratios return 0 when their
/// denominator is 0, so a freshly constructed limiter reports a clean
/// slate rather than NaN.
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    /// Total admission checks processed (admitted + throttled).
    pub total_requests: u64,

    /// Admission checks that were denied and handed back a wait duration.
    pub throttled_requests: u64,

    /// Sum of all wait durations handed back on denial.
    pub total_wait_time: Duration,

    /// Longest single wait duration handed back on denial.
    pub max_wait_time: Duration,

    /// When the counters were last zeroed (or the limiter constructed).
    pub last_reset: Instant,
}

impl RateLimitStats {
    /// Creates a zeroed stats block stamped with the current time.
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            throttled_requests: 0,
            total_wait_time: Duration::ZERO,
            max_wait_time: Duration::ZERO,
            last_reset: Instant::now(),
        }
    }

    /// Records an admitted request.
    pub(crate) fn record_admitted(&mut self) {
        self.total_requests += 1;
    }

    /// Records a throttled request and the wait it was handed.
    pub(crate) fn record_throttled(&mut self, wait: Duration) {
        self.total_requests += 1;
        self.throttled_requests += 1;
        self.total_wait_time += wait;
        self.max_wait_time = self.max_wait_time.max(wait);
    }

    /// Zeroes all counters and stamps the reset time.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Fraction of requests that were throttled (0.0 to 1.0).
    ///
    /// Returns 0.0 before any request has been processed.
    pub fn throttle_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.throttled_requests as f64 / self.total_requests as f64
        }
    }

    /// Fraction of requests that were admitted (0.0 to 1.0).
    pub fn admit_ratio(&self) -> f64 {
        1.0 - self.throttle_ratio()
    }

    /// Average wait handed back per throttled request.
    ///
    /// Returns [`Duration::ZERO`] when nothing has been throttled yet.
    pub fn avg_wait_time(&self) -> Duration {
        if self.throttled_requests == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(
                self.total_wait_time.as_secs_f64() / self.throttled_requests as f64,
            )
        }
    }

    /// Whether demand is meaningfully exceeding the configured budget.
    pub fn is_under_pressure(&self) -> bool {
        self.throttle_ratio() > DEGRADED_THROTTLE_RATIO
    }

    /// Three-level health assessment, suitable for alerting thresholds.
    pub fn health_status(&self) -> HealthStatus {
        let ratio = self.throttle_ratio();
        if ratio > CRITICAL_THROTTLE_RATIO {
            HealthStatus::Critical
        } else if ratio > DEGRADED_THROTTLE_RATIO {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Human-readable report suitable for logging or display.
    pub fn summary(&self) -> String {
        format!(
            "RateLimit Stats:\n\
             ├─ Requests:\n\
             │  ├─ Total: {}\n\
             │  ├─ Throttled: {}\n\
             │  └─ Throttle Ratio: {:.2}%\n\
             ├─ Waits:\n\
             │  ├─ Average: {:.3}s\n\
             │  └─ Max: {:.3}s\n\
             └─ Health: {:?}",
            self.total_requests,
            self.throttled_requests,
            self.throttle_ratio() * 100.0,
            self.avg_wait_time().as_secs_f64(),
            self.max_wait_time.as_secs_f64(),
            self.health_status(),
        )
    }
}

impl Default for RateLimitStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RateLimitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Health status indicator derived from the throttle ratio.
///
/// ```text
///     Healthy ──────► Demand fits the budget
///        │
///     Degraded ─────► Noticeable throttling, monitor closely
///        │
///     Critical ─────► Sustained throttling, raise the budget or shed load
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Throttling is rare; the budget fits the demand.
    Healthy,
    /// A significant share of requests is being throttled.
    Degraded,
    /// Most requests are being throttled; intervention recommended.
    Critical,
}

impl HealthStatus {
    /// Returns `true` if the status indicates any problem.
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "✅ Healthy"),
            Self::Degraded => write!(f, "⚠️ Degraded"),
            Self::Critical => write!(f, "🔴 Critical"),
        }
    }
}
