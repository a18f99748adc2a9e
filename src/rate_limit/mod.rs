//! # Rate Limiting Module
//!
//! Admission control for outbound calls: decide, per call, whether it may
//! proceed right now and, if not, how long the caller should wait before
//! asking again.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limit/
//!     ├── mod.rs             (You are here - capability trait)
//!     ├── rule.rs            (Policy value objects)
//!     ├── stats.rs           (Admission statistics)
//!     ├── fixed_window.rs    (Hard cap per contiguous window)
//!     ├── sliding_window.rs  (Exact cap over a trailing window)
//!     ├── token_bucket.rs    (Continuous refill, burst tolerant)
//!     ├── leaky_bucket.rs    (Continuous drain, strict pacing)
//!     └── manager.rs         (Named registry + factory)
//! ```
//!
//! ## Choosing an Algorithm
//!
//! ```text
//!     Burst tolerance ◄──────────────────► Strict pacing
//!
//!     Token Bucket      Fixed Window      Sliding Window     Leaky Bucket
//!     bursts up to      hard cap per      exact cap over     smooth outflow,
//!     burst_size        interval (may     trailing window    queue-like
//!                       double at edges)
//! ```
//!
//! All variants share one contract: [`RateLimiter::acquire_weighted`]
//! returns [`Duration::ZERO`] when the call is admitted (and its cost has
//! been recorded), or a positive wait when it is denied (and state was left
//! untouched). The caller sleeps and asks again: no limiter ever sleeps
//! on the caller's behalf, and no lock is held while anyone waits.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

mod fixed_window;
mod leaky_bucket;
mod manager;
mod rule;
mod stats;
mod sliding_window;
mod token_bucket;

pub use fixed_window::FixedWindowLimiter;
pub use leaky_bucket::LeakyBucketLimiter;
pub use manager::{build_limiter, LimitAlgorithm, LimiterExtras, RateLimitManager, SharedLimiter};
pub use rule::{RateLimitRule, DEFAULT_SCOPE};
pub use sliding_window::SlidingWindowLimiter;
pub use stats::{HealthStatus, RateLimitStats};
pub use token_bucket::TokenBucketLimiter;

/// Common capability of every rate limiting algorithm.
///
/// Implementations own their state behind a per-instance exclusive lock;
/// concurrent callers serialize only against the same instance. The lock
/// covers the read-modify-write of an admission decision and nothing more.
#[async_trait]
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Requests admission for a call costing `weight` units.
    ///
    /// Returns [`Duration::ZERO`] when admitted, meaning the cost has been
    /// recorded atomically with the decision. Returns a positive duration
    /// when denied; internal state was not advanced, and the caller
    /// should wait roughly that long before re-invoking `acquire`.
    ///
    /// The returned wait is advisory, not a reservation: under concurrent
    /// load another caller may claim the freed budget first, so a
    /// re-invocation can be denied again.
    async fn acquire_weighted(&self, weight: u32) -> Duration;

    /// Requests admission at the rule's default weight.
    async fn acquire(&self) -> Duration {
        self.acquire_weighted(self.rule().weight).await
    }

    /// Restores state and statistics to those of a freshly constructed
    /// instance with the same rule.
    async fn reset(&self);

    /// Snapshot of the admission statistics. Does not mutate state.
    async fn stats(&self) -> RateLimitStats;

    /// The rule this limiter enforces.
    fn rule(&self) -> &RateLimitRule;
}
