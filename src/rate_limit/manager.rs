//! # Rate Limit Manager
//!
//! A process typically talks to several upstreams, each with its own
//! quota. The manager keeps named limiters in one concurrent registry so
//! call sites address them by name instead of threading `Arc`s around.
//!
//! ```text
//!     RateLimitManager
//!     ┌────────────────────────────────────────────┐
//!     │  "orders-api"    → TokenBucketLimiter      │
//!     │  "search"        → SlidingWindowLimiter    │
//!     │  "bulk-export"   → LeakyBucketLimiter      │
//!     └────────────────────────────────────────────┘
//!            ▲                      ▲
//!       acquire("search")      get_stats("orders-api")
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, info};

use crate::error::PacerError;

use super::{
    FixedWindowLimiter, LeakyBucketLimiter, RateLimiter, RateLimitRule, RateLimitStats,
    SlidingWindowLimiter, TokenBucketLimiter,
};

/// Shared handle to any rate limiting algorithm.
pub type SharedLimiter = Arc<dyn RateLimiter>;

/// Which admission algorithm a limiter should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitAlgorithm {
    /// Hard cap per contiguous window; cheapest, bursts at boundaries.
    FixedWindow,
    /// Exact cap over the trailing window; memory scales with the budget.
    SlidingWindow,
    /// Continuous refill with banked burst credit.
    TokenBucket,
    /// Continuous drain, strict pacing, no banked credit.
    LeakyBucket,
}

impl LimitAlgorithm {
    /// Stable string form, the inverse of [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedWindow => "fixed_window",
            Self::SlidingWindow => "sliding_window",
            Self::TokenBucket => "token_bucket",
            Self::LeakyBucket => "leaky_bucket",
        }
    }
}

impl std::fmt::Display for LimitAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitAlgorithm {
    type Err = PacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed_window" => Ok(Self::FixedWindow),
            "sliding_window" => Ok(Self::SlidingWindow),
            "token_bucket" => Ok(Self::TokenBucket),
            "leaky_bucket" => Ok(Self::LeakyBucket),
            other => Err(PacerError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Algorithm-specific knobs the factory accepts beyond the rule itself.
///
/// Fields left as `None` fall back to the algorithm's default, which is
/// `rule.max_requests` for both capacities.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimiterExtras {
    /// Token bucket capacity override.
    pub burst_size: Option<u32>,
    /// Leaky bucket capacity override.
    pub bucket_size: Option<u32>,
}

impl LimiterExtras {
    /// Extras with a token bucket capacity override.
    pub fn burst(burst_size: u32) -> Self {
        Self {
            burst_size: Some(burst_size),
            ..Self::default()
        }
    }

    /// Extras with a leaky bucket capacity override.
    pub fn bucket(bucket_size: u32) -> Self {
        Self {
            bucket_size: Some(bucket_size),
            ..Self::default()
        }
    }
}

/// Builds a limiter of the requested algorithm, validating up front.
///
/// This is the fallible counterpart of the limiters' panicking
/// constructors: configuration problems surface as
/// [`PacerError::InvalidConfig`] instead of a panic.
///
/// # Errors
///
/// Returns [`PacerError::InvalidConfig`] if the rule fails validation or
/// an applicable capacity override is 0.
pub fn build_limiter(
    algorithm: LimitAlgorithm,
    rule: RateLimitRule,
    extras: LimiterExtras,
) -> Result<SharedLimiter, PacerError> {
    rule.validate()?;
    let limiter: SharedLimiter = match algorithm {
        LimitAlgorithm::FixedWindow => Arc::new(FixedWindowLimiter::new(rule)),
        LimitAlgorithm::SlidingWindow => Arc::new(SlidingWindowLimiter::new(rule)),
        LimitAlgorithm::TokenBucket => {
            let burst = extras.burst_size.unwrap_or(rule.max_requests);
            if burst == 0 {
                return Err(PacerError::InvalidConfig("burst_size must be at least 1"));
            }
            Arc::new(TokenBucketLimiter::with_burst_size(rule, burst))
        }
        LimitAlgorithm::LeakyBucket => {
            let capacity = extras.bucket_size.unwrap_or(rule.max_requests);
            if capacity == 0 {
                return Err(PacerError::InvalidConfig("bucket_size must be at least 1"));
            }
            Arc::new(LeakyBucketLimiter::with_bucket_size(rule, capacity))
        }
    };
    Ok(limiter)
}

/// Concurrent registry of named rate limiters.
///
/// Lookups clone the `Arc` out of the map before awaiting, so no map shard
/// lock is ever held across an admission check.
///
/// # Examples
///
/// ```rust
/// use pacer::{LimitAlgorithm, LimiterExtras, RateLimitManager, RateLimitRule};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), pacer::PacerError> {
/// let manager = RateLimitManager::new();
/// manager.create_limiter(
///     "orders-api",
///     LimitAlgorithm::TokenBucket,
///     RateLimitRule::per_second(100),
///     LimiterExtras::default(),
/// )?;
///
/// let wait = manager.acquire("orders-api", 1).await?;
/// assert_eq!(wait, Duration::ZERO);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RateLimitManager {
    limiters: DashMap<String, SharedLimiter, ahash::RandomState>,
}

impl RateLimitManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            limiters: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Registers a pre-built limiter under `name`.
    ///
    /// Re-registering an existing name replaces the old limiter; in-flight
    /// callers holding the old `Arc` finish against the old instance.
    pub fn add_limiter(&self, name: impl Into<String>, limiter: SharedLimiter) {
        let name = name.into();
        if self.limiters.insert(name.clone(), limiter).is_some() {
            debug!(name = %name, "replaced existing rate limiter");
        } else {
            info!(name = %name, "registered rate limiter");
        }
    }

    /// Builds a limiter via [`build_limiter`] and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidConfig`] on invalid configuration.
    pub fn create_limiter(
        &self,
        name: impl Into<String>,
        algorithm: LimitAlgorithm,
        rule: RateLimitRule,
        extras: LimiterExtras,
    ) -> Result<(), PacerError> {
        let limiter = build_limiter(algorithm, rule, extras)?;
        self.add_limiter(name, limiter);
        Ok(())
    }

    /// Removes the named limiter, returning it if it was present.
    pub fn remove(&self, name: &str) -> Option<SharedLimiter> {
        self.limiters.remove(name).map(|(_, limiter)| limiter)
    }

    /// Looks up the named limiter.
    pub fn get(&self, name: &str) -> Option<SharedLimiter> {
        self.limiters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn require(&self, name: &str) -> Result<SharedLimiter, PacerError> {
        self.get(name)
            .ok_or_else(|| PacerError::UnknownLimiter(name.to_string()))
    }

    /// Requests admission from the named limiter.
    ///
    /// Returns the limiter's verdict: [`Duration::ZERO`] on admission or
    /// the advisory wait on denial.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::UnknownLimiter`] if no limiter is registered
    /// under `name`.
    pub async fn acquire(&self, name: &str, weight: u32) -> Result<Duration, PacerError> {
        let limiter = self.require(name)?;
        Ok(limiter.acquire_weighted(weight).await)
    }

    /// Requests admission and sleeps out denials until admitted.
    ///
    /// Each advisory wait is stretched by a random factor in `[1.0, 1.25)`
    /// before sleeping, so a herd of callers released by the same denial
    /// doesn't stampede the limiter in lockstep.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::UnknownLimiter`] if no limiter is registered
    /// under `name`.
    pub async fn acquire_and_wait(&self, name: &str, weight: u32) -> Result<(), PacerError> {
        let limiter = self.require(name)?;
        loop {
            let wait = limiter.acquire_weighted(weight).await;
            if wait.is_zero() {
                return Ok(());
            }
            let stretched = {
                let mut rng = rand::thread_rng();
                wait.mul_f64(rng.gen_range(1.0..1.25))
            };
            debug!(
                name = %name,
                wait_ms = stretched.as_millis() as u64,
                "throttled, sleeping before retrying admission"
            );
            tokio::time::sleep(stretched).await;
        }
    }

    /// Snapshot of the named limiter's statistics.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::UnknownLimiter`] if no limiter is registered
    /// under `name`.
    pub async fn get_stats(&self, name: &str) -> Result<RateLimitStats, PacerError> {
        let limiter = self.require(name)?;
        Ok(limiter.stats().await)
    }

    /// Snapshots of every registered limiter's statistics.
    pub async fn all_stats(&self) -> Vec<(String, RateLimitStats)> {
        let limiters: Vec<(String, SharedLimiter)> = self
            .limiters
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut stats = Vec::with_capacity(limiters.len());
        for (name, limiter) in limiters {
            stats.push((name, limiter.stats().await));
        }
        stats
    }

    /// Resets the named limiter to its freshly constructed state.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::UnknownLimiter`] if no limiter is registered
    /// under `name`.
    pub async fn reset(&self, name: &str) -> Result<(), PacerError> {
        let limiter = self.require(name)?;
        limiter.reset().await;
        info!(name = %name, "rate limiter reset");
        Ok(())
    }

    /// Resets every registered limiter.
    pub async fn reset_all(&self) {
        let limiters: Vec<SharedLimiter> = self
            .limiters
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for limiter in limiters {
            limiter.reset().await;
        }
        info!(count = self.limiters.len(), "all rate limiters reset");
    }

    /// Whether a limiter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.limiters.contains_key(name)
    }

    /// Number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Names of all registered limiters, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.limiters.iter().map(|entry| entry.key().clone()).collect()
    }
}
