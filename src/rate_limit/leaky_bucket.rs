//! # Leaky Bucket Limiter
//!
//! Admissions pour water into a bucket that drains at the rule's steady
//! rate. Once the bucket is full, callers wait for enough water to drain.
//! Unlike the token bucket there is no banked credit: a long idle period
//! only empties the bucket, it never buys a bigger burst.
//!
//! ```text
//!     Leaky Bucket (bucket_size = 6, drain = 2/s):
//!
//!       admissions pour in
//!            │ │ │
//!            ▼ ▼ ▼
//!     ┌─────────────┐
//!     │ ≈ ≈ ≈ ≈     │  4 units of water
//!     └──────┬──────┘
//!            ▼
//!       drains 2 units/s
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{RateLimiter, RateLimitRule, RateLimitStats};

#[derive(Debug)]
struct LeakState {
    /// Water currently in the bucket. Fractional because drain is
    /// continuous.
    water: f64,
    last_drain: Instant,
    stats: RateLimitStats,
}

/// Rate limiter that smooths traffic to the rule's steady rate.
///
/// On denial the returned wait is the time the drain needs to make room
/// for the requested weight.
#[derive(Debug)]
pub struct LeakyBucketLimiter {
    rule: RateLimitRule,
    bucket_size: u32,
    state: Mutex<LeakState>,
}

impl LeakyBucketLimiter {
    /// Creates a limiter whose bucket capacity equals `rule.max_requests`.
    ///
    /// # Panics
    ///
    /// Panics if the rule is invalid (see [`RateLimitRule::validate`]).
    /// Use [`build_limiter`](super::build_limiter) for a fallible path.
    pub fn new(rule: RateLimitRule) -> Self {
        let capacity = rule.max_requests;
        Self::with_bucket_size(rule, capacity)
    }

    /// Creates a limiter with an explicit bucket capacity.
    ///
    /// # Panics
    ///
    /// Panics if the rule is invalid or `bucket_size` is 0.
    pub fn with_bucket_size(rule: RateLimitRule, bucket_size: u32) -> Self {
        if let Err(err) = rule.validate() {
            panic!("invalid rate limit rule: {err}");
        }
        if bucket_size == 0 {
            panic!("invalid rate limit rule: bucket_size must be at least 1");
        }
        Self {
            rule,
            bucket_size,
            state: Mutex::new(LeakState {
                water: 0.0,
                last_drain: Instant::now(),
                stats: RateLimitStats::new(),
            }),
        }
    }

    /// The maximum amount of water the bucket holds.
    pub fn bucket_size(&self) -> u32 {
        self.bucket_size
    }

    fn drain(&self, state: &mut LeakState, now: Instant) {
        let elapsed = now.duration_since(state.last_drain).as_secs_f64();
        let drained = state.water - elapsed * self.rule.rate_per_second();
        state.water = drained.max(0.0);
        state.last_drain = now;
    }
}

#[async_trait]
impl RateLimiter for LeakyBucketLimiter {
    async fn acquire_weighted(&self, weight: u32) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        self.drain(&mut state, now);

        let poured = state.water + weight as f64;
        if poured <= self.bucket_size as f64 {
            state.water = poured;
            state.stats.record_admitted();
            return Duration::ZERO;
        }

        let overflow = poured - self.bucket_size as f64;
        let wait = Duration::from_secs_f64(overflow / self.rule.rate_per_second());
        state.stats.record_throttled(wait);
        debug!(
            scope = %self.rule.scope,
            water = state.water,
            weight,
            wait_ms = wait.as_millis() as u64,
            "leaky bucket full"
        );
        wait
    }

    async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.water = 0.0;
        state.last_drain = Instant::now();
        state.stats.reset();
    }

    async fn stats(&self) -> RateLimitStats {
        self.state.lock().await.stats.clone()
    }

    fn rule(&self) -> &RateLimitRule {
        &self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_to(actual: Duration, expected: Duration) -> bool {
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        diff < Duration::from_millis(5)
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_admits_to_capacity() {
        let limiter = LeakyBucketLimiter::new(RateLimitRule::per_second(5));

        for _ in 0..5 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert!(limiter.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_wait_equals_overflow_drain_time() {
        // 10 per 10s = 1 unit/s drain, capacity 10.
        let limiter = LeakyBucketLimiter::new(RateLimitRule::new(10, Duration::from_secs(10)));

        for _ in 0..10 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }

        // One unit of overflow drains in one second.
        let wait = limiter.acquire().await;
        assert!(close_to(wait, Duration::from_secs(1)));

        tokio::time::advance(wait).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_banks_no_credit() {
        let limiter = LeakyBucketLimiter::new(RateLimitRule::per_second(3));

        // Long idle: the bucket is simply empty, not over-provisioned.
        tokio::time::advance(Duration::from_secs(60)).await;
        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert!(limiter.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_pacing_after_fill() {
        let limiter = LeakyBucketLimiter::new(RateLimitRule::per_second(2));

        assert_eq!(limiter.acquire_weighted(2).await, Duration::ZERO);

        // At 2/s drain, half a second frees room for exactly one unit.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert!(limiter.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_bucket_smooths_harder() {
        let limiter =
            LeakyBucketLimiter::with_bucket_size(RateLimitRule::per_second(10), 2);

        assert_eq!(limiter.acquire_weighted(2).await, Duration::ZERO);
        let wait = limiter.acquire().await;
        // One overflow unit at 10/s drain: 100ms.
        assert!(close_to(wait, Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_empties_the_bucket() {
        let limiter = LeakyBucketLimiter::new(RateLimitRule::per_second(1));

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert!(limiter.acquire().await > Duration::ZERO);

        limiter.reset().await;

        assert_eq!(limiter.stats().await.total_requests, 0);
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[test]
    #[should_panic]
    fn test_zero_bucket_panics() {
        let _ = LeakyBucketLimiter::with_bucket_size(RateLimitRule::per_second(1), 0);
    }
}
