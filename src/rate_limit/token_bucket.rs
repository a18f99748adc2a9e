//! # Token Bucket Limiter
//!
//! Tokens refill continuously at the rule's steady rate and accumulate up
//! to `burst_size`. Admission spends tokens; an idle limiter banks enough
//! to absorb a burst without throttling.
//!
//! ```text
//!     Token Bucket (burst_size = 8, rate = 2/s):
//!
//!            refill 2 tokens/s
//!                 ▼ ▼
//!     ┌──────────────────┐
//!     │ ● ● ● ● ●        │  5 tokens banked
//!     └──────────────────┘
//!       │ spend `weight` per admission
//!       ▼
//!     admitted immediately while tokens ≥ weight
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{RateLimiter, RateLimitRule, RateLimitStats};

#[derive(Debug)]
struct BucketState {
    /// Tokens currently banked. Fractional because refill is continuous.
    tokens: f64,
    last_refill: Instant,
    stats: RateLimitStats,
}

/// Rate limiter with continuous refill and configurable burst tolerance.
///
/// The bucket starts full, so a fresh limiter admits up to `burst_size`
/// units immediately. On denial the returned wait is the time the refill
/// needs to bank the missing tokens.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    rule: RateLimitRule,
    burst_size: u32,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    /// Creates a limiter whose burst capacity equals `rule.max_requests`.
    ///
    /// # Panics
    ///
    /// Panics if the rule is invalid (see [`RateLimitRule::validate`]).
    /// Use [`build_limiter`](super::build_limiter) for a fallible path.
    pub fn new(rule: RateLimitRule) -> Self {
        let burst = rule.max_requests;
        Self::with_burst_size(rule, burst)
    }

    /// Creates a limiter with an explicit burst capacity.
    ///
    /// A `burst_size` below `max_requests` smooths traffic harder than the
    /// rule alone would; a larger one lets idle periods bank extra credit.
    ///
    /// # Panics
    ///
    /// Panics if the rule is invalid or `burst_size` is 0.
    pub fn with_burst_size(rule: RateLimitRule, burst_size: u32) -> Self {
        if let Err(err) = rule.validate() {
            panic!("invalid rate limit rule: {err}");
        }
        if burst_size == 0 {
            panic!("invalid rate limit rule: burst_size must be at least 1");
        }
        Self {
            rule,
            burst_size,
            state: Mutex::new(BucketState {
                tokens: burst_size as f64,
                last_refill: Instant::now(),
                stats: RateLimitStats::new(),
            }),
        }
    }

    /// The maximum number of tokens the bucket can bank.
    pub fn burst_size(&self) -> u32 {
        self.burst_size
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let refilled = state.tokens + elapsed * self.rule.rate_per_second();
        state.tokens = refilled.min(self.burst_size as f64);
        state.last_refill = now;
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn acquire_weighted(&self, weight: u32) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        self.refill(&mut state, now);

        let needed = weight as f64;
        if state.tokens >= needed {
            state.tokens -= needed;
            state.stats.record_admitted();
            return Duration::ZERO;
        }

        let deficit = needed - state.tokens;
        let wait = Duration::from_secs_f64(deficit / self.rule.rate_per_second());
        state.stats.record_throttled(wait);
        debug!(
            scope = %self.rule.scope,
            tokens = state.tokens,
            weight,
            wait_ms = wait.as_millis() as u64,
            "token bucket empty"
        );
        wait
    }

    async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.tokens = self.burst_size as f64;
        state.last_refill = Instant::now();
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
    async fn test_full_bucket_absorbs_burst() {
        let limiter = TokenBucketLimiter::new(RateLimitRule::per_second(10));

        for _ in 0..10 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert!(limiter.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_wait_covers_the_deficit() {
        // 10 per 10s = 1 token/s, burst capped at 10.
        let limiter = TokenBucketLimiter::new(RateLimitRule::new(10, Duration::from_secs(10)));

        for _ in 0..10 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }

        // Bucket empty: one token takes one second to bank.
        let wait = limiter.acquire().await;
        assert!(close_to(wait, Duration::from_secs(1)));

        tokio::time::advance(wait).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_continuous() {
        let limiter = TokenBucketLimiter::new(RateLimitRule::per_second(2));

        assert_eq!(limiter.acquire_weighted(2).await, Duration::ZERO);

        // Half a second banks one token at 2/s.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert!(limiter.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_bucket_caps_at_burst_size() {
        let limiter =
            TokenBucketLimiter::with_burst_size(RateLimitRule::per_second(10), 3);

        // A long idle period must not bank more than burst_size tokens.
        tokio::time::advance(Duration::from_secs(60)).await;
        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert!(limiter.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_weighted_deficit() {
        let limiter = TokenBucketLimiter::new(RateLimitRule::per_second(4));

        assert_eq!(limiter.acquire_weighted(4).await, Duration::ZERO);

        // Needs 4 tokens at 4/s: a full second.
        let wait = limiter.acquire_weighted(4).await;
        assert!(close_to(wait, Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_refills_the_bucket() {
        let limiter = TokenBucketLimiter::new(RateLimitRule::per_second(2));

        assert_eq!(limiter.acquire_weighted(2).await, Duration::ZERO);
        assert!(limiter.acquire().await > Duration::ZERO);

        limiter.reset().await;

        assert_eq!(limiter.stats().await.total_requests, 0);
        assert_eq!(limiter.acquire_weighted(2).await, Duration::ZERO);
    }

    #[test]
    #[should_panic]
    fn test_zero_burst_panics() {
        let _ = TokenBucketLimiter::with_burst_size(RateLimitRule::per_second(1), 0);
    }
}
