//! # Fixed Window Limiter
//!
//! Partitions time into contiguous windows of `time_window` length and
//! enforces a hard cap per window.
//!
//! ```text
//!     Fixed Window Timeline (max_requests = 4):
//!
//!     │■ ■ ■ ■        │■ ■             │
//!     └── window 1 ───┴── window 2 ────┴──►
//!         4 admitted      2 admitted so far
//! ```
//!
//! ## Boundary Burst
//!
//! A burst straddling a window boundary can admit up to `2 × max_requests`
//! in a short span: the tail of one window plus the head of the next. This
//! is inherent to fixed-window semantics and is documented rather than
//! corrected. Pick the sliding window variant if the trailing-window cap
//! must hold exactly.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{RateLimiter, RateLimitRule, RateLimitStats};

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    request_count: u32,
    stats: RateLimitStats,
}

/// Rate limiter enforcing a hard cap per contiguous time window.
///
/// Rolling into a new window resets both the admission count and the
/// statistics, so stats describe the current window only.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    rule: RateLimitRule,
    state: Mutex<WindowState>,
}

impl FixedWindowLimiter {
    /// Creates a limiter for the given rule.
    ///
    /// # Panics
    ///
    /// Panics if the rule is invalid (see [`RateLimitRule::validate`]).
    /// Use [`build_limiter`](super::build_limiter) for a fallible path.
    pub fn new(rule: RateLimitRule) -> Self {
        if let Err(err) = rule.validate() {
            panic!("invalid rate limit rule: {err}");
        }
        Self {
            rule,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                request_count: 0,
                stats: RateLimitStats::new(),
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn acquire_weighted(&self, weight: u32) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.window_start);

        // Roll into a fresh window once the current one has expired.
        if elapsed >= self.rule.time_window {
            state.window_start = now;
            state.request_count = 0;
            state.stats.reset();
        }

        if state.request_count.saturating_add(weight) > self.rule.max_requests {
            let elapsed = now.duration_since(state.window_start);
            let wait = self.rule.time_window.saturating_sub(elapsed);
            state.stats.record_throttled(wait);
            debug!(
                scope = %self.rule.scope,
                wait_ms = wait.as_millis() as u64,
                "fixed window budget exhausted"
            );
            return wait;
        }

        state.request_count += weight;
        state.stats.record_admitted();
        Duration::ZERO
    }

    async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.window_start = Instant::now();
        state.request_count = 0;
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

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_budget() {
        let limiter = FixedWindowLimiter::new(RateLimitRule::new(3, Duration::from_secs(10)));

        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        let wait = limiter.acquire().await;
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_wait_is_window_remainder() {
        let limiter = FixedWindowLimiter::new(RateLimitRule::new(1, Duration::from_secs(10)));

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        tokio::time::advance(Duration::from_secs(4)).await;

        let wait = limiter.acquire().await;
        assert_eq!(wait, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_roll_admits_again() {
        let limiter = FixedWindowLimiter::new(RateLimitRule::new(2, Duration::from_secs(5)));

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert!(limiter.acquire().await > Duration::ZERO);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);

        // Stats were reset along with the window.
        let stats = limiter.stats().await;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.throttled_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_burst_can_double() {
        // Documented fixed-window behavior: max_requests at the tail of one
        // window plus max_requests at the head of the next.
        let limiter = FixedWindowLimiter::new(RateLimitRule::new(4, Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(9)).await;
        for _ in 0..4 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        for _ in 0..4 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_weighted_acquire() {
        let limiter = FixedWindowLimiter::new(RateLimitRule::new(10, Duration::from_secs(10)));

        assert_eq!(limiter.acquire_weighted(7).await, Duration::ZERO);
        assert_eq!(limiter.acquire_weighted(3).await, Duration::ZERO);
        assert!(limiter.acquire_weighted(1).await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_matches_fresh_instance() {
        let limiter = FixedWindowLimiter::new(RateLimitRule::new(1, Duration::from_secs(10)));

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert!(limiter.acquire().await > Duration::ZERO);

        limiter.reset().await;

        let stats = limiter.stats().await;
        assert_eq!(stats.total_requests, 0);
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[test]
    #[should_panic]
    fn test_invalid_rule_panics() {
        let _ = FixedWindowLimiter::new(RateLimitRule::new(0, Duration::from_secs(1)));
    }
}
