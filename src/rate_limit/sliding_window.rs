//! # Sliding Window Limiter
//!
//! Tracks the exact timestamps of admitted units and enforces the cap over
//! the trailing `time_window`, with none of the fixed window's boundary
//! doubling. Costs memory proportional to `max_requests`.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{RateLimiter, RateLimitRule, RateLimitStats};

#[derive(Debug)]
struct SlidingState {
    /// Admission timestamps within the trailing window, oldest first.
    /// One entry per admitted unit of weight.
    admissions: VecDeque<Instant>,
    stats: RateLimitStats,
}

/// Rate limiter enforcing an exact cap over the trailing time window.
///
/// On denial the returned wait is the time until the oldest retained
/// admission slides out of the window, i.e. the earliest moment any budget
/// frees up.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    rule: RateLimitRule,
    state: Mutex<SlidingState>,
}

impl SlidingWindowLimiter {
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
        let capacity = rule.max_requests as usize;
        Self {
            rule,
            state: Mutex::new(SlidingState {
                admissions: VecDeque::with_capacity(capacity),
                stats: RateLimitStats::new(),
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn acquire_weighted(&self, weight: u32) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        // Prune admissions that have slid out of the trailing window.
        while let Some(&oldest) = state.admissions.front() {
            if now.duration_since(oldest) >= self.rule.time_window {
                state.admissions.pop_front();
            } else {
                break;
            }
        }

        let in_window = state.admissions.len() as u64;
        if in_window + weight as u64 > self.rule.max_requests as u64 {
            let wait = match state.admissions.front() {
                // Time until the oldest retained admission expires.
                Some(&oldest) => self
                    .rule
                    .time_window
                    .saturating_sub(now.duration_since(oldest)),
                // The window is empty, so the weight alone exceeds the
                // budget; it can never be admitted by waiting.
                None => {
                    warn!(
                        scope = %self.rule.scope,
                        weight,
                        max_requests = self.rule.max_requests,
                        "admission weight exceeds the whole budget"
                    );
                    self.rule.time_window
                }
            };
            state.stats.record_throttled(wait);
            debug!(
                scope = %self.rule.scope,
                in_window,
                wait_ms = wait.as_millis() as u64,
                "sliding window budget exhausted"
            );
            return wait;
        }

        for _ in 0..weight {
            state.admissions.push_back(now);
        }
        state.stats.record_admitted();
        Duration::ZERO
    }

    async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.admissions.clear();
        state.stats.reset();
    }

    async fn stats(&self) -> RateLimitStats {
        self.state.lock().await.stats.clone()
    }

    fn rule(&self) -> &RateLimitRule {
        &self.rule
    }
}
