//! # Rate Limit Rules
//!
//! A [`RateLimitRule`] is the pure policy half of a rate limiter: how many
//! admissions fit into how much time, how much a single call costs, and
//! which logical partition the rule belongs to. Rules carry no behavior and
//! never change once a limiter has been built from them.
//!
//! ```text
//!     Rule Anatomy:
//!
//!     ┌────────────────────────────────────┐
//!     │ max_requests: 100                  │ ← budget
//!     │ time_window:  10s                  │ ← per this much time
//!     │ weight:       1                    │ ← default cost per call
//!     │ scope:        "orders-api"         │ ← informational partition key
//!     └────────────────────────────────────┘
//!
//!     Result: 10 admissions/second sustained
//! ```

use std::time::Duration;

use crate::error::PacerError;

/// Default scope assigned to rules that don't name a partition.
pub const DEFAULT_SCOPE: &str = "global";

/// Immutable description of a rate limit budget.
///
/// A rule says nothing about *which* algorithm enforces it: the same rule
/// can drive a fixed window, a sliding window, a token bucket or a leaky
/// bucket. Pick the algorithm via the factory in
/// [`manager`](crate::RateLimitManager) based on whether you want burst
/// tolerance or strict pacing.
///
/// # Examples
///
/// ```rust
/// use pacer::RateLimitRule;
/// use std::time::Duration;
///
/// // 100 requests per 10 seconds, each call costing 1 unit
/// let rule = RateLimitRule::new(100, Duration::from_secs(10));
///
/// // Convenience constructors for the common cases
/// let per_sec = RateLimitRule::per_second(50);
/// let per_min = RateLimitRule::per_minute(600);
///
/// // Heavier calls and a named partition
/// let bulk = RateLimitRule::per_second(10)
///     .with_weight(5)
///     .with_scope("bulk-export");
/// assert_eq!(bulk.weight, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitRule {
    /// Maximum admissions allowed within one `time_window`.
    pub max_requests: u32,

    /// Length of the budget window.
    pub time_window: Duration,

    /// Cost of a single admission check when the caller doesn't pass an
    /// explicit weight. Must be at least 1.
    pub weight: u32,

    /// Logical partition key. Purely informational, useful for logging
    /// and for telling rules apart when a process holds many.
    pub scope: String,
}

impl RateLimitRule {
    /// Creates a rule with the given budget and window, weight 1 and the
    /// default scope.
    pub fn new(max_requests: u32, time_window: Duration) -> Self {
        Self {
            max_requests,
            time_window,
            weight: 1,
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    /// Creates a per-second rule: `requests_per_second` admissions every
    /// second.
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(requests_per_second, Duration::from_secs(1))
    }

    /// Creates a per-minute rule: `requests_per_minute` admissions every
    /// minute. Useful for APIs with minute-based quotas.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, Duration::from_secs(60))
    }

    /// Sets the default admission cost.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Sets the logical partition key.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Validates the rule.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidConfig`] if:
    /// - `max_requests` is 0
    /// - `time_window` is zero
    /// - `weight` is 0
    pub fn validate(&self) -> Result<(), PacerError> {
        if self.max_requests == 0 {
            return Err(PacerError::InvalidConfig("max_requests must be greater than 0"));
        }
        if self.time_window.is_zero() {
            return Err(PacerError::InvalidConfig("time_window must be greater than 0"));
        }
        if self.weight == 0 {
            return Err(PacerError::InvalidConfig("weight must be at least 1"));
        }
        Ok(())
    }

    /// Steady-state admission rate in units per second.
    ///
    /// This is the refill/drain rate used by the bucket algorithms and a
    /// handy number to display to operators.
    pub fn rate_per_second(&self) -> f64 {
        self.max_requests as f64 / self.time_window.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let rule = RateLimitRule::per_second(100);
        assert_eq!(rule.max_requests, 100);
        assert_eq!(rule.time_window, Duration::from_secs(1));
        assert_eq!(rule.weight, 1);
        assert_eq!(rule.scope, DEFAULT_SCOPE);

        let rule = RateLimitRule::per_minute(600);
        assert_eq!(rule.time_window, Duration::from_secs(60));
        assert_eq!(rule.rate_per_second(), 10.0);
    }

    #[test]
    fn test_builders() {
        let rule = RateLimitRule::per_second(10)
            .with_weight(3)
            .with_scope("search");
        assert_eq!(rule.weight, 3);
        assert_eq!(rule.scope, "search");
    }

    #[test]
    fn test_validation() {
        assert!(RateLimitRule::per_second(10).validate().is_ok());

        let rule = RateLimitRule::new(0, Duration::from_secs(1));
        assert!(rule.validate().is_err());

        let rule = RateLimitRule::new(10, Duration::ZERO);
        assert!(rule.validate().is_err());

        let rule = RateLimitRule::per_second(10).with_weight(0);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_rate_per_second() {
        let rule = RateLimitRule::new(50, Duration::from_millis(500));
        assert_eq!(rule.rate_per_second(), 100.0);
    }
}
