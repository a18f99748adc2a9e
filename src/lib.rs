//! # Pacer - Resilience Layer for Outbound Calls
//!
//! A toolkit for talking to rate-limited, occasionally-flaky upstream
//! services without knocking them over: rate limiting to stay inside
//! quotas, retries with backoff to ride out transient failures, and a
//! circuit breaker to stop hammering an upstream that is already down.
//!
//! ## Why a Resilience Layer?
//!
//! Every external API you call has a quota and a bad day. Sending requests
//! as fast as your code produces them gets you 429s, bans, or cascading
//! timeouts. Pacer sits between your code and the network and answers
//! three questions per call:
//!
//! 1. **May I send this now?** Rate limiters ([`RateLimiter`])
//! 2. **Should I try again?** Retry with backoff ([`RetryHandler`])
//! 3. **Should I even bother?** Circuit breaker ([`CircuitBreaker`])
//!
//! ## Quick Start
//!
//! ### Rate Limiting
//!
//! ```rust
//! use pacer::{LimitAlgorithm, LimiterExtras, RateLimitManager, RateLimitRule};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), pacer::PacerError> {
//! let manager = RateLimitManager::new();
//! manager.create_limiter(
//!     "orders-api",
//!     LimitAlgorithm::TokenBucket,
//!     RateLimitRule::per_second(100),
//!     LimiterExtras::default(),
//! )?;
//!
//! // Non-blocking check: ZERO means go, anything else is a suggested wait.
//! let wait = manager.acquire("orders-api", 1).await?;
//! if wait.is_zero() {
//!     // send the request
//! }
//!
//! // Or let the manager sleep out denials for you.
//! manager.acquire_and_wait("orders-api", 1).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Retry + Circuit Breaker
//!
//! ```rust
//! use pacer::{CircuitBreaker, RetryConfig, RetryHandler, RetryWithCircuitBreaker};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), pacer::PacerError> {
//! let guard = RetryWithCircuitBreaker::new(
//!     RetryHandler::new(RetryConfig::new(3)),
//!     CircuitBreaker::new(5, Duration::from_secs(30)),
//! );
//!
//! let response = guard
//!     .execute(|| async {
//!         // your fallible call here
//!         Ok::<_, pacer::BoxError>("response body")
//!     })
//!     .await?;
//! # assert_eq!(response, "response body");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Your Application      │
//!                    └──────────┬──────────────┘
//!                               │
//!          ┌────────────────────┼─────────────────────┐
//!          │                    │                     │
//!     ┌────▼───────────┐  ┌─────▼──────────┐  ┌───────▼─────────┐
//!     │ RateLimit      │  │ RetryHandler   │  │ CircuitBreaker  │
//!     │ Manager        │  ├────────────────┤  ├─────────────────┤
//!     ├────────────────┤  │ • backoff      │  │ • closed        │
//!     │ fixed window   │  │   strategies   │  │ • open          │
//!     │ sliding window │  │ • jitter       │  │ • half-open     │
//!     │ token bucket   │  │ • classifier   │  │                 │
//!     │ leaky bucket   │  └───────┬────────┘  └───────┬─────────┘
//!     └────────────────┘          └────── compose ────┘
//!                                 RetryWithCircuitBreaker
//! ```
//!
//! ## The Admission Contract
//!
//! Rate limiters never sleep on the caller's behalf. [`RateLimiter::acquire`]
//! returns [`Duration::ZERO`](std::time::Duration::ZERO) when the call is
//! admitted, or a positive advisory wait when it is denied; the caller
//! decides whether to sleep, shed load, or fall back. Being throttled is a
//! normal verdict, not an error; [`PacerError`] is reserved for real
//! failures.
//!
//! ## Thread Safety
//!
//! Everything here is `Send + Sync` and designed to sit behind an `Arc`
//! shared across tasks. Limiters and breakers serialize their own state
//! behind per-instance async locks; the manager's registry is a concurrent
//! map, so lookups don't contend with admission checks.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

mod breaker;
mod error;
mod guard;
mod rate_limit;
mod retry;

pub use breaker::{CircuitBreaker, CircuitState};
pub use error::{BoxError, PacerError};
pub use guard::RetryWithCircuitBreaker;
pub use rate_limit::{
    build_limiter, FixedWindowLimiter, HealthStatus, LeakyBucketLimiter, LimitAlgorithm,
    LimiterExtras, RateLimiter, RateLimitManager, RateLimitRule, RateLimitStats, SharedLimiter,
    SlidingWindowLimiter, TokenBucketLimiter, DEFAULT_SCOPE,
};
pub use retry::{BackoffStrategy, ErrorClassifier, RetryAll, RetryConfig, RetryHandler, RetryStats};

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// Import everything you need with a single line:
/// ```rust
/// use pacer::prelude::*;
/// ```
pub mod prelude {
    //! Common imports for typical resilience use cases.
    //!
    //! # Example
    //! ```rust
    //! use pacer::prelude::*;
    //! use std::time::Duration;
    //!
    //! let rule = RateLimitRule::per_second(50);
    //! let config = RetryConfig::new(3);
    //! let breaker = CircuitBreaker::new(5, Duration::from_secs(30));
    //! ```

    pub use crate::{
        BackoffStrategy, BoxError, CircuitBreaker, CircuitState, ErrorClassifier, HealthStatus,
        LimitAlgorithm, LimiterExtras, PacerError, RateLimiter, RateLimitManager, RateLimitRule,
        RateLimitStats, RetryConfig, RetryHandler, RetryWithCircuitBreaker, SharedLimiter,
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_version_is_populated() {
        assert!(!super::VERSION.is_empty());
    }
}
