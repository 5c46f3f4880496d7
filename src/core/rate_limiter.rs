//! Per-client rate limiting for the `/api/*` surface.
//!
//! Each client address gets a budget of `max_requests` per window. The budget
//! is enforced with a keyed GCRA limiter from the governor crate: a full burst
//! of `max_requests` is available up front and one request is replenished
//! every `window / max_requests`.
//!
//! This is not a fixed window. A client that spends its burst and then keeps
//! sending gets roughly `max_requests` more over the next window, so up to
//! about `2 * max_requests` requests can pass within one window length.
//! After that the steady rate is `max_requests` per window.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorRateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::core::config::RateLimitConfig;
use crate::core::error::AppError;

/// Message returned to throttled clients.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Rate limiter keyed by client address.
pub struct RateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl RateLimiter {
    /// Create a rate limiter from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limiter: GovernorRateLimiter::keyed(quota_for(config)),
        }
    }

    /// Check if a request is allowed for the given client key.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the request is allowed
    /// * `Err(AppError::RateLimitExceeded)` if the client exhausted its budget
    pub fn check_rate_limit(&self, client_key: &str) -> Result<(), AppError> {
        match self.limiter.check_key(&client_key.to_string()) {
            Ok(_) => Ok(()),
            Err(_) => {
                tracing::warn!(client = %client_key, "Rate limit exceeded");
                Err(AppError::RateLimitExceeded(RATE_LIMIT_MESSAGE.to_string()))
            }
        }
    }

    /// Drop state for clients whose budget is fully replenished.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}

fn quota_for(config: &RateLimitConfig) -> Quota {
    let burst = NonZeroU32::new(config.max_requests).unwrap_or(nonzero!(1u32));
    let window = Duration::from_secs(config.window_secs.max(1));
    let replenish = window / burst.get();

    Quota::with_period(replenish)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window_secs,
        }
    }

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let limiter = RateLimiter::new(&config(10, 900));

        for _ in 0..10 {
            assert!(limiter.check_rate_limit("10.0.0.1").is_ok());
        }
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(&config(5, 900));

        for _ in 0..5 {
            assert!(limiter.check_rate_limit("10.0.0.1").is_ok());
        }

        let err = limiter.check_rate_limit("10.0.0.1").unwrap_err();
        assert!(matches!(err, AppError::RateLimitExceeded(_)));
    }

    #[test]
    fn test_default_budget_is_one_hundred() {
        let limiter = RateLimiter::default();

        for _ in 0..100 {
            assert!(limiter.check_rate_limit("10.0.0.2").is_ok());
        }
        assert!(limiter.check_rate_limit("10.0.0.2").is_err());
    }

    #[test]
    fn test_clients_have_independent_budgets() {
        let limiter = RateLimiter::new(&config(3, 900));

        for _ in 0..3 {
            assert!(limiter.check_rate_limit("client-a").is_ok());
        }
        assert!(limiter.check_rate_limit("client-a").is_err());

        for _ in 0..3 {
            assert!(limiter.check_rate_limit("client-b").is_ok());
        }
        assert!(limiter.check_rate_limit("client-b").is_err());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_budget_replenishes_before_window_ends() {
        // One request comes back every 500ms
        let limiter = RateLimiter::new(&config(2, 1));

        assert!(limiter.check_rate_limit("client").is_ok());
        assert!(limiter.check_rate_limit("client").is_ok());
        assert!(limiter.check_rate_limit("client").is_err());

        std::thread::sleep(Duration::from_millis(600));
        assert!(limiter.check_rate_limit("client").is_ok());
        assert!(limiter.check_rate_limit("client").is_err());
    }

    #[test]
    fn test_zero_max_requests_still_allows_one() {
        let limiter = RateLimiter::new(&config(0, 900));
        assert!(limiter.check_rate_limit("client").is_ok());
        assert!(limiter.check_rate_limit("client").is_err());
    }
}
