//! Bounded retry with jittered exponential backoff for upstream calls.

use crate::core::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Retry policy for calls to local providers.
///
/// Every attempt is handed the time left before the deadline, and the policy
/// never sleeps past the deadline: if the next backoff would overrun it the
/// last error is returned instead.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.backoff_ms))
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Un-jittered backoff before retry number `step` (0-based).
    pub fn backoff(&self, step: u32) -> Duration {
        let multiplier = 1_u32 << step.min(10);
        self.base_backoff
            .checked_mul(multiplier)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Backoff scaled by a random factor in `[0.5, 1.0]`.
    pub fn jittered_backoff(&self, step: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        self.backoff(step).mul_f64(factor)
    }

    /// Run `op` until it succeeds, a non-retryable error occurs, retries are
    /// exhausted or the deadline leaves no room for another backoff.
    ///
    /// `op` receives the remaining budget for that attempt.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        deadline: Instant,
        mut op: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut step = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let err = match op(remaining).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if step >= self.max_retries || !should_retry(&err) {
                return Err(err);
            }

            let delay = self.jittered_backoff(step);
            if Instant::now() + delay >= deadline {
                tracing::debug!("Retry skipped, deadline too close");
                return Err(err);
            }

            step += 1;
            tracing::warn!(
                attempt = step + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying upstream call after connection failure"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
