//! Bounded retry with exponential backoff.
//!
//! Used by batch tooling around upstream calls. Only errors the caller's
//! predicate classifies as transient are retried; everything else is
//! returned on the first failure.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Tunable parameters for the retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retrying.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Randomize each delay within `[delay / 2, delay]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay to wait after `failures` consecutive failures (1-based),
    /// before jitter.
    pub fn backoff(&self, failures: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..failures {
            delay = next_delay(delay, self);
        }
        delay.min(self.max_delay)
    }

    fn sleep_duration(&self, failures: u32) -> Duration {
        let delay = self.backoff(failures);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let max_ms = delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(max_ms / 2..=max_ms))
    }
}

/// Calculate the next backoff delay from the current delay.
///
/// The result is clamped to [`RetryPolicy::max_delay`].
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_delay)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempt budget is spent. The last error is returned.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = policy.sleep_duration(attempt);
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying",
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 1 {
                    tracing::error!(operation = label, attempt, error = %e, "Giving up after retries");
                }
                return Err(e);
            }
        }
    }
}
