// Retry policy for API calls
//
// Exponential backoff with random jitter for transient failures. A 429
// with a `Retry-After` hint waits for the hint instead of the curve.
// Permanent errors (auth, not found, other 4xx, bad payloads) return
// immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Error;

/// Backoff parameters for one API call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay, including server hints.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    /// The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.delay_for(attempt, &err);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Delay before retrying after `attempt` (zero-based) failed with `err`.
    pub fn delay_for(&self, attempt: u32, err: &Error) -> Duration {
        match err.retry_after() {
            Some(hint) => hint.min(self.max_delay),
            None => self.backoff(attempt, rand::thread_rng().gen_range(-0.25..=0.25)),
        }
    }

    /// Backoff for `attempt` with a jitter offset in `[-0.25, 0.25]`.
    fn backoff(&self, attempt: u32, jitter: f64) -> Duration {
        let max = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = (self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent)).min(max);
        let with_jitter = (base * (1.0 + jitter)).clamp(0.0, max);
        Duration::from_secs_f64(with_jitter)
    }
}
