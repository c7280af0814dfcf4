//! Explicit retry/backoff policy
//!
//! Generalizes the per-operation retry decorator into a value that can be
//! constructed once and threaded through call sites, rather than a decorator
//! wrapping every fallible function. Classification of "should this error be
//! retried" is supplied by the caller since it depends on the error type in
//! scope (connector errors, state-store errors, etc.) — this module only
//! owns the timing.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// What a classifier says about one error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Worth retrying, subject to the remaining attempt budget
    Retry,
    /// Never retry this error, fail immediately
    Fatal,
}

/// Exponential backoff with jitter, bounded by a maximum attempt count
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter_ratio: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
        }
    }

    /// The policy used by the Chunk Processor: up to 3 retries, base 2s, cap
    /// 60s, jittered +-20%.
    pub fn chunk_default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(60), 0.2)
    }

    /// Delay to wait before the given 1-indexed attempt (the delay before
    /// attempt 2 is `base_delay`, before attempt 3 is `base_delay * 2`, ...).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let unjittered = self
            .base_delay
            .as_secs_f64()
            .mul_add(2f64.powi(exponent as i32), 0.0)
            .min(self.max_delay.as_secs_f64());

        let jitter_span = unjittered * self.jitter_ratio;
        let jittered = if jitter_span > 0.0 {
            let mut rng = rand::rng();
            unjittered + rng.random_range(-jitter_span..=jitter_span)
        } else {
            unjittered
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Run `op`, retrying per this policy whenever `classify` says `Retry`.
    /// Returns the last error once `max_attempts` is exhausted or `classify`
    /// returns `Fatal`.
    pub async fn retry<F, Fut, T, E>(&self, classify: impl Fn(&E) -> RetryClass, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let fatal = matches!(classify(&err), RetryClass::Fatal);
                    if fatal || attempt >= self.max_attempts {
                        return Err(err);
                    }
                    tokio::time::sleep(self.delay_for_attempt(attempt)).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::chunk_default()
    }
}
