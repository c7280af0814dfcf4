//! Per-service rate limiting (`spec` §4.2, §5): a shared token bucket so
//! every chunk processor targeting the same service backs off together
//! instead of each keeping its own independent budget.

use super::error::ResilienceError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter, shared via `Clone` across every chunk
/// targeting one service.
///
/// # Example
/// ```
/// use avesa_resilience::rate_limiter::RateLimiter;
///
/// #[tokio::main]
/// async fn main() {
///     let limiter = RateLimiter::per_second(100);
///     limiter.acquire().await;
/// }
/// ```
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: u32,
    period: Duration,
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, period: Duration) -> Self {
        Self {
            max_requests,
            period,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: max_requests as f64,
                last_refill: Instant::now(),
            })),
        }
    }

    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(requests_per_second, Duration::from_secs(1))
    }

    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, Duration::from_secs(60))
    }

    pub fn per_hour(requests_per_hour: u32) -> Self {
        Self::new(requests_per_hour, Duration::from_secs(3600))
    }

    /// Refill rate, in tokens per second.
    fn refill_rate(&self) -> f64 {
        self.max_requests as f64 / self.period.as_secs_f64().max(f64::EPSILON)
    }

    /// Block until a token is available, refilling the bucket continuously
    /// based on elapsed time rather than resetting once per period.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.refill_rate()).min(self.max_requests as f64);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - bucket.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_rate()))
                }
            };

            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// `acquire`, but bounded by `max_wait`; returns
    /// `ResilienceError::Timeout` instead of blocking indefinitely, per
    /// `rate_limit_wait_max`.
    pub async fn acquire_within(&self, max_wait: Duration) -> Result<(), ResilienceError> {
        tokio::time::timeout(max_wait, self.acquire())
            .await
            .map_err(|_| ResilienceError::Timeout(max_wait))
    }

    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ResilienceError>>,
    {
        self.acquire().await;
        op().await
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Governor-backed rate limiter kept as an alternate implementation for
/// deployments that want `governor`'s battle-tested token bucket instead of
/// this crate's hand-rolled one; not wired in by default.
#[cfg(feature = "governor-impl")]
pub mod governor_impl {
    use super::*;
    use governor::{
        clock::DefaultClock,
        state::{InMemoryState, NotKeyed},
        Quota, RateLimiter as GovernorInner,
    };
    use std::num::NonZeroU32;

    pub struct GovernorRateLimiter {
        limiter: Arc<GovernorInner<NotKeyed, InMemoryState, DefaultClock>>,
    }

    impl GovernorRateLimiter {
        pub fn new(max_requests: u32, period: Duration) -> Result<Self, ResilienceError> {
            let max_requests = NonZeroU32::new(max_requests)
                .ok_or_else(|| ResilienceError::Permanent("max_requests must be > 0".to_string()))?;

            let quota = Quota::with_period(period)
                .ok_or_else(|| ResilienceError::Permanent("invalid period".to_string()))?
                .allow_burst(max_requests);

            Ok(Self {
                limiter: Arc::new(GovernorInner::direct(quota)),
            })
        }

        pub async fn acquire(&self) {
            self.limiter.until_ready().await;
        }
    }
}
