//! `ResilientConnector`: wraps any `SourceConnector` with a per-service
//! token-bucket rate limiter and circuit breaker, grounded on
//! `avesa_resilience`'s `RateLimiter`/`CircuitBreaker` primitives.

use crate::connector::SourceConnector;
use crate::error::{ConnectError, Result};
use crate::model::{FetchPageOutcome, FetchPageRequest};
use async_trait::async_trait;
use avesa_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use avesa_resilience::error::ResilienceError;
use avesa_resilience::rate_limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;

pub struct ResilientConnector {
    inner: Arc<dyn SourceConnector>,
    rate_limiter: RateLimiter,
    rate_limit_wait_max: Duration,
    circuit_breaker: CircuitBreaker,
}

impl ResilientConnector {
    pub fn new(inner: Arc<dyn SourceConnector>, requests_per_second: u32, breaker_config: CircuitBreakerConfig) -> Self {
        Self::with_rate_limit_wait_max(inner, requests_per_second, breaker_config, Duration::from_secs(60))
    }

    /// `rate_limit_wait_max` bounds how long `fetch_page` blocks on the
    /// shared token bucket before surfacing `RateLimited` instead of
    /// sleeping indefinitely (`spec` §5's shared-resource policy).
    pub fn with_rate_limit_wait_max(
        inner: Arc<dyn SourceConnector>,
        requests_per_second: u32,
        breaker_config: CircuitBreakerConfig,
        rate_limit_wait_max: Duration,
    ) -> Self {
        Self {
            inner,
            rate_limiter: RateLimiter::per_second(requests_per_second),
            rate_limit_wait_max,
            circuit_breaker: CircuitBreaker::new(breaker_config),
        }
    }
}

#[async_trait]
impl SourceConnector for ResilientConnector {
    fn service_name(&self) -> &str {
        self.inner.service_name()
    }

    async fn fetch_page(&self, request: FetchPageRequest) -> Result<FetchPageOutcome> {
        // The token bucket blocks (sleeps) rather than erroring on each
        // individual acquire, but a caller stuck behind the shared bucket
        // for longer than `rate_limit_wait_max` gets `RateLimited` instead
        // of blocking forever, per `spec` §5's shared-resource policy.
        if self.rate_limiter.acquire_within(self.rate_limit_wait_max).await.is_err() {
            return Err(ConnectError::RateLimited { retry_after: self.rate_limit_wait_max });
        }

        let inner = &self.inner;
        let outcome = self
            .circuit_breaker
            .call(|| async { inner.fetch_page(request.clone()).await.map_err(connect_to_resilience) })
            .await;

        outcome.map_err(resilience_to_connect)
    }
}

fn connect_to_resilience(err: ConnectError) -> ResilienceError {
    match err {
        ConnectError::AuthFailure(msg) => ResilienceError::Permanent(msg),
        ConnectError::UnknownService(msg) => ResilienceError::Permanent(msg),
        ConnectError::RateLimited { .. } => ResilienceError::RateLimitExceeded,
        ConnectError::Transient(msg) => ResilienceError::Transient(msg),
        ConnectError::Timeout => ResilienceError::Timeout(std::time::Duration::from_secs(30)),
        ConnectError::Http(err) => ResilienceError::Transient(err.to_string()),
    }
}

fn resilience_to_connect(err: ResilienceError) -> ConnectError {
    match err {
        ResilienceError::CircuitOpen => ConnectError::Transient("circuit breaker open".to_string()),
        ResilienceError::RateLimitExceeded => ConnectError::RateLimited {
            retry_after: std::time::Duration::from_secs(30),
        },
        ResilienceError::Transient(msg) => ConnectError::Transient(msg),
        ResilienceError::Permanent(msg) => ConnectError::AuthFailure(msg),
        ResilienceError::Timeout(_) => ConnectError::Timeout,
        ResilienceError::MaxRetriesExceeded(n) => ConnectError::Transient(format!("max retries ({n}) exceeded")),
    }
}
