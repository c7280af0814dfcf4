use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("no connector registered for service {0}")]
    UnknownService(String),

    #[error("request timed out")]
    Timeout,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ConnectError>;

impl From<ConnectError> for avesa_core::AvesaError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::AuthFailure(msg) => avesa_core::AvesaError::AuthFailure(msg),
            ConnectError::RateLimited { retry_after } => avesa_core::AvesaError::RateLimited {
                message: "connector rate limit exceeded".to_string(),
                retry_after,
            },
            ConnectError::Transient(msg) => avesa_core::AvesaError::Transient(msg),
            ConnectError::UnknownService(msg) => avesa_core::AvesaError::UnknownService(msg),
            ConnectError::Timeout => avesa_core::AvesaError::Timeout(std::time::Duration::from_secs(30)),
            ConnectError::Http(e) => avesa_core::AvesaError::Transient(e.to_string()),
        }
    }
}
