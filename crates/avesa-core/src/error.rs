//! The closed error-kind set every layer of the pipeline reasons about.
//!
//! Inner crates (`avesa-state`, `avesa-connect`, `avesa-mapping`, ...) each
//! define their own `thiserror` enum for their own concerns; at the
//! boundary where a lower-crate error crosses into the engine, it is
//! translated once into `AvesaError` via a `From` impl, rather than
//! scattering `match`-on-inner-variant logic through call sites.

use thiserror::Error;

/// The closed set of error kinds from `spec` §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    AlreadyTerminal,
    AuthFailure,
    RateLimited,
    Transient,
    UnknownService,
    MappingError,
    RecordReject,
    Cancelled,
    Timeout,
    Fatal,
}

#[derive(Error, Debug)]
pub enum AvesaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("chunk already terminal: {0}")]
    AlreadyTerminal(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("rate limited, retry after {retry_after:?}: {message}")]
    RateLimited {
        message: String,
        retry_after: std::time::Duration,
    },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("mapping error: {0}")]
    MappingError(String),

    #[error("record rejected: {0}")]
    RecordReject(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl AvesaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AvesaError::NotFound(_) => ErrorKind::NotFound,
            AvesaError::Conflict(_) => ErrorKind::Conflict,
            AvesaError::AlreadyTerminal(_) => ErrorKind::AlreadyTerminal,
            AvesaError::AuthFailure(_) => ErrorKind::AuthFailure,
            AvesaError::RateLimited { .. } => ErrorKind::RateLimited,
            AvesaError::Transient(_) => ErrorKind::Transient,
            AvesaError::UnknownService(_) => ErrorKind::UnknownService,
            AvesaError::MappingError(_) => ErrorKind::MappingError,
            AvesaError::RecordReject(_) => ErrorKind::RecordReject,
            AvesaError::Cancelled => ErrorKind::Cancelled,
            AvesaError::Timeout(_) => ErrorKind::Timeout,
            AvesaError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// `Transient` / `RateLimited` are retried in-place by the Chunk
    /// Processor's `RetryPolicy` (`spec` §4.4).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::RateLimited)
    }

    /// Only `Fatal` aborts the whole orchestrator run (`spec` §4.7, §7).
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Fatal)
    }

    /// `AuthFailure` / `UnknownService` are immediately terminal, never
    /// retried (`spec` §4.4).
    pub fn is_immediately_terminal(&self) -> bool {
        matches!(self.kind(), ErrorKind::AuthFailure | ErrorKind::UnknownService | ErrorKind::Fatal)
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Fatal => 4,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, AvesaError>;
