//! `SecretStore`: credential resolution, kept outside the state store so
//! credentials never flow through job/chunk persistence.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SecretStoreError>;

impl From<SecretStoreError> for avesa_core::AvesaError {
    fn from(err: SecretStoreError) -> Self {
        match err {
            SecretStoreError::NotFound(msg) => avesa_core::AvesaError::NotFound(msg),
            SecretStoreError::Backend(msg) => avesa_core::AvesaError::Fatal(msg),
        }
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    /// Resolve a `credentials_ref` (as stored on `ServiceConfig`) to its
    /// secret value. The shape of the value (API key, OAuth client
    /// secret, ...) is opaque to the pipeline; only the connector for the
    /// owning service interprets it.
    async fn resolve(&self, credentials_ref: &str) -> Result<String>;
}
