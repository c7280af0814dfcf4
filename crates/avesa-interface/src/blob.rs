//! `BlobStore`: the object-storage capability AVESA's raw ingestion and
//! reject-record paths depend on.
//!
//! Generalizes `OrbitSystem`'s local/distributed filesystem abstraction
//! (exists / metadata / read_dir / reader / writer) down to the handful of
//! operations the pipeline actually needs: existence, listing by prefix,
//! and single-shot streaming get/put. `spec` §5 requires partial writes to
//! be either finalized atomically or discarded on cancel — `put` therefore
//! takes the whole payload as one call rather than exposing a partial
//! writer, so a cancelled upload never leaves a half-written blob visible.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, BlobStoreError>;

impl From<BlobStoreError> for avesa_core::AvesaError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::NotFound(msg) => avesa_core::AvesaError::NotFound(msg),
            BlobStoreError::Io(e) => avesa_core::AvesaError::Transient(e.to_string()),
            BlobStoreError::Backend(msg) => avesa_core::AvesaError::Transient(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub path: String,
    pub len: u64,
    pub modified: DateTime<Utc>,
}

/// The object-store capability. Implementations must be safe to share
/// across every in-flight chunk processor (`Send + Sync`).
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn exists(&self, path: &str) -> Result<bool>;

    async fn metadata(&self, path: &str) -> Result<BlobMetadata>;

    /// List blobs whose path starts with `prefix`, non-recursive-by-depth is
    /// not assumed — callers addressing a deterministic chunk path don't
    /// need directory semantics, only prefix matching.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobMetadata>>;

    /// Stream the full contents of one blob.
    async fn get(&self, path: &str) -> Result<Box<dyn tokio::io::AsyncRead + Unpin + Send>>;

    /// Write `data` to `path` as a single atomic operation: either the
    /// whole blob becomes visible at `path`, or (on error / cancellation)
    /// nothing does.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()>;
}

/// Convenience methods derivable from the core trait, mirroring the
/// `OrbitSystemExt` blanket-impl pattern.
#[async_trait]
pub trait BlobStoreExt: BlobStore {
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;
        let mut reader = self.get(path).await?;
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Ok(buffer)
    }
}

impl<T: BlobStore + ?Sized> BlobStoreExt for T {}
