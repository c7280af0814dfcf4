//! `FsBlobStore`: a plain-filesystem `BlobStore`, the reference
//! implementation for local operation and tests. Real deployments plug in
//! an S3/Azure/GCS-backed implementation instead (out of scope here, see
//! `spec` §1).

use crate::blob::{BlobMetadata, BlobStore, BlobStoreError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

fn system_time_to_utc(t: std::time::SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::metadata(self.resolve(path)).await.is_ok())
    }

    async fn metadata(&self, path: &str) -> Result<BlobMetadata> {
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|_| BlobStoreError::NotFound(path.to_string()))?;
        Ok(BlobMetadata {
            path: path.to_string(),
            len: meta.len(),
            modified: system_time_to_utc(meta.modified().map_err(BlobStoreError::Io)?),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMetadata>> {
        let mut out = Vec::new();
        let base = self.root.clone();
        let prefix_path = self.resolve(prefix);
        let search_dir = if prefix_path.is_dir() {
            prefix_path
        } else {
            prefix_path.parent().unwrap_or(&base).to_path_buf()
        };

        if !search_dir.exists() {
            return Ok(out);
        }

        let mut stack = vec![search_dir];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(BlobStoreError::Io)?;
            while let Some(entry) = entries.next_entry().await.map_err(BlobStoreError::Io)? {
                let path = entry.path();
                let relative = path
                    .strip_prefix(&base)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                if !relative.starts_with(prefix) {
                    continue;
                }
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let meta = entry.metadata().await.map_err(BlobStoreError::Io)?;
                out.push(BlobMetadata {
                    path: relative,
                    len: meta.len(),
                    modified: system_time_to_utc(meta.modified().map_err(BlobStoreError::Io)?),
                });
            }
        }
        Ok(out)
    }

    async fn get(&self, path: &str) -> Result<Box<dyn tokio::io::AsyncRead + Unpin + Send>> {
        let file = tokio::fs::File::open(self.resolve(path))
            .await
            .map_err(|_| BlobStoreError::NotFound(path.to_string()))?;
        Ok(Box::new(file))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(BlobStoreError::Io)?;
        }
        // Write to a temp file in the same directory, then rename, so a
        // cancelled or failed write never leaves a partial blob visible at
        // the deterministic path.
        let tmp = temp_sibling(&full);
        {
            let mut file = tokio::fs::File::create(&tmp).await.map_err(BlobStoreError::Io)?;
            file.write_all(&data).await.map_err(BlobStoreError::Io)?;
            file.flush().await.map_err(BlobStoreError::Io)?;
        }
        tokio::fs::rename(&tmp, &full).await.map_err(BlobStoreError::Io)?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
