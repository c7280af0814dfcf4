//! `StaticSecretStore`: resolves `credentials_ref` values against a fixed
//! in-memory map loaded once at startup from configuration or environment
//! variables. The reference implementation for tests and single-node
//! operation; a real deployment points `SecretStore` at a vault instead.

use crate::secret::{Result, SecretStore, SecretStoreError};
use async_trait::async_trait;
use std::collections::HashMap;

pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    /// Resolve each `credentials_ref` to the environment variable of the
    /// same name, skipping refs that have no corresponding variable set.
    pub fn from_env(refs: impl IntoIterator<Item = String>) -> Self {
        let secrets = refs
            .into_iter()
            .filter_map(|key| {
                let value = std::env::var(&key).ok()?;
                Some((key, value))
            })
            .collect();
        Self { secrets }
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn resolve(&self, credentials_ref: &str) -> Result<String> {
        self.secrets
            .get(credentials_ref)
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound(credentials_ref.to_string()))
    }
}
