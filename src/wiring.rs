/*!
 * Assembles an `avesa_engine::Context` and `EndpointRegistry` from an
 * `AppConfig` — the one place that chooses concrete `StateStore`/
 * `BlobStore`/`ColumnStore`/`SecretStore`/connector implementations, so
 * every other module only ever depends on the capability traits.
 */

use crate::config::AppConfig;
use crate::error::Result;
use avesa_canonical::{CanonicalApplier, KeyLockTable};
use avesa_connect::{ConnectorRegistry, HttpConnector, ResilientConnector};
use avesa_engine::{Context, EndpointRegistry};
use avesa_interface::{FsBlobStore, MemColumnStore, StaticSecretStore};
use avesa_mapping::MappingRegistry;
use avesa_observability::{AuditSigner, UnifiedLogger};
use avesa_resilience::circuit_breaker::CircuitBreakerConfig;
use avesa_state::SqliteStateStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Wiring {
    pub ctx: Context,
    pub endpoints: Arc<EndpointRegistry>,
}

/// Build the full capability graph for the CLI process. `state_store_endpoint`
/// is a sqlite path, `blob_store_endpoint` a filesystem root, and
/// `secret_store_endpoint` a JSON file of `{credentials_ref: secret}` pairs
/// when it exists, falling back to plain environment variables otherwise.
pub async fn build(config: &AppConfig, audit: Arc<UnifiedLogger>) -> Result<Wiring> {
    let state = Arc::new(SqliteStateStore::open(&config.state_store_endpoint).await?);
    let blob = Arc::new(FsBlobStore::new(config.blob_store_endpoint.clone()));
    let column_store = Arc::new(MemColumnStore::new());
    let secrets = Arc::new(load_secrets(config)?);

    let mut connectors = ConnectorRegistry::new();
    for service in &config.services {
        let http = HttpConnector::new(service.name.clone(), service.base_url.clone());
        let resilient = ResilientConnector::with_rate_limit_wait_max(
            Arc::new(http),
            service.requests_per_second,
            CircuitBreakerConfig::default(),
            config.engine_config().rate_limit_wait_max,
        );
        connectors.register(Arc::new(resilient));
    }

    let mapping = Arc::new(load_mappings(config)?);
    let canonical = Arc::new(CanonicalApplier {
        mapping,
        blob_store: blob.clone(),
        column_store,
        locks: Arc::new(KeyLockTable::default()),
        max_reject_ratio: config.reject_ratio_max,
    });

    let ctx = Context {
        state,
        blob,
        secrets,
        connectors: Arc::new(connectors),
        canonical,
        config: Arc::new(config.engine_config()),
        cancel: CancellationToken::new(),
        audit,
    };

    let mut endpoints = EndpointRegistry::new();
    for service in &config.services {
        let configs = service
            .endpoints
            .iter()
            .map(|e| avesa_core::EndpointConfig {
                path: e.path.clone(),
                canonical_table: e.canonical_table.clone(),
                enabled: e.enabled,
                page_size: e.page_size,
                order_by: e.order_by.clone(),
                incremental_field: e.incremental_field.clone(),
                sync_frequency: std::time::Duration::from_secs(e.sync_frequency_secs),
            })
            .collect();
        endpoints.register(service.name.clone(), configs);
    }

    Ok(Wiring { ctx, endpoints: Arc::new(endpoints) })
}

/// Builds the HMAC-chained audit logger (`spec` §10). Disabled — a no-op
/// sink — unless both `audit_log_path` and `AVESA_AUDIT_SECRET` are set, so
/// the compliance audit plane never blocks startup for deployments that
/// don't need it.
pub fn load_audit_logger(config: &AppConfig) -> Result<UnifiedLogger> {
    let Some(path) = config.audit_log_path.as_deref() else {
        return Ok(UnifiedLogger::disabled());
    };
    let signer = match AuditSigner::from_env() {
        Ok(signer) => signer,
        Err(_) => return Ok(UnifiedLogger::disabled()),
    };
    UnifiedLogger::new(Some(path), signer)
        .map_err(|err| crate::error::AppError::Config(format!("failed to open audit log: {err}")))
}

fn load_secrets(config: &AppConfig) -> Result<StaticSecretStore> {
    let path = std::path::Path::new(&config.secret_store_endpoint);
    if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let map: std::collections::HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|err| crate::error::AppError::Config(format!("invalid secrets file: {err}")))?;
        Ok(StaticSecretStore::new(map))
    } else {
        let refs = config
            .services
            .iter()
            .flat_map(|s| std::iter::once(format!("{}_credentials", s.name)));
        Ok(StaticSecretStore::from_env(refs))
    }
}

fn load_mappings(config: &AppConfig) -> Result<MappingRegistry> {
    let mut documents = Vec::new();
    if config.mapping_dir.exists() {
        for entry in std::fs::read_dir(&config.mapping_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)?;
            let doc = serde_json::from_str(&raw)
                .map_err(|err| crate::error::AppError::Config(format!("invalid mapping document {}: {err}", path.display())))?;
            documents.push(doc);
        }
    }
    Ok(MappingRegistry::load(documents)?)
}
