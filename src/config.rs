/*!
 * Layered configuration for the AVESA CLI (`spec` §6).
 *
 * Precedence, lowest to highest: built-in defaults, a TOML config file
 * (`--config`, default `avesa.toml`), then `AVESA_*` environment
 * variables. The engine's own concurrency/timeout knobs live in
 * `avesa_engine::EngineConfig`; this struct is the superset `spec` §6
 * names, including the capability endpoints and the static service/
 * endpoint registry a real deployment would otherwise resolve from a
 * control plane.
 */

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDef {
    pub path: String,
    pub canonical_table: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_order_by")]
    pub order_by: String,
    pub incremental_field: String,
    #[serde(default = "default_sync_frequency_secs")]
    pub sync_frequency_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_page_size() -> u32 {
    100
}
fn default_order_by() -> String {
    "id".to_string()
}
fn default_sync_frequency_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
}

fn default_requests_per_second() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub state_store_endpoint: String,
    pub blob_store_endpoint: String,
    pub column_store_endpoint: String,
    pub secret_store_endpoint: String,
    pub mapping_dir: PathBuf,

    pub tenants_concurrency: usize,
    pub tables_concurrency: usize,
    pub chunks_concurrency: usize,
    pub chunk_duration_secs: u64,
    pub chunk_timeout_secs: u64,
    pub job_timeout_secs: u64,
    pub max_pages_in_memory: usize,
    pub rate_limit_wait_max_secs: u64,
    pub reject_ratio_max: f64,
    pub clock_skew_guard_secs: u64,

    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Where to persist the HMAC-chained audit log (`avesa_observability`).
    /// Only active when `AVESA_AUDIT_SECRET` is also set in the
    /// environment — an unset secret disables the audit plane rather than
    /// failing startup, since it is a compliance add-on, not a load-bearing
    /// dependency of the pipeline itself.
    pub audit_log_path: Option<PathBuf>,

    pub services: Vec<ServiceDef>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = avesa_engine::EngineConfig::default();
        Self {
            state_store_endpoint: "avesa.db".to_string(),
            blob_store_endpoint: "./data/blobs".to_string(),
            column_store_endpoint: "memory".to_string(),
            secret_store_endpoint: "./secrets.json".to_string(),
            mapping_dir: PathBuf::from("./mappings"),
            tenants_concurrency: defaults.tenants_concurrency,
            tables_concurrency: defaults.tables_concurrency,
            chunks_concurrency: defaults.chunks_concurrency,
            chunk_duration_secs: defaults.chunk_duration.as_secs(),
            chunk_timeout_secs: defaults.chunk_timeout.as_secs(),
            job_timeout_secs: defaults.job_timeout.as_secs(),
            max_pages_in_memory: defaults.max_pages_in_memory,
            rate_limit_wait_max_secs: defaults.rate_limit_wait_max.as_secs(),
            reject_ratio_max: defaults.reject_ratio_max,
            clock_skew_guard_secs: defaults.clock_skew_guard.as_secs(),
            log_level: "info".to_string(),
            log_file: None,
            audit_log_path: None,
            services: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load the config file at `path` if it exists, layer `AVESA_*`
    /// environment overrides on top, and fall back to built-in defaults
    /// for anything neither sets.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw)?
            }
            Some(p) => return Err(AppError::Config(format!("config file not found: {}", p.display()))),
            None => {
                let default_path = Path::new("avesa.toml");
                if default_path.exists() {
                    let raw = std::fs::read_to_string(default_path)?;
                    toml::from_str(&raw)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("AVESA_STATE_STORE_ENDPOINT") {
            self.state_store_endpoint = v;
        }
        if let Ok(v) = std::env::var("AVESA_BLOB_STORE_ENDPOINT") {
            self.blob_store_endpoint = v;
        }
        if let Ok(v) = std::env::var("AVESA_COLUMN_STORE_ENDPOINT") {
            self.column_store_endpoint = v;
        }
        if let Ok(v) = std::env::var("AVESA_SECRET_STORE_ENDPOINT") {
            self.secret_store_endpoint = v;
        }
        if let Ok(v) = std::env::var("AVESA_TENANTS_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.tenants_concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("AVESA_TABLES_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.tables_concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("AVESA_CHUNKS_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.chunks_concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("AVESA_CHUNK_DURATION_SECS") {
            if let Ok(n) = v.parse() {
                self.chunk_duration_secs = n;
            }
        }
        if let Ok(v) = std::env::var("AVESA_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    pub fn engine_config(&self) -> avesa_engine::EngineConfig {
        avesa_engine::EngineConfig {
            tenants_concurrency: self.tenants_concurrency,
            tables_concurrency: self.tables_concurrency,
            chunks_concurrency: self.chunks_concurrency,
            chunk_duration: Duration::from_secs(self.chunk_duration_secs),
            chunk_timeout: Duration::from_secs(self.chunk_timeout_secs),
            job_timeout: Duration::from_secs(self.job_timeout_secs),
            max_pages_in_memory: self.max_pages_in_memory,
            rate_limit_wait_max: Duration::from_secs(self.rate_limit_wait_max_secs),
            reject_ratio_max: self.reject_ratio_max,
            clock_skew_guard: Duration::from_secs(self.clock_skew_guard_secs),
        }
    }
}
