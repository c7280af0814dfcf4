//! The AVESA data model.
//!
//! Every type here is a plain, owned, serde-round-trippable value — no
//! behavior lives on these structs beyond small constructors and the
//! deterministic chunk-id derivation. State transitions belong to the
//! crates that own the corresponding lifecycle (`avesa-state`,
//! `avesa-engine`, `avesa-canonical`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A tenant onboarded onto the platform. Immutable apart from soft-delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub company_name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A service enabled for a tenant (e.g. `connectwise`), secondary-keyed on
/// `(tenant_id, service_name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub tenant_id: String,
    pub service_name: String,
    pub enabled: bool,
    pub credentials_ref: String,
    pub endpoint_overrides: std::collections::BTreeMap<String, String>,
}

/// Static, versioned per-service endpoint configuration. Read-only at
/// runtime — populated from the connector registry, not the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub path: String,
    pub canonical_table: String,
    pub enabled: bool,
    pub page_size: u32,
    pub order_by: String,
    pub incremental_field: String,
    pub sync_frequency: std::time::Duration,
}

/// The greatest source timestamp durably ingested and counted for one
/// `(tenant_id, table_name)` pair. Monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub tenant_id: String,
    pub table_name: String,
    pub last_updated_ts: DateTime<Utc>,
    pub last_successful_job_id: String,
    pub updated_at: DateTime<Utc>,
}

impl Watermark {
    /// The watermark value for a table that has never been ingested.
    pub fn epoch(tenant_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            table_name: table_name.into(),
            last_updated_ts: DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is valid"),
            last_successful_job_id: String::new(),
            updated_at: DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is valid"),
        }
    }
}

/// What kind of run created a `Job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Scheduled,
    Manual,
    Backfill,
}

/// Terminal/non-terminal status of a `Job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Partial,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Partial | JobStatus::Failed)
    }
}

/// Per-table summary nested inside `JobSummary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub status: JobStatus,
    pub records_written: u64,
    pub error: Option<String>,
}

/// The full `Job.summary` structure from `spec` §7:
/// `{per_tenant: {per_table: {status, records_written, error?}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub per_tenant: std::collections::BTreeMap<String, std::collections::BTreeMap<String, TableSummary>>,
}

/// One orchestrator run — the unit of observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub run_kind: RunKind,
    pub tenant_set: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: JobSummary,
}

/// Terminal and non-terminal states for one ingestion chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    TimedOut,
}

impl ChunkStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkStatus::Succeeded | ChunkStatus::Failed)
    }
}

/// One (tenant, table, time-window) unit of raw ingestion. Primary key is
/// `(job_id, chunk_id)`; `chunk_id` is deterministic from
/// `(tenant_id, table_name, window_start, window_end)` so retries of the
/// same window reuse the same row instead of creating duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkProgress {
    pub job_id: String,
    pub tenant_id: String,
    pub table_name: String,
    pub chunk_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: ChunkStatus,
    pub attempt_count: u32,
    pub records_written: u64,
    pub raw_last_updated_max: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ChunkProgress {
    /// Deterministic chunk identity: `sha256(tenant|table|start|end)`,
    /// hex-encoded. Two planning passes over the same window always agree
    /// on the chunk id, which is what makes retries idempotent.
    pub fn derive_chunk_id(
        tenant_id: &str,
        table_name: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_bytes());
        hasher.update(b"|");
        hasher.update(table_name.as_bytes());
        hasher.update(b"|");
        hasher.update(window_start.to_rfc3339().as_bytes());
        hasher.update(b"|");
        hasher.update(window_end.to_rfc3339().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn new_pending(
        job_id: impl Into<String>,
        tenant_id: impl Into<String>,
        table_name: impl Into<String>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Self {
        let tenant_id = tenant_id.into();
        let table_name = table_name.into();
        let chunk_id = Self::derive_chunk_id(&tenant_id, &table_name, window_start, window_end);
        Self {
            job_id: job_id.into(),
            tenant_id,
            table_name,
            chunk_id,
            window_start,
            window_end,
            status: ChunkStatus::Pending,
            attempt_count: 0,
            records_written: 0,
            raw_last_updated_max: None,
            error: None,
        }
    }

    /// Deterministic blob path: `{tenant_id}/raw/{service}/{table}/{job_id}/{chunk_id}.parquet`.
    pub fn blob_path(&self, service: &str) -> String {
        format!(
            "{}/raw/{}/{}/{}/{}.parquet",
            self.tenant_id, service, self.table_name, self.job_id, self.chunk_id
        )
    }
}

/// One canonical, SCD-2-versioned business record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub tenant_id: String,
    pub id: String,
    /// Canonical business fields, keyed by canonical field name.
    pub fields: std::collections::BTreeMap<String, serde_json::Value>,
    pub source_system: String,
    pub source_id: String,
    pub last_updated: DateTime<Utc>,
    pub data_hash: String,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub is_current: bool,
    pub record_version: u32,
}

impl CanonicalRecord {
    /// `sha256` over the canonical fields in stable (sorted) key order —
    /// `BTreeMap` already iterates in key order, so this is just a stable
    /// serialization of `fields`.
    pub fn compute_data_hash(fields: &std::collections::BTreeMap<String, serde_json::Value>) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in fields {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let start = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let end = DateTime::<Utc>::from_timestamp(86_400, 0).unwrap();

        let a = ChunkProgress::derive_chunk_id("t1", "companies", start, end);
        let b = ChunkProgress::derive_chunk_id("t1", "companies", start, end);
        assert_eq!(a, b);

        let c = ChunkProgress::derive_chunk_id("t2", "companies", start, end);
        assert_ne!(a, c);
    }

    #[test]
    fn blob_path_matches_layout() {
        let start = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let end = DateTime::<Utc>::from_timestamp(86_400, 0).unwrap();
        let chunk = ChunkProgress::new_pending("job-1", "t1", "companies", start, end);

        let path = chunk.blob_path("connectwise");
        assert!(path.starts_with("t1/raw/connectwise/companies/job-1/"));
        assert!(path.ends_with(".parquet"));
    }

    #[test]
    fn data_hash_is_order_independent_of_insertion() {
        let mut a = std::collections::BTreeMap::new();
        a.insert("name".to_string(), serde_json::json!("Acme"));
        a.insert("id".to_string(), serde_json::json!("42"));

        let mut b = std::collections::BTreeMap::new();
        b.insert("id".to_string(), serde_json::json!("42"));
        b.insert("name".to_string(), serde_json::json!("Acme"));

        assert_eq!(CanonicalRecord::compute_data_hash(&a), CanonicalRecord::compute_data_hash(&b));
    }

    #[test]
    fn data_hash_changes_with_content() {
        let mut a = std::collections::BTreeMap::new();
        a.insert("name".to_string(), serde_json::json!("Acme"));

        let mut b = std::collections::BTreeMap::new();
        b.insert("name".to_string(), serde_json::json!("Acme Inc"));

        assert_ne!(CanonicalRecord::compute_data_hash(&a), CanonicalRecord::compute_data_hash(&b));
    }
}
