//! The transactional key/value layer tenants, service configs, watermarks,
//! jobs and chunk progress are persisted through.
//!
//! `StateStore` is deliberately single-item: every method touches exactly
//! one row, and conditional writes (`set_watermark`, `upsert_chunk`) are
//! implemented by backends as one atomic statement rather than a
//! read-modify-write pair, so callers never need an external lock to stay
//! crash-consistent.

use async_trait::async_trait;
use avesa_core::{ChunkProgress, Job, JobStatus, JobSummary, ServiceConfig, Tenant, Watermark};

pub mod buffered;
pub mod error;
pub mod mock;
pub mod sqlite;

pub use buffered::BufferedStateStore;
pub use error::{Result, StateError};
pub use mock::MockStateStore;
pub use sqlite::SqliteStateStore;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_tenants(&self) -> Result<Vec<Tenant>>;

    async fn create_tenant(&self, tenant: Tenant) -> Result<()>;

    async fn get_service_config(&self, tenant_id: &str, service: &str) -> Result<ServiceConfig>;

    async fn upsert_service_config(&self, config: ServiceConfig) -> Result<()>;

    /// Services configured for the tenant, enabled or not — callers filter.
    async fn list_service_configs(&self, tenant_id: &str) -> Result<Vec<ServiceConfig>>;

    /// Missing watermark is reported as epoch (`Watermark::epoch`), never
    /// `NotFound` — a table that has never been ingested is a normal start
    /// state, not an error.
    async fn get_watermark(&self, tenant_id: &str, table_name: &str) -> Result<Watermark>;

    /// Conditional on `ts >= existing.last_updated_ts`; fails with
    /// `StateError::Conflict` if the watermark has already advanced past
    /// `ts` — the caller (Table Processor) distinguishes that from a bug
    /// rather than silently clobbering a newer watermark.
    async fn set_watermark(
        &self,
        tenant_id: &str,
        table_name: &str,
        last_updated_ts: chrono::DateTime<chrono::Utc>,
        job_id: &str,
    ) -> Result<()>;

    async fn create_job(&self, job: &Job) -> Result<()>;

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        summary: Option<JobSummary>,
    ) -> Result<()>;

    async fn get_job(&self, job_id: &str) -> Result<Job>;

    /// Idempotent on `(job_id, chunk_id)`. If the existing row's status is
    /// terminal-succeeded, subsequent writes are rejected with
    /// `StateError::AlreadyTerminal` rather than overwritten — a retry that
    /// races a completed chunk must not un-succeed it.
    async fn upsert_chunk(&self, chunk: &ChunkProgress) -> Result<()>;

    async fn list_chunks(&self, job_id: &str) -> Result<Vec<ChunkProgress>>;

    async fn list_chunks_for_table(
        &self,
        job_id: &str,
        tenant_id: &str,
        table_name: &str,
    ) -> Result<Vec<ChunkProgress>>;
}
