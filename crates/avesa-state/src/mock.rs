//! In-memory `StateStore`, for unit tests that want a real implementation
//! of the conditional-write semantics without a database.

use crate::error::{Result, StateError};
use crate::StateStore;
use async_trait::async_trait;
use avesa_core::{ChunkProgress, ChunkStatus, Job, JobStatus, JobSummary, ServiceConfig, Tenant, Watermark};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    tenants: HashMap<String, Tenant>,
    service_configs: HashMap<(String, String), ServiceConfig>,
    watermarks: HashMap<(String, String), Watermark>,
    jobs: HashMap<String, Job>,
    chunks: HashMap<(String, String), ChunkProgress>,
}

#[derive(Default)]
pub struct MockStateStore {
    inner: Mutex<Inner>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MockStateStore {
    async fn get_tenants(&self) -> Result<Vec<Tenant>> {
        let inner = self.inner.lock().unwrap();
        let mut tenants: Vec<_> = inner.tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(tenants)
    }

    async fn create_tenant(&self, tenant: Tenant) -> Result<()> {
        self.inner.lock().unwrap().tenants.insert(tenant.tenant_id.clone(), tenant);
        Ok(())
    }

    async fn get_service_config(&self, tenant_id: &str, service: &str) -> Result<ServiceConfig> {
        self.inner
            .lock()
            .unwrap()
            .service_configs
            .get(&(tenant_id.to_string(), service.to_string()))
            .cloned()
            .ok_or_else(|| StateError::not_found(format!("service config {tenant_id}/{service}")))
    }

    async fn upsert_service_config(&self, config: ServiceConfig) -> Result<()> {
        let key = (config.tenant_id.clone(), config.service_name.clone());
        self.inner.lock().unwrap().service_configs.insert(key, config);
        Ok(())
    }

    async fn list_service_configs(&self, tenant_id: &str) -> Result<Vec<ServiceConfig>> {
        let inner = self.inner.lock().unwrap();
        let mut configs: Vec<_> = inner
            .service_configs
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(configs)
    }

    async fn get_watermark(&self, tenant_id: &str, table_name: &str) -> Result<Watermark> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .watermarks
            .get(&(tenant_id.to_string(), table_name.to_string()))
            .cloned()
            .unwrap_or_else(|| Watermark::epoch(tenant_id, table_name)))
    }

    async fn set_watermark(
        &self,
        tenant_id: &str,
        table_name: &str,
        last_updated_ts: DateTime<Utc>,
        job_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let key = (tenant_id.to_string(), table_name.to_string());
        if let Some(existing) = inner.watermarks.get(&key) {
            if last_updated_ts < existing.last_updated_ts {
                return Err(StateError::conflict(format!(
                    "watermark for {tenant_id}/{table_name} is already at or past {last_updated_ts}"
                )));
            }
        }
        inner.watermarks.insert(
            key,
            Watermark {
                tenant_id: tenant_id.to_string(),
                table_name: table_name.to_string(),
                last_updated_ts,
                last_successful_job_id: job_id.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        self.inner.lock().unwrap().jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        summary: Option<JobSummary>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StateError::not_found(format!("job {job_id}")))?;
        job.status = status;
        if status.is_terminal() {
            job.finished_at = Some(Utc::now());
        }
        if let Some(summary) = summary {
            job.summary = summary;
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| StateError::not_found(format!("job {job_id}")))
    }

    async fn upsert_chunk(&self, chunk: &ChunkProgress) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let key = (chunk.job_id.clone(), chunk.chunk_id.clone());
        if let Some(existing) = inner.chunks.get(&key) {
            if existing.status == ChunkStatus::Succeeded {
                return Err(StateError::already_terminal(format!(
                    "chunk {} for job {} already succeeded",
                    chunk.chunk_id, chunk.job_id
                )));
            }
        }
        inner.chunks.insert(key, chunk.clone());
        Ok(())
    }

    async fn list_chunks(&self, job_id: &str) -> Result<Vec<ChunkProgress>> {
        let inner = self.inner.lock().unwrap();
        let mut chunks: Vec<_> = inner.chunks.values().filter(|c| c.job_id == job_id).cloned().collect();
        chunks.sort_by(|a, b| (&a.tenant_id, &a.table_name, a.window_start).cmp(&(&b.tenant_id, &b.table_name, b.window_start)));
        Ok(chunks)
    }

    async fn list_chunks_for_table(
        &self,
        job_id: &str,
        tenant_id: &str,
        table_name: &str,
    ) -> Result<Vec<ChunkProgress>> {
        let inner = self.inner.lock().unwrap();
        let mut chunks: Vec<_> = inner
            .chunks
            .values()
            .filter(|c| c.job_id == job_id && c.tenant_id == tenant_id && c.table_name == table_name)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.window_start);
        Ok(chunks)
    }
}
