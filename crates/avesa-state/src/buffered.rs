//! `BufferedStateStore`: the "Disk Guardian" write-behind wrapper. Chunk
//! progress updates are the hottest write path in the pipeline (one per
//! chunk attempt); this batches them over an `mpsc` channel and flushes on
//! a timer or a size threshold instead of hitting the backing store once
//! per chunk.
//!
//! Every other `StateStore` method passes straight through to the inner
//! store — only `upsert_chunk` is buffered, since it is the only call the
//! Chunk Processor makes at per-chunk frequency.

use crate::error::{Result, StateError};
use crate::StateStore;
use async_trait::async_trait;
use avesa_core::{ChunkProgress, Job, JobStatus, JobSummary, ServiceConfig, Tenant, Watermark};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BufferedStateStoreConfig {
    pub channel_capacity: usize,
    pub max_batch: usize,
    pub flush_interval: Duration,
}

impl Default for BufferedStateStoreConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            max_batch: 200,
            flush_interval: Duration::from_millis(500),
        }
    }
}

pub struct BufferedStateStore<S: StateStore + 'static> {
    inner: Arc<S>,
    update_tx: mpsc::Sender<ChunkProgress>,
    shutdown_tx: RwLock<Option<oneshot::Sender<oneshot::Sender<()>>>>,
    worker: RwLock<Option<JoinHandle<()>>>,
}

impl<S: StateStore + 'static> BufferedStateStore<S> {
    pub fn new(inner: Arc<S>, config: BufferedStateStoreConfig) -> Self {
        let (update_tx, update_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let store_clone = inner.clone();
        let worker = tokio::spawn(run_guardian(store_clone, update_rx, shutdown_rx, config));

        Self {
            inner,
            update_tx,
            shutdown_tx: RwLock::new(Some(shutdown_tx)),
            worker: RwLock::new(Some(worker)),
        }
    }

    /// Flush any buffered updates and stop the background task. Safe to
    /// call once; subsequent calls are a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.shutdown_tx.write().await;
        if let Some(tx) = guard.take() {
            let (done_tx, done_rx) = oneshot::channel();
            if tx.send(done_tx).is_ok() {
                let _ = done_rx.await;
            }
        }
        if let Some(handle) = self.worker.write().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

async fn run_guardian<S: StateStore + 'static>(
    store: Arc<S>,
    mut update_rx: mpsc::Receiver<ChunkProgress>,
    mut shutdown_rx: oneshot::Receiver<oneshot::Sender<()>>,
    config: BufferedStateStoreConfig,
) {
    let mut buffer: Vec<ChunkProgress> = Vec::new();
    let mut flush_timer = tokio::time::interval(config.flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_update = update_rx.recv() => {
                match maybe_update {
                    Some(update) => {
                        buffer.push(update);
                        if buffer.len() >= config.max_batch {
                            flush(&store, &mut buffer).await;
                        }
                    }
                    None => {
                        flush(&store, &mut buffer).await;
                        return;
                    }
                }
            }
            _ = flush_timer.tick() => {
                if !buffer.is_empty() {
                    flush(&store, &mut buffer).await;
                }
            }
            done = &mut shutdown_rx => {
                info!(pending = buffer.len(), "flushing buffered chunk progress before shutdown");
                flush(&store, &mut buffer).await;
                if let Ok(ack) = done {
                    let _ = ack.send(());
                }
                return;
            }
        }
    }
}

async fn flush<S: StateStore>(store: &Arc<S>, buffer: &mut Vec<ChunkProgress>) {
    for chunk in buffer.drain(..) {
        if let Err(err) = store.upsert_chunk(&chunk).await {
            warn!(chunk_id = %chunk.chunk_id, job_id = %chunk.job_id, error = %err, "buffered chunk write failed");
        }
    }
}

#[async_trait]
impl<S: StateStore + 'static> StateStore for BufferedStateStore<S> {
    async fn get_tenants(&self) -> Result<Vec<Tenant>> {
        self.inner.get_tenants().await
    }

    async fn create_tenant(&self, tenant: Tenant) -> Result<()> {
        self.inner.create_tenant(tenant).await
    }

    async fn get_service_config(&self, tenant_id: &str, service: &str) -> Result<ServiceConfig> {
        self.inner.get_service_config(tenant_id, service).await
    }

    async fn upsert_service_config(&self, config: ServiceConfig) -> Result<()> {
        self.inner.upsert_service_config(config).await
    }

    async fn list_service_configs(&self, tenant_id: &str) -> Result<Vec<ServiceConfig>> {
        self.inner.list_service_configs(tenant_id).await
    }

    async fn get_watermark(&self, tenant_id: &str, table_name: &str) -> Result<Watermark> {
        self.inner.get_watermark(tenant_id, table_name).await
    }

    async fn set_watermark(
        &self,
        tenant_id: &str,
        table_name: &str,
        last_updated_ts: DateTime<Utc>,
        job_id: &str,
    ) -> Result<()> {
        self.inner.set_watermark(tenant_id, table_name, last_updated_ts, job_id).await
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        self.inner.create_job(job).await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        summary: Option<JobSummary>,
    ) -> Result<()> {
        self.inner.update_job_status(job_id, status, summary).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        self.inner.get_job(job_id).await
    }

    async fn upsert_chunk(&self, chunk: &ChunkProgress) -> Result<()> {
        self.update_tx
            .send(chunk.clone())
            .await
            .map_err(|_| StateError::conflict("buffered state store worker has shut down"))
    }

    async fn list_chunks(&self, job_id: &str) -> Result<Vec<ChunkProgress>> {
        self.inner.list_chunks(job_id).await
    }

    async fn list_chunks_for_table(
        &self,
        job_id: &str,
        tenant_id: &str,
        table_name: &str,
    ) -> Result<Vec<ChunkProgress>> {
        self.inner.list_chunks_for_table(job_id, tenant_id, table_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStateStore;
    use avesa_core::ChunkStatus;

    #[tokio::test]
    async fn buffered_write_becomes_visible_after_shutdown() {
        let inner = Arc::new(MockStateStore::new());
        let buffered = BufferedStateStore::new(
            inner.clone(),
            BufferedStateStoreConfig {
                flush_interval: Duration::from_secs(60),
                ..Default::default()
            },
        );

        let mut chunk = ChunkProgress::new_pending("job-1", "t1", "companies", Utc::now(), Utc::now());
        chunk.status = ChunkStatus::Succeeded;
        buffered.upsert_chunk(&chunk).await.unwrap();

        buffered.shutdown().await.unwrap();

        let chunks = inner.list_chunks("job-1").await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn size_threshold_flushes_before_shutdown() {
        let inner = Arc::new(MockStateStore::new());
        let buffered = BufferedStateStore::new(
            inner.clone(),
            BufferedStateStoreConfig {
                max_batch: 2,
                flush_interval: Duration::from_secs(60),
                ..Default::default()
            },
        );

        for i in 0..2 {
            let chunk = ChunkProgress::new_pending(
                "job-1",
                "t1",
                "companies",
                Utc::now(),
                Utc::now() + chrono::Duration::seconds(i),
            );
            buffered.upsert_chunk(&chunk).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        let chunks = inner.list_chunks("job-1").await.unwrap();
        assert_eq!(chunks.len(), 2);

        buffered.shutdown().await.unwrap();
    }
}
