//! The Backfill Planner (`spec` §4.9): split a historical `[start, end)`
//! window for one `(tenant, service, table)` into fixed-duration chunks
//! up front and drive them through the same Chunk Processor path the
//! Table Processor uses for incremental runs.
//!
//! A backfill creates its own `Job` row with `run_kind = Backfill` rather
//! than piggy-backing on an orchestrator run, since it targets one table
//! for one tenant instead of fanning out across the whole tenant/table
//! tree (`spec` §6 `avesa backfill`).

use crate::chunk;
use crate::context::Context;
use crate::table::{self, TableInput, TableOutcome};
use avesa_core::{Job, JobStatus, JobSummary, RunKind, TableSummary, Watermark};
use avesa_state::StateStore;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, info_span, Instrument};

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("state error: {0}")]
    State(#[from] avesa_state::StateError),
    #[error("connector error: {0}")]
    Connect(#[from] avesa_connect::ConnectError),
    #[error("backfill window is empty or inverted: start={start} end={end}")]
    EmptyWindow { start: DateTime<Utc>, end: DateTime<Utc> },
}

/// One `(tenant, service, table)` historical window to replay
/// (`spec` §4.9 input).
#[derive(Debug, Clone)]
pub struct BackfillRequest {
    pub tenant_id: String,
    pub service: String,
    pub endpoint_path: String,
    pub table_name: String,
    pub canonical_table: String,
    pub credentials_ref: String,
    pub page_size: u32,
    pub incremental_field: String,
    pub order_by: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub chunk_duration: Duration,
}

pub struct BackfillResult {
    pub job_id: String,
    pub status: JobStatus,
    pub table: TableOutcome,
}

/// Plans every chunk window up front, dispatches them through the bounded
/// chunk map, and advances the incremental watermark by the same
/// contiguous-succeeded-prefix rule as `table::process_table` — so a
/// failure mid-backfill never blocks a later incremental run from
/// resuming past whatever did succeed (`spec` §4.9).
pub async fn run_backfill(ctx: &Context, request: BackfillRequest) -> Result<BackfillResult, BackfillError> {
    if request.start >= request.end {
        return Err(BackfillError::EmptyWindow { start: request.start, end: request.end });
    }

    ctx.connectors.validate_services(std::slice::from_ref(&request.service))?;

    let job_id = uuid::Uuid::new_v4().to_string();
    let ctx = ctx.child();
    let span = info_span!("backfill", job_id = %job_id, tenant_id = %request.tenant_id, table = %request.table_name);

    async {
        let job = Job {
            job_id: job_id.clone(),
            run_kind: RunKind::Backfill,
            tenant_set: vec![request.tenant_id.clone()],
            status: JobStatus::Running,
            created_at: chrono::Utc::now(),
            finished_at: None,
            summary: JobSummary::default(),
        };
        ctx.state.create_job(&job).await?;

        let credentials = ctx.secrets.resolve(&request.credentials_ref).await.map_err(|err| {
            avesa_connect::ConnectError::AuthFailure(err.to_string())
        })?;

        let table_input = TableInput {
            job_id: job_id.clone(),
            tenant_id: request.tenant_id.clone(),
            service: request.service.clone(),
            table_name: request.table_name.clone(),
            canonical_table: request.canonical_table.clone(),
            endpoint_path: request.endpoint_path.clone(),
            credentials,
            page_size: request.page_size,
            incremental_field: request.incremental_field.clone(),
            order_by: request.order_by.clone(),
            force_full_sync: false,
        };

        let windows = table::plan_windows(request.start, request.end, request.chunk_duration);
        info!(window_count = windows.len(), "backfill planned");

        let chunks_concurrency = ctx.config.chunks_concurrency.max(1);
        let ctx_ref = &ctx;
        let results = stream::iter(windows.into_iter().map(|(start, end)| {
            let input = table_input.clone();
            async move {
                let chunk_input = table::chunk_input_for(&input, start, end, None);
                let outcome = chunk::process_chunk(ctx_ref, chunk_input.clone()).await;
                table::resume_once_if_timed_out(ctx_ref, chunk_input, outcome).await
            }
        }))
        .buffer_unordered(chunks_concurrency)
        .collect::<Vec<_>>()
        .await;

        let mut progresses: Vec<_> = results.into_iter().map(|o| o.progress).collect();
        progresses.sort_by_key(|c| c.window_start);

        // Contiguity for the prefix rule is judged against the backfill's
        // own start, not the table's live incremental watermark — a
        // historical window starting well behind the current watermark
        // must not be mistaken for a contiguity gap.
        let synthetic_watermark = Watermark {
            tenant_id: request.tenant_id.clone(),
            table_name: request.table_name.clone(),
            last_updated_ts: request.start,
            last_successful_job_id: String::new(),
            updated_at: request.start,
        };
        let table_outcome = table::summarize(&ctx, &table_input, &synthetic_watermark, progresses).await;

        let mut summary = JobSummary::default();
        summary.per_tenant.entry(request.tenant_id.clone()).or_default().insert(
            request.table_name.clone(),
            TableSummary {
                status: table_outcome.status,
                records_written: table_outcome.records_written,
                error: table_outcome.error.clone(),
            },
        );
        ctx.state.update_job_status(&job_id, table_outcome.status, Some(summary)).await?;

        Ok(BackfillResult { job_id, status: table_outcome.status, table: table_outcome })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use avesa_canonical::{CanonicalApplier, KeyLockTable};
    use avesa_connect::{ConnectorRegistry, MockConnector};
    use avesa_interface::{FsBlobStore, MemColumnStore, StaticSecretStore};
    use avesa_mapping::MappingRegistry;
    use avesa_state::MockStateStore;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn test_context(tmp: &std::path::Path, connector: MockConnector) -> Context {
        let state = Arc::new(MockStateStore::new());
        let blob = Arc::new(FsBlobStore::new(tmp));
        let column_store = Arc::new(MemColumnStore::new());
        let secrets = Arc::new(StaticSecretStore::new(HashMap::from([(
            "ref1".to_string(),
            "secret-token".to_string(),
        )])));
        let mut connectors = ConnectorRegistry::new();
        connectors.register(Arc::new(connector));

        let mapping = Arc::new(MappingRegistry::load(vec![]).unwrap());
        let canonical = Arc::new(CanonicalApplier {
            mapping,
            blob_store: blob.clone(),
            column_store,
            locks: Arc::new(KeyLockTable::default()),
            max_reject_ratio: 5.0,
        });

        Context {
            state,
            blob,
            secrets,
            connectors: Arc::new(connectors),
            canonical,
            config: Arc::new(EngineConfig::default()),
            cancel: CancellationToken::new(),
            audit: Arc::new(avesa_observability::UnifiedLogger::disabled()),
        }
    }

    fn base_request() -> BackfillRequest {
        BackfillRequest {
            tenant_id: "t1".to_string(),
            service: "connectwise".to_string(),
            endpoint_path: "/company/companies".to_string(),
            table_name: "companies".to_string(),
            canonical_table: "companies".to_string(),
            credentials_ref: "ref1".to_string(),
            page_size: 100,
            incremental_field: "lastUpdated".to_string(),
            order_by: "id".to_string(),
            start: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            end: DateTime::<Utc>::from_timestamp(5 * 86_400, 0).unwrap(),
            chunk_duration: Duration::from_secs(2 * 86_400),
        }
    }

    #[tokio::test]
    async fn backfill_plans_multiple_chunks_and_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let page = avesa_connect::FetchPageOutcome {
            records: vec![json!({"id": "42", "name": "Acme"})],
            next_cursor: None,
            raw_last_updated_max: None,
        };
        let ctx = test_context(tmp.path(), MockConnector::with_pages("connectwise", vec![page]));

        let result = run_backfill(&ctx, base_request()).await.unwrap();
        assert_eq!(result.status, JobStatus::Succeeded);
        // [0, 5d) split into 2-day chunks => 3 windows.
        let chunks = ctx.state.list_chunks(&result.job_id).await.unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn backfill_rejects_inverted_window() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), MockConnector::empty("connectwise"));
        let mut request = base_request();
        request.end = request.start;

        let err = run_backfill(&ctx, request).await.unwrap_err();
        assert!(matches!(err, BackfillError::EmptyWindow { .. }));
    }

    #[tokio::test]
    async fn backfill_fails_fast_on_unknown_service() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), MockConnector::empty("connectwise"));
        let mut request = base_request();
        request.service = "halopsa".to_string();

        let err = run_backfill(&ctx, request).await.unwrap_err();
        assert!(matches!(err, BackfillError::Connect(avesa_connect::ConnectError::UnknownService(_))));
    }
}
