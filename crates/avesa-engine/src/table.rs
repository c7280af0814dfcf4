//! The Table Processor (`spec` §4.5): plan chunks for one `(tenant, table)`,
//! drive a bounded-parallel chunk map, and advance the watermark by the
//! contiguous-succeeded-prefix rule.

use crate::chunk::{self, ChunkInput, ChunkOutcome};
use crate::context::Context;
use avesa_core::{ChunkProgress, ChunkStatus, JobStatus, Watermark};
use avesa_observability::TraceContext;
use avesa_state::StateStore;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

/// One `(tenant, service, table)` unit of work for the Table Processor.
/// The canonical-table name is tracked separately only for the Tenant
/// Processor's canonical-dispatch bookkeeping; the Table Processor itself
/// never touches `ColumnStore`.
#[derive(Debug, Clone)]
pub struct TableInput {
    pub job_id: String,
    pub tenant_id: String,
    pub service: String,
    pub table_name: String,
    pub canonical_table: String,
    pub endpoint_path: String,
    pub credentials: String,
    pub page_size: u32,
    pub incremental_field: String,
    pub order_by: String,
    pub force_full_sync: bool,
}

#[derive(Debug, Clone)]
pub struct TableOutcome {
    pub table_name: String,
    pub canonical_table: String,
    pub status: JobStatus,
    pub records_written: u64,
    pub error: Option<String>,
}

/// Runs one table to completion: plans its chunks, executes the bounded
/// chunk map (with one timeout resumption per chunk), and advances the
/// watermark per the contiguous-prefix rule.
pub async fn process_table(ctx: &Context, input: TableInput) -> TableOutcome {
    let watermark = if input.force_full_sync {
        Watermark::epoch(&input.tenant_id, &input.table_name)
    } else {
        match ctx.state.get_watermark(&input.tenant_id, &input.table_name).await {
            Ok(wm) => wm,
            Err(err) => {
                return TableOutcome {
                    table_name: input.table_name,
                    canonical_table: input.canonical_table,
                    status: JobStatus::Failed,
                    records_written: 0,
                    error: Some(err.to_string()),
                };
            }
        }
    };

    let now = Utc::now();
    let window_end_bound = now - chrono::Duration::from_std(ctx.config.clock_skew_guard).unwrap_or_default();

    if watermark.last_updated_ts >= window_end_bound {
        return TableOutcome {
            table_name: input.table_name,
            canonical_table: input.canonical_table,
            status: JobStatus::Succeeded,
            records_written: 0,
            error: None,
        };
    }

    let windows = plan_windows(watermark.last_updated_ts, window_end_bound, ctx.config.chunk_duration);

    let trace = TraceContext::new_root()
        .with_job(input.job_id.clone())
        .with_file_id(format!("{}-{}", input.tenant_id, input.table_name));
    let started_at = std::time::Instant::now();
    let _ = ctx.audit.emit_table_start(&trace, &input.tenant_id, &input.table_name, windows.len() as u64);

    let chunks_concurrency = ctx.config.chunks_concurrency.max(1);
    let results = stream::iter(windows.into_iter().map(|(start, end)| {
        let input = input.clone();
        async move {
            let chunk_input = chunk_input_for(&input, start, end, None);
            let outcome = chunk::process_chunk(ctx, chunk_input.clone()).await;
            resume_once_if_timed_out(ctx, chunk_input, outcome).await
        }
    }))
    .buffer_unordered(chunks_concurrency)
    .collect::<Vec<_>>()
    .await;

    let mut progresses: Vec<ChunkProgress> = results.into_iter().map(|o| o.progress).collect();
    progresses.sort_by_key(|c| c.window_start);

    let outcome = summarize(ctx, &input, &watermark, progresses).await;
    let duration_ms = started_at.elapsed().as_millis() as u64;
    match outcome.status {
        JobStatus::Failed => {
            let _ = ctx.audit.emit_table_failed(&trace, outcome.error.as_deref().unwrap_or("table failed"), outcome.records_written);
        }
        _ => {
            let watermark_label = ctx
                .state
                .get_watermark(&input.tenant_id, &input.table_name)
                .await
                .map(|wm| wm.last_updated_ts.to_rfc3339())
                .unwrap_or_default();
            let _ = ctx.audit.emit_table_complete(&trace, outcome.records_written, duration_ms, &watermark_label);
        }
    }
    outcome
}

/// Split `[start, end)` into fixed-duration windows. A watermark equal to
/// `end` produces no windows (handled by the caller before this is
/// reached); any remainder shorter than `chunk_duration` becomes its own
/// final, shorter window.
pub(crate) fn plan_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chunk_duration: std::time::Duration,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let step = chrono::Duration::from_std(chunk_duration).unwrap_or(chrono::Duration::days(2));
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + step).min(end);
        windows.push((cursor, next));
        cursor = next;
    }
    windows
}

pub(crate) fn chunk_input_for(table: &TableInput, start: DateTime<Utc>, end: DateTime<Utc>, resume_cursor: Option<String>) -> ChunkInput {
    ChunkInput {
        job_id: table.job_id.clone(),
        tenant_id: table.tenant_id.clone(),
        service: table.service.clone(),
        endpoint_path: table.endpoint_path.clone(),
        table_name: table.table_name.clone(),
        credentials: table.credentials.clone(),
        window_start: start,
        window_end: end,
        page_size: table.page_size,
        incremental_field: table.incremental_field.clone(),
        order_by: table.order_by.clone(),
        resume_cursor,
    }
}

/// A chunk that timed out is eligible for exactly one resumption
/// (`spec` §4.4). Timing out twice makes it terminally `failed`.
pub(crate) async fn resume_once_if_timed_out(ctx: &Context, input: ChunkInput, outcome: ChunkOutcome) -> ChunkOutcome {
    if outcome.progress.status != ChunkStatus::TimedOut {
        return outcome;
    }

    warn!(chunk_id = %outcome.progress.chunk_id, "chunk timed out, resuming once");
    let service = input.service.clone();
    let resumed_input = ChunkInput { resume_cursor: outcome.last_cursor, ..input };
    let mut retried = chunk::process_chunk(ctx, resumed_input).await;

    if retried.progress.status == ChunkStatus::TimedOut {
        retried.progress.status = ChunkStatus::Failed;
        retried.progress.error = Some("chunk timed out twice".to_string());
        let _ = ctx.state.upsert_chunk(&retried.progress).await;
        avesa_observability::metrics::inc_chunk(&service, "failed");
    }
    retried
}

/// Aggregate terminal chunk rows into a table-level outcome and advance
/// the watermark per the contiguous-succeeded-prefix rule (`spec` §4.5
/// step 6).
pub(crate) async fn summarize(
    ctx: &Context,
    input: &TableInput,
    watermark: &Watermark,
    progresses: Vec<ChunkProgress>,
) -> TableOutcome {
    let records_written: u64 = progresses.iter().map(|c| c.records_written).sum();
    let all_succeeded = progresses.iter().all(|c| c.status == ChunkStatus::Succeeded);
    let any_succeeded = progresses.iter().any(|c| c.status == ChunkStatus::Succeeded);

    if progresses.is_empty() {
        return TableOutcome {
            table_name: input.table_name.clone(),
            canonical_table: input.canonical_table.clone(),
            status: JobStatus::Succeeded,
            records_written: 0,
            error: None,
        };
    }

    if all_succeeded {
        if let Some(max_ts) = progresses.iter().filter_map(|c| c.raw_last_updated_max).max() {
            advance_watermark(ctx, input, max_ts).await;
        }
        return TableOutcome {
            table_name: input.table_name.clone(),
            canonical_table: input.canonical_table.clone(),
            status: JobStatus::Succeeded,
            records_written,
            error: None,
        };
    }

    // Contiguous-prefix rule: walk chunks in window_start order; stop at
    // the first non-succeeded chunk. The watermark advances only to the
    // largest window_end within that prefix.
    let mut prefix_end: Option<DateTime<Utc>> = None;
    let mut expected_start = watermark.last_updated_ts;
    for chunk in &progresses {
        if chunk.status != ChunkStatus::Succeeded || chunk.window_start != expected_start {
            break;
        }
        prefix_end = Some(chunk.window_end);
        expected_start = chunk.window_end;
    }

    if let Some(end) = prefix_end {
        advance_watermark(ctx, input, end).await;
    }

    let status = if any_succeeded { JobStatus::Partial } else { JobStatus::Failed };
    let error = progresses.iter().find_map(|c| c.error.clone());

    TableOutcome {
        table_name: input.table_name.clone(),
        canonical_table: input.canonical_table.clone(),
        status,
        records_written,
        error,
    }
}

async fn advance_watermark(ctx: &Context, input: &TableInput, new_ts: DateTime<Utc>) {
    match ctx.state.set_watermark(&input.tenant_id, &input.table_name, new_ts, &input.job_id).await {
        Ok(()) => {
            info!(tenant_id = %input.tenant_id, table = %input.table_name, watermark = %new_ts, "watermark advanced");
            let lag_seconds = (Utc::now() - new_ts).num_milliseconds() as f64 / 1000.0;
            avesa_observability::metrics::set_watermark_lag(&input.tenant_id, &input.table_name, lag_seconds.max(0.0));
        }
        Err(err) if matches!(err, avesa_state::StateError::Conflict(_)) => {
            info!(tenant_id = %input.tenant_id, table = %input.table_name, "watermark already advanced past this run, keeping existing value");
        }
        Err(err) => warn!(tenant_id = %input.tenant_id, table = %input.table_name, error = %err, "failed to advance watermark"),
    }
}
