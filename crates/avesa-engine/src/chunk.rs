//! The Chunk Processor (`spec` §4.4): fetch one page-range for one
//! (tenant, table, chunk), write the raw blob, and settle the chunk's
//! state to a terminal status.

use crate::context::Context;
use avesa_connect::{FetchPageOutcome, FetchPageRequest, SourceConnector};
use avesa_core::{cancellable, AvesaError, ChunkProgress, ChunkStatus};
use avesa_interface::blob::BlobStore;
use avesa_interface::raw_codec;
use avesa_resilience::retry::{RetryClass, RetryPolicy};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the Chunk Processor needs beyond the shared [`Context`].
/// One value per `(tenant, table, window)`; `chunk_id` is assumed already
/// derived by the caller (the Table Processor) via
/// `ChunkProgress::derive_chunk_id`.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub job_id: String,
    pub tenant_id: String,
    pub service: String,
    pub endpoint_path: String,
    pub table_name: String,
    pub credentials: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub page_size: u32,
    pub incremental_field: String,
    pub order_by: String,
    /// Set by the Table Processor when re-enqueuing a chunk that timed out
    /// once and the connector reported a cursor before the deadline hit.
    pub resume_cursor: Option<String>,
}

/// The terminal `ChunkProgress` row plus the last cursor the connector
/// reported, if any — not itself persisted on `ChunkProgress`, but handed
/// back so the Table Processor can resume a timed-out chunk within the
/// same run without re-fetching pages it already consumed.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub progress: ChunkProgress,
    pub last_cursor: Option<String>,
}

fn classify_avesa_error(err: &AvesaError) -> RetryClass {
    if err.is_retryable() {
        RetryClass::Retry
    } else {
        RetryClass::Fatal
    }
}

/// Runs one chunk to a terminal `ChunkProgress`. Never panics and never
/// returns a bare `Err` — every failure mode, cancellation included, is
/// folded into the returned row's `status`/`error` so the Table Processor
/// can treat every chunk outcome uniformly.
pub async fn process_chunk(ctx: &Context, input: ChunkInput) -> ChunkOutcome {
    let window_start = input.window_start;
    let window_end = input.window_end;
    let chunk_id = ChunkProgress::derive_chunk_id(&input.tenant_id, &input.table_name, window_start, window_end);

    let mut chunk = load_or_create(ctx, &input, &chunk_id).await;
    chunk.status = ChunkStatus::InProgress;
    chunk.attempt_count += 1;
    if let Err(err) = ctx.state.upsert_chunk(&chunk).await {
        warn!(chunk_id = %chunk.chunk_id, error = %err, "failed to mark chunk in_progress, continuing anyway");
    }

    let connector = match ctx.connectors.get(&input.service) {
        Ok(c) => c,
        Err(err) => {
            return terminal(ctx, chunk, &input.service, ChunkStatus::Failed, Some(AvesaError::from(err).to_string()), None).await;
        }
    };

    match tokio::time::timeout(ctx.config.chunk_timeout, fetch_all_pages(ctx, connector, &input)).await {
        Ok(Ok((encoded, records_written, raw_last_updated_max, last_cursor))) => {
            finalize_success(ctx, chunk, &input, encoded, records_written, raw_last_updated_max, last_cursor).await
        }
        Ok(Err((err, last_cursor))) => {
            terminal(ctx, chunk, &input.service, ChunkStatus::Failed, Some(err.to_string()), last_cursor).await
        }
        Err(_elapsed) => {
            warn!(chunk_id = %chunk_id, budget = ?ctx.config.chunk_timeout, "chunk exceeded its wall-clock budget");
            chunk.status = ChunkStatus::TimedOut;
            chunk.error = Some(format!("chunk exceeded its {:?} budget", ctx.config.chunk_timeout));
            let _ = ctx.state.upsert_chunk(&chunk).await;
            avesa_observability::metrics::inc_chunk(&input.service, "timed_out");
            ChunkOutcome { progress: chunk, last_cursor: None }
        }
    }
}

async fn load_or_create(ctx: &Context, input: &ChunkInput, chunk_id: &str) -> ChunkProgress {
    let existing = ctx
        .state
        .list_chunks_for_table(&input.job_id, &input.tenant_id, &input.table_name)
        .await
        .unwrap_or_default();

    existing
        .into_iter()
        .find(|c| c.chunk_id == chunk_id)
        .unwrap_or_else(|| {
            ChunkProgress::new_pending(&input.job_id, &input.tenant_id, &input.table_name, input.window_start, input.window_end)
        })
}

/// Appends `batch` to `writer` on a blocking-pool thread (Parquet encoding
/// is CPU-bound) and hands the writer back so the next flush can reuse it.
async fn flush_batch(
    writer: raw_codec::StreamingRawWriter,
    batch: Vec<Value>,
) -> std::result::Result<raw_codec::StreamingRawWriter, String> {
    match tokio::task::spawn_blocking(move || {
        let mut writer = writer;
        writer.write_batch(&batch).map(|_| writer)
    })
    .await
    {
        Ok(Ok(writer)) => Ok(writer),
        Ok(Err(err)) => Err(format!("raw codec error: {err}")),
        Err(join_err) => Err(format!("encoder task panicked: {join_err}")),
    }
}

/// Paginate the whole window, flushing pages into a streaming Parquet
/// writer whenever the in-memory buffer reaches `page_size *
/// max_pages_in_memory` (`spec` §4.4) rather than holding every record of
/// the chunk at once. Returns the encoded blob bytes, the total record
/// count, the maximum `incremental_field` value observed, and the last
/// cursor seen (so a later timeout can resume from it). On failure,
/// returns the error alongside whatever cursor was last known.
#[allow(clippy::type_complexity)]
async fn fetch_all_pages(
    ctx: &Context,
    connector: Arc<dyn SourceConnector>,
    input: &ChunkInput,
) -> Result<(Vec<u8>, u64, Option<DateTime<Utc>>, Option<String>), (AvesaError, Option<String>)> {
    let retry_policy = RetryPolicy::chunk_default();
    let mut cursor = input.resume_cursor.clone();
    let flush_threshold = (input.page_size as usize).saturating_mul(ctx.config.max_pages_in_memory.max(1));
    let mut buffer: Vec<Value> = Vec::new();
    let mut records_written: u64 = 0;
    let mut raw_last_updated_max: Option<DateTime<Utc>> = None;
    let mut writer = match raw_codec::StreamingRawWriter::try_new() {
        Ok(writer) => writer,
        Err(err) => return Err((AvesaError::Fatal(format!("raw codec error: {err}")), cursor)),
    };

    loop {
        let request = FetchPageRequest {
            endpoint_path: input.endpoint_path.clone(),
            credentials: input.credentials.clone(),
            cursor: cursor.clone(),
            since_ts: input.window_start,
            until_ts: input.window_end,
            page_size: input.page_size,
            incremental_field: input.incremental_field.clone(),
            order_by: input.order_by.clone(),
        };

        let fetch = retry_policy.retry(classify_avesa_error, |_attempt| {
            let connector = connector.clone();
            let request = request.clone();
            async move { connector.fetch_page(request).await.map_err(AvesaError::from) }
        });

        let page = match cancellable(&ctx.cancel, fetch).await {
            Ok(Ok(page)) => page,
            Ok(Err(err)) => return Err((err, cursor)),
            Err(cancelled) => return Err((cancelled, cursor)),
        };

        let FetchPageOutcome { records, next_cursor, raw_last_updated_max: page_max } = page;
        buffer.extend(records);
        raw_last_updated_max = match (raw_last_updated_max, page_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        };

        if buffer.len() >= flush_threshold {
            let batch = std::mem::take(&mut buffer);
            records_written += batch.len() as u64;
            writer = match flush_batch(writer, batch).await {
                Ok(writer) => writer,
                Err(msg) => return Err((AvesaError::Fatal(msg), cursor)),
            };
        }

        if next_cursor.is_none() {
            if !buffer.is_empty() {
                records_written += buffer.len() as u64;
                writer = match flush_batch(writer, buffer).await {
                    Ok(writer) => writer,
                    Err(msg) => return Err((AvesaError::Fatal(msg), cursor)),
                };
            }
            let encoded = match tokio::task::spawn_blocking(move || writer.finish()).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(err)) => return Err((AvesaError::Fatal(format!("raw codec error: {err}")), cursor)),
                Err(join_err) => return Err((AvesaError::Fatal(format!("encoder task panicked: {join_err}")), cursor)),
            };
            return Ok((encoded, records_written, raw_last_updated_max, None));
        }
        cursor = next_cursor;
    }
}

async fn finalize_success(
    ctx: &Context,
    mut chunk: ChunkProgress,
    input: &ChunkInput,
    encoded: Vec<u8>,
    records_written: u64,
    raw_last_updated_max: Option<DateTime<Utc>>,
    last_cursor: Option<String>,
) -> ChunkOutcome {
    let blob_path = chunk.blob_path(&input.service);
    if let Err(err) = ctx.blob.put(&blob_path, encoded).await {
        return terminal(ctx, chunk, &input.service, ChunkStatus::Failed, Some(AvesaError::from(err).to_string()), last_cursor).await;
    }

    // `raw_last_updated_max` defaults to `window_start` on an empty page,
    // per the empty-page boundary case in `spec` §8.
    chunk.records_written = records_written;
    chunk.raw_last_updated_max = Some(raw_last_updated_max.unwrap_or(chunk.window_start));
    chunk.error = None;
    chunk.status = ChunkStatus::Succeeded;

    match ctx.state.upsert_chunk(&chunk).await {
        Ok(()) => {
            info!(chunk_id = %chunk.chunk_id, records_written, "chunk succeeded");
            avesa_observability::metrics::inc_chunk(&input.service, "succeeded");
            ChunkOutcome { progress: chunk, last_cursor: None }
        }
        Err(err) if matches!(err, avesa_state::StateError::AlreadyTerminal(_)) => {
            // A retry raced a previous success for the same deterministic
            // chunk_id; discard this write and report the existing terminal
            // row instead — idempotent retry, per `spec` §4.4 step 4.
            chunk.status = ChunkStatus::Succeeded;
            ChunkOutcome { progress: chunk, last_cursor: None }
        }
        Err(err) => terminal(ctx, chunk, &input.service, ChunkStatus::Failed, Some(err.to_string()), last_cursor).await,
    }
}

async fn terminal(
    ctx: &Context,
    mut chunk: ChunkProgress,
    service: &str,
    status: ChunkStatus,
    error: Option<String>,
    last_cursor: Option<String>,
) -> ChunkOutcome {
    chunk.status = status;
    chunk.error = error;
    let _ = ctx.state.upsert_chunk(&chunk).await;
    let label = match status {
        ChunkStatus::Succeeded => "succeeded",
        ChunkStatus::TimedOut => "timed_out",
        _ => "failed",
    };
    avesa_observability::metrics::inc_chunk(service, label);
    ChunkOutcome { progress: chunk, last_cursor }
}
