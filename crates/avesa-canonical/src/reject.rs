//! Flushing a job's accumulated dead-letter entries to its reject blob
//! (`spec` §6: `{tenant_id}/rejects/{canonical_table}/{job_id}.jsonl`, one
//! `{raw, reason}` JSON object per line).

use crate::error::Result;
use avesa_interface::blob::BlobStore;
use avesa_resilience::dead_letter::DeadLetterEntry;
use serde::Serialize;
use std::sync::Arc;

pub fn reject_blob_path(tenant_id: &str, canonical_table: &str, job_id: &str) -> String {
    format!("{tenant_id}/rejects/{canonical_table}/{job_id}.jsonl")
}

#[derive(Serialize)]
struct RejectLine<'a> {
    raw: &'a serde_json::Value,
    reason: String,
}

/// Write `entries` to the job's reject blob, one `{raw, reason}` object per
/// line. A no-op when there is nothing to flush, so a clean job leaves no
/// empty reject blob behind.
pub async fn flush_rejects(
    blob_store: &Arc<dyn BlobStore>,
    tenant_id: &str,
    canonical_table: &str,
    job_id: &str,
    entries: &[DeadLetterEntry],
) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let path = reject_blob_path(tenant_id, canonical_table, job_id);

    let mut payload = Vec::new();
    for entry in entries {
        let line = RejectLine {
            raw: &entry.raw_record,
            reason: entry.failure_reason.to_string(),
        };
        serde_json::to_writer(&mut payload, &line).expect("DeadLetterEntry serialization is infallible");
        payload.push(b'\n');
    }

    blob_store.put(&path, payload).await?;
    Ok(())
}
