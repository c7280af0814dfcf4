//! The SCD-2 merge algorithm (`spec` §4.8): given one projected record and
//! whatever currently counts as "current" for its natural key, decide
//! whether to insert, no-op, close-and-replace, or file as historical —
//! then apply that decision through `ColumnStore`.

use crate::error::{CanonicalError, Result};
use crate::transform::ProjectedRecord;
use avesa_core::CanonicalRecord;
use avesa_interface::column::{ColumnStore, ColumnStoreError};
use avesa_resilience::retry::{RetryClass, RetryPolicy};
use std::sync::Arc;

/// Sentinel `record_version` for a row filed as historical without ever
/// having been current (`spec` §9 open question: the late-arriving branch
/// does not bump `record_version`, and zero marks "never current").
const HISTORICAL_RECORD_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No current row existed for this key; it was inserted as-is.
    Inserted,
    /// A current row existed with an identical `data_hash`; nothing changed.
    NoOp,
    /// The new record is strictly fresher (or ties on `last_updated` with a
    /// greater `data_hash`); the old current row was closed and the new one
    /// became current.
    Replaced,
    /// The new record is older than (or loses the tie against) the current
    /// row; it was filed as a non-current historical row.
    FiledHistorical,
}

/// Merge one projected record into `canonical_table` for `tenant_id`. The
/// caller must hold the per-`(tenant_id, natural_key)` lock for the whole
/// call (`spec` §4.8's single-writer-per-key discipline) — this function
/// does not acquire it itself.
pub async fn merge_one(
    store: &Arc<dyn ColumnStore>,
    canonical_table: &str,
    tenant_id: &str,
    record: &ProjectedRecord,
) -> Result<MergeOutcome> {
    let retry_policy = RetryPolicy::new(
        3,
        std::time::Duration::from_millis(20),
        std::time::Duration::from_millis(200),
        0.2,
    );

    retry_policy
        .retry(
            |err: &CanonicalError| match err {
                CanonicalError::Column(ColumnStoreError::InvariantViolated { .. }) => RetryClass::Retry,
                _ => RetryClass::Fatal,
            },
            |_attempt| async {
                attempt_merge(store, canonical_table, tenant_id, record).await
            },
        )
        .await
}

async fn attempt_merge(
    store: &Arc<dyn ColumnStore>,
    canonical_table: &str,
    tenant_id: &str,
    record: &ProjectedRecord,
) -> Result<MergeOutcome> {
    let existing = store
        .get_current(canonical_table, tenant_id, &record.natural_key)
        .await?;

    match existing {
        None => {
            let fresh = CanonicalRecord {
                tenant_id: tenant_id.to_string(),
                id: record.natural_key.clone(),
                fields: record.fields.clone(),
                source_system: record.source_system.clone(),
                source_id: record.source_id.clone(),
                last_updated: record.last_updated,
                data_hash: record.data_hash.clone(),
                effective_date: record.last_updated,
                expiration_date: None,
                is_current: true,
                record_version: 1,
            };
            store.insert_current(canonical_table, fresh).await?;
            Ok(MergeOutcome::Inserted)
        }
        Some(current) if current.data_hash == record.data_hash => Ok(MergeOutcome::NoOp),
        Some(current) => {
            let is_late_arriving = current.last_updated > record.last_updated
                || (current.last_updated == record.last_updated && current.data_hash >= record.data_hash);

            if is_late_arriving {
                // The closing bound is the *immediate successor* row's
                // effective_date, not necessarily the current row's: other
                // historical rows may already sit between this late
                // arrival and the current row (`spec` §8 invariant 4).
                let successor = store
                    .find_successor(canonical_table, tenant_id, &record.natural_key, record.last_updated)
                    .await?;
                let expiration_date = successor.map(|s| s.effective_date).unwrap_or(current.effective_date);

                let historical = CanonicalRecord {
                    tenant_id: tenant_id.to_string(),
                    id: record.natural_key.clone(),
                    fields: record.fields.clone(),
                    source_system: record.source_system.clone(),
                    source_id: record.source_id.clone(),
                    last_updated: record.last_updated,
                    data_hash: record.data_hash.clone(),
                    effective_date: record.last_updated,
                    expiration_date: Some(expiration_date),
                    is_current: false,
                    record_version: HISTORICAL_RECORD_VERSION,
                };
                store.insert_historical(canonical_table, historical).await?;
                Ok(MergeOutcome::FiledHistorical)
            } else {
                let replacement = CanonicalRecord {
                    tenant_id: tenant_id.to_string(),
                    id: record.natural_key.clone(),
                    fields: record.fields.clone(),
                    source_system: record.source_system.clone(),
                    source_id: record.source_id.clone(),
                    last_updated: record.last_updated,
                    data_hash: record.data_hash.clone(),
                    effective_date: record.last_updated,
                    expiration_date: None,
                    is_current: true,
                    record_version: current.record_version + 1,
                };
                store
                    .replace_current(canonical_table, current, replacement)
                    .await?;
                Ok(MergeOutcome::Replaced)
            }
        }
    }
}
