//! The Canonical Transformer & SCD-2 Applier (`spec` §4.8), tying together
//! raw blob decode, projection, in-batch dedup and per-key locked merge
//! into the single entry point the Tenant Processor dispatches a raw blob
//! to. Reject collection happens here per blob; flushing the collected
//! rejects to the job's single reject blob is the caller's job, once per
//! canonical pass (see `crate::reject`).

use crate::error::Result;
use crate::lock::KeyLockTable;
use crate::scd::{self, MergeOutcome};
use crate::transform::{self, ProjectionOutcome};
use avesa_interface::blob::BlobStore;
use avesa_interface::column::ColumnStore;
use avesa_interface::raw_codec;
use avesa_mapping::MappingRegistry;
use avesa_resilience::dead_letter::DeadLetterEntry;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything `apply_chunk` needs, bundled so the Tenant Processor only
/// has to pass one handle per spawned task.
pub struct CanonicalApplier {
    pub mapping: Arc<MappingRegistry>,
    pub blob_store: Arc<dyn BlobStore>,
    pub column_store: Arc<dyn ColumnStore>,
    pub locks: Arc<KeyLockTable>,
    pub max_reject_ratio: f64,
}

#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub inserted: u64,
    pub replaced: u64,
    pub filed_historical: u64,
    pub no_op: u64,
    pub rejected: u64,
    /// Rejected records from this blob, not yet flushed to a blob.
    /// `spec` §4.8: the reject blob is written once per canonical pass,
    /// so callers accumulate this across every blob in the run and flush
    /// it once via [`crate::reject::flush_rejects`] rather than per chunk.
    pub rejects: Vec<DeadLetterEntry>,
}

impl CanonicalApplier {
    /// Decode the raw blob at `raw_blob_path` and project and merge every
    /// record into `canonical_table`. Rejected records are returned on
    /// `ApplyOutcome::rejects` for the caller to accumulate across the
    /// whole canonical pass and flush once (`spec` §4.8) — this method
    /// never itself writes the reject blob. Returns
    /// `CanonicalError::RejectRatioExceeded` if this blob's own reject
    /// ratio exceeds `max_reject_ratio` — the caller surfaces this as a
    /// chunk failure (`spec` §4.8 step 2b).
    pub async fn apply_chunk(
        &self,
        canonical_table: &str,
        service: &str,
        tenant_id: &str,
        job_id: &str,
        raw_blob_path: &str,
        last_updated_field: Option<&str>,
    ) -> Result<ApplyOutcome> {
        let mut reader = self.blob_store.get(raw_blob_path).await?;
        let mut raw_bytes = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut raw_bytes).await.map_err(|e| {
            crate::error::CanonicalError::Blob(avesa_interface::BlobStoreError::Io(e))
        })?;
        let raw_records = raw_codec::decode_records(raw_bytes)?;

        let ProjectionOutcome { records, rejects } = transform::project_batch(
            &self.mapping,
            canonical_table,
            service,
            tenant_id,
            job_id,
            &raw_records,
            Utc::now(),
            last_updated_field,
        );

        let reject_count = rejects.len() as u64;
        let total = records.len() as u64 + reject_count;
        let reject_ratio = if total == 0 { 0.0 } else { reject_count as f64 / total as f64 * 100.0 };
        avesa_observability::metrics::observe_reject_ratio(canonical_table, reject_ratio);

        if !rejects.is_empty() {
            warn!(tenant_id, job_id, canonical_table, rejected = reject_count, "rejects in batch");
        }

        if reject_ratio > self.max_reject_ratio {
            return Err(crate::error::CanonicalError::RejectRatioExceeded {
                actual: reject_ratio,
                max: self.max_reject_ratio,
            });
        }

        let deduped = transform::dedup_by_natural_key(records);

        let mut outcome = ApplyOutcome {
            rejected: reject_count,
            rejects,
            ..Default::default()
        };

        for record in &deduped {
            let _guard = self.locks.lock(tenant_id, &record.natural_key).await;
            let merge_outcome = scd::merge_one(&self.column_store, canonical_table, tenant_id, record).await?;
            match merge_outcome {
                MergeOutcome::Inserted => outcome.inserted += 1,
                MergeOutcome::Replaced => outcome.replaced += 1,
                MergeOutcome::FiledHistorical => outcome.filed_historical += 1,
                MergeOutcome::NoOp => outcome.no_op += 1,
            }
        }

        avesa_observability::metrics::inc_records_written(service, canonical_table, deduped.len() as u64);

        debug!(
            tenant_id,
            job_id,
            canonical_table,
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            filed_historical = outcome.filed_historical,
            no_op = outcome.no_op,
            "chunk applied"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avesa_interface::fs_blob::FsBlobStore;
    use avesa_interface::mem_column::MemColumnStore;
    use avesa_mapping::{FieldMapping, MappingDocument, ScdType, SourceMapping, Transform};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn registry() -> Arc<MappingRegistry> {
        let mut source_mappings = BTreeMap::new();
        source_mappings.insert(
            "connectwise".to_string(),
            SourceMapping {
                endpoint_path: "/company/companies".to_string(),
                fields: vec![
                    FieldMapping {
                        canonical_field: "id".to_string(),
                        source_path: "id".to_string(),
                        required: true,
                        transform: Some(Transform::Identity),
                    },
                    FieldMapping {
                        canonical_field: "company_name".to_string(),
                        source_path: "name".to_string(),
                        required: true,
                        transform: Some(Transform::Identity),
                    },
                ],
            },
        );
        Arc::new(
            MappingRegistry::load(vec![MappingDocument {
                canonical_table: "companies".to_string(),
                source_mappings,
                scd_type: ScdType::Type2,
                natural_key: vec!["id".to_string()],
            }])
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn applies_clean_batch_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()));
        let column_store: Arc<dyn ColumnStore> = Arc::new(MemColumnStore::new());

        let raw = vec![json!({"id": "1", "name": "Acme"}), json!({"id": "2", "name": "Globex"})];
        let encoded = raw_codec::encode_records(&raw).unwrap();
        blob_store.put("t1/raw/connectwise/companies/job-1/c1.parquet", encoded).await.unwrap();

        let applier = CanonicalApplier {
            mapping: registry(),
            blob_store,
            column_store: column_store.clone(),
            locks: Arc::new(KeyLockTable::new()),
            max_reject_ratio: 5.0,
        };

        let outcome = applier
            .apply_chunk(
                "companies",
                "connectwise",
                "t1",
                "job-1",
                "t1/raw/connectwise/companies/job-1/c1.parquet",
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.rejected, 0);
        assert!(column_store.get_current("companies", "t1", "1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reject_ratio_above_threshold_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()));
        let column_store: Arc<dyn ColumnStore> = Arc::new(MemColumnStore::new());

        let raw = vec![json!({"id": "1"}), json!({"id": "2"})];
        let encoded = raw_codec::encode_records(&raw).unwrap();
        blob_store.put("t1/raw/connectwise/companies/job-1/c1.parquet", encoded).await.unwrap();

        let applier = CanonicalApplier {
            mapping: registry(),
            blob_store,
            column_store,
            locks: Arc::new(KeyLockTable::new()),
            max_reject_ratio: 5.0,
        };

        let result = applier
            .apply_chunk(
                "companies",
                "connectwise",
                "t1",
                "job-1",
                "t1/raw/connectwise/companies/job-1/c1.parquet",
                None,
            )
            .await;

        assert!(matches!(
            result,
            Err(crate::error::CanonicalError::RejectRatioExceeded { .. })
        ));
    }
}
