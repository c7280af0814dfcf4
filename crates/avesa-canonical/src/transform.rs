//! Raw record projection and in-batch dedup (`spec` §4.8 steps 2-3): each
//! raw record becomes a `ProjectedRecord` carrying its canonical fields,
//! `data_hash`, and resolved `last_updated`; records sharing a natural key
//! within one batch are collapsed to the one with the greatest
//! `last_updated`.

use avesa_core::CanonicalRecord;
use avesa_mapping::MappingRegistry;
use avesa_resilience::dead_letter::{DeadLetterEntry, FailureReason};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ProjectedRecord {
    pub natural_key: String,
    pub fields: BTreeMap<String, Value>,
    pub last_updated: DateTime<Utc>,
    pub data_hash: String,
    pub source_system: String,
    pub source_id: String,
}

#[derive(Debug, Default)]
pub struct ProjectionOutcome {
    pub records: Vec<ProjectedRecord>,
    pub rejects: Vec<DeadLetterEntry>,
}

impl ProjectionOutcome {
    pub fn reject_ratio(&self) -> f64 {
        let total = self.records.len() + self.rejects.len();
        if total == 0 {
            0.0
        } else {
            self.rejects.len() as f64 / total as f64 * 100.0
        }
    }
}

/// Project every record in `raw_records` per the mapping registered for
/// `(canonical_table, service)`. A record whose required field resolves to
/// null is routed to `rejects` rather than failing the whole batch (`spec`
/// §4.8 step 2a).
#[allow(clippy::too_many_arguments)]
pub fn project_batch(
    mapping: &MappingRegistry,
    canonical_table: &str,
    service: &str,
    tenant_id: &str,
    job_id: &str,
    raw_records: &[Value],
    ingestion_ts: DateTime<Utc>,
    last_updated_field: Option<&str>,
) -> ProjectionOutcome {
    let natural_key_fields: Vec<String> = mapping
        .get(canonical_table)
        .map(|doc| doc.natural_key.clone())
        .unwrap_or_else(|| vec!["id".to_string()]);

    let mut outcome = ProjectionOutcome::default();

    for raw in raw_records {
        match mapping.project(canonical_table, service, raw) {
            Ok(fields) => {
                let natural_key = natural_key_fields
                    .iter()
                    .map(|field| fields.get(field).map(value_as_key_fragment).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join("|");

                let last_updated = last_updated_field
                    .and_then(|field| fields.get(field))
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(ingestion_ts);

                let data_hash = CanonicalRecord::compute_data_hash(&fields);
                let source_id = fields.get("id").map(value_as_key_fragment).unwrap_or_else(|| natural_key.clone());

                outcome.records.push(ProjectedRecord {
                    natural_key,
                    fields,
                    last_updated,
                    data_hash,
                    source_system: service.to_string(),
                    source_id,
                });
            }
            Err(err) => {
                outcome.rejects.push(DeadLetterEntry {
                    tenant_id: tenant_id.to_string(),
                    job_id: job_id.to_string(),
                    item_key: format!("{service}/{canonical_table}"),
                    failure_reason: FailureReason::RequiredFieldMissing { field: err.to_string() },
                    raw_record: raw.clone(),
                    failed_at: std::time::SystemTime::now(),
                });
            }
        }
    }

    outcome
}

fn value_as_key_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Dedup within one batch: keep only the record with the max `last_updated`
/// per natural key (`spec` §4.8 step 3).
pub fn dedup_by_natural_key(records: Vec<ProjectedRecord>) -> Vec<ProjectedRecord> {
    let mut by_key: BTreeMap<String, ProjectedRecord> = BTreeMap::new();
    for record in records {
        match by_key.get(&record.natural_key) {
            Some(existing) if existing.last_updated >= record.last_updated => {}
            _ => {
                by_key.insert(record.natural_key.clone(), record);
            }
        }
    }
    by_key.into_values().collect()
}
