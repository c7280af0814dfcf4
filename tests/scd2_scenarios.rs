//! Replays `spec` §8's concrete scenarios A-F end to end: a fixed script of
//! connector responses driven through the real `CanonicalApplier`/
//! `process_table` entry points against in-memory state, asserting on the
//! resulting canonical rows and watermarks rather than on any internal
//! intermediate value.

use avesa_canonical::{CanonicalApplier, KeyLockTable};
use avesa_connect::{ConnectError, ConnectorRegistry, FetchPageOutcome, FetchPageRequest, SourceConnector};
use avesa_core::CancellationToken;
use avesa_engine::config::EngineConfig;
use avesa_engine::context::Context;
use avesa_engine::table::{self, TableInput};
use avesa_interface::blob::BlobStore;
use avesa_interface::column::ColumnStore;
use avesa_interface::fs_blob::FsBlobStore;
use avesa_interface::mem_column::MemColumnStore;
use avesa_interface::raw_codec;
use avesa_interface::static_secret::StaticSecretStore;
use avesa_mapping::{FieldMapping, MappingDocument, MappingRegistry, ScdType, SourceMapping, Transform};
use avesa_state::{MockStateStore, StateStore};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const TENANT: &str = "t1";
const SERVICE: &str = "connectwise";
const ENDPOINT: &str = "/company/companies";
const TABLE: &str = "company/companies";
const CANONICAL: &str = "companies";

fn companies_mapping() -> MappingRegistry {
    let mut source_mappings = BTreeMap::new();
    source_mappings.insert(
        SERVICE.to_string(),
        SourceMapping {
            endpoint_path: ENDPOINT.to_string(),
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
                FieldMapping {
                    canonical_field: avesa_canonical::LAST_UPDATED_CANONICAL_FIELD.to_string(),
                    source_path: "_info.lastUpdated".to_string(),
                    required: true,
                    transform: Some(Transform::Identity),
                },
            ],
        },
    );
    MappingRegistry::load(vec![MappingDocument {
        canonical_table: CANONICAL.to_string(),
        source_mappings,
        scd_type: ScdType::Type2,
        natural_key: vec!["id".to_string()],
    }])
    .unwrap()
}

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// A minimal harness for the idempotence-law test: a real blob store
/// (tempdir-backed) and a real in-memory column store, driven directly
/// through `CanonicalApplier::apply_chunk` the way the Tenant Processor
/// does, without any Table/Chunk Processor plumbing. Keeps the concrete
/// `MemColumnStore` handle alongside the trait object so tests can inspect
/// historical rows, which `ColumnStore` itself doesn't expose.
struct ApplierHarness {
    _tmp: tempfile::TempDir,
    applier: CanonicalApplier,
    blob_store: Arc<dyn BlobStore>,
    mem: Arc<MemColumnStore>,
    job_seq: AtomicU32,
}

impl ApplierHarness {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()));
        let mem = Arc::new(MemColumnStore::new());
        let column_store: Arc<dyn ColumnStore> = mem.clone();
        let applier = CanonicalApplier {
            mapping: Arc::new(companies_mapping()),
            blob_store: blob_store.clone(),
            column_store,
            locks: Arc::new(KeyLockTable::new()),
            max_reject_ratio: 5.0,
        };
        Self {
            _tmp: tmp,
            applier,
            blob_store,
            mem,
            job_seq: AtomicU32::new(0),
        }
    }

    /// Encodes `record` as a raw blob and applies it as its own chunk,
    /// mirroring one `apply_chunk` call per raw blob (`spec` §4.8).
    async fn ingest(&self, record: serde_json::Value) -> avesa_canonical::ApplyOutcome {
        let job_id = format!("job-{}", self.job_seq.fetch_add(1, Ordering::SeqCst));
        let encoded = raw_codec::encode_records(&[record]).unwrap();
        let blob_path = format!("{TENANT}/raw/{SERVICE}/{CANONICAL}/{job_id}/c1.parquet");
        self.blob_store.put(&blob_path, encoded).await.unwrap();
        self.applier
            .apply_chunk(CANONICAL, SERVICE, TENANT, &job_id, &blob_path, Some(avesa_canonical::LAST_UPDATED_CANONICAL_FIELD))
            .await
            .unwrap()
    }

    async fn current(&self, id: &str) -> avesa_core::CanonicalRecord {
        self.mem.get_current(CANONICAL, TENANT, id).await.unwrap().unwrap()
    }

    fn historical(&self) -> Vec<avesa_core::CanonicalRecord> {
        self.mem.historical_rows(CANONICAL)
    }
}

fn companies_record(id: &str, name: &str, last_updated: &str) -> serde_json::Value {
    json!({"id": id, "name": name, "_info": {"lastUpdated": last_updated}})
}

#[tokio::test]
async fn scenario_a_first_ingest_single_record() {
    let tmp = tempfile::tempdir().unwrap();
    let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()));
    let mem = Arc::new(MemColumnStore::new());
    let column_store: Arc<dyn ColumnStore> = mem.clone();
    let applier = CanonicalApplier {
        mapping: Arc::new(companies_mapping()),
        blob_store: blob_store.clone(),
        column_store: column_store.clone(),
        locks: Arc::new(KeyLockTable::new()),
        max_reject_ratio: 5.0,
    };

    let record = companies_record("42", "Acme", "2024-01-01T00:00:00Z");
    let encoded = raw_codec::encode_records(&[record]).unwrap();
    let blob_path = format!("{TENANT}/raw/{SERVICE}/{CANONICAL}/job-a/c1.parquet");
    blob_store.put(&blob_path, encoded).await.unwrap();

    let outcome = applier
        .apply_chunk(CANONICAL, SERVICE, TENANT, "job-a", &blob_path, Some(avesa_canonical::LAST_UPDATED_CANONICAL_FIELD))
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.rejected, 0);

    let current = column_store.get_current(CANONICAL, TENANT, "42").await.unwrap().unwrap();
    assert!(current.is_current);
    assert_eq!(current.record_version, 1);
    assert_eq!(current.fields.get("company_name"), Some(&json!("Acme")));
    assert_eq!(current.effective_date, ts("2024-01-01T00:00:00Z"));
    assert!(mem.historical_rows(CANONICAL).is_empty());
}

#[tokio::test]
async fn scenario_b_unchanged_reingest_is_a_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()));
    let mem = Arc::new(MemColumnStore::new());
    let column_store: Arc<dyn ColumnStore> = mem.clone();
    let applier = CanonicalApplier {
        mapping: Arc::new(companies_mapping()),
        blob_store: blob_store.clone(),
        column_store: column_store.clone(),
        locks: Arc::new(KeyLockTable::new()),
        max_reject_ratio: 5.0,
    };

    for (i, job) in ["job-b1", "job-b2"].into_iter().enumerate() {
        let record = companies_record("42", "Acme", "2024-01-01T00:00:00Z");
        let encoded = raw_codec::encode_records(&[record]).unwrap();
        let blob_path = format!("{TENANT}/raw/{SERVICE}/{CANONICAL}/{job}/c1.parquet");
        blob_store.put(&blob_path, encoded).await.unwrap();
        let outcome = applier
            .apply_chunk(CANONICAL, SERVICE, TENANT, job, &blob_path, Some(avesa_canonical::LAST_UPDATED_CANONICAL_FIELD))
            .await
            .unwrap();
        if i == 0 {
            assert_eq!(outcome.inserted, 1);
        } else {
            assert_eq!(outcome.no_op, 1);
        }
    }

    let current = column_store.get_current(CANONICAL, TENANT, "42").await.unwrap().unwrap();
    assert_eq!(current.record_version, 1);
    assert!(mem.historical_rows(CANONICAL).is_empty());
}

#[tokio::test]
async fn scenario_c_updated_record_replaces_current() {
    let tmp = tempfile::tempdir().unwrap();
    let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()));
    let mem = Arc::new(MemColumnStore::new());
    let column_store: Arc<dyn ColumnStore> = mem.clone();
    let applier = CanonicalApplier {
        mapping: Arc::new(companies_mapping()),
        blob_store: blob_store.clone(),
        column_store: column_store.clone(),
        locks: Arc::new(KeyLockTable::new()),
        max_reject_ratio: 5.0,
    };

    async fn ingest(applier: &CanonicalApplier, blob_store: &Arc<dyn BlobStore>, job: &str, record: serde_json::Value) {
        let encoded = raw_codec::encode_records(&[record]).unwrap();
        let blob_path = format!("{TENANT}/raw/{SERVICE}/{CANONICAL}/{job}/c1.parquet");
        blob_store.put(&blob_path, encoded).await.unwrap();
        applier
            .apply_chunk(CANONICAL, SERVICE, TENANT, job, &blob_path, Some(avesa_canonical::LAST_UPDATED_CANONICAL_FIELD))
            .await
            .unwrap();
    }

    ingest(&applier, &blob_store, "job-c1", companies_record("42", "Acme", "2024-01-01T00:00:00Z")).await;
    ingest(&applier, &blob_store, "job-c2", companies_record("42", "Acme Inc", "2024-01-02T00:00:00Z")).await;

    let current = column_store.get_current(CANONICAL, TENANT, "42").await.unwrap().unwrap();
    assert!(current.is_current);
    assert_eq!(current.record_version, 2);
    assert_eq!(current.fields.get("company_name"), Some(&json!("Acme Inc")));
    assert_eq!(current.effective_date, ts("2024-01-02T00:00:00Z"));

    let historical = mem.historical_rows(CANONICAL);
    assert_eq!(historical.len(), 1);
    assert!(!historical[0].is_current);
    assert_eq!(historical[0].fields.get("company_name"), Some(&json!("Acme")));
    assert_eq!(historical[0].expiration_date, Some(ts("2024-01-02T00:00:00Z")));
}

#[tokio::test]
async fn scenario_d_late_arrival_files_historical_without_touching_current() {
    let tmp = tempfile::tempdir().unwrap();
    let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()));
    let mem = Arc::new(MemColumnStore::new());
    let column_store: Arc<dyn ColumnStore> = mem.clone();
    let applier = CanonicalApplier {
        mapping: Arc::new(companies_mapping()),
        blob_store: blob_store.clone(),
        column_store: column_store.clone(),
        locks: Arc::new(KeyLockTable::new()),
        max_reject_ratio: 5.0,
    };

    async fn ingest(applier: &CanonicalApplier, blob_store: &Arc<dyn BlobStore>, job: &str, record: serde_json::Value) {
        let encoded = raw_codec::encode_records(&[record]).unwrap();
        let blob_path = format!("{TENANT}/raw/{SERVICE}/{CANONICAL}/{job}/c1.parquet");
        blob_store.put(&blob_path, encoded).await.unwrap();
        applier
            .apply_chunk(CANONICAL, SERVICE, TENANT, job, &blob_path, Some(avesa_canonical::LAST_UPDATED_CANONICAL_FIELD))
            .await
            .unwrap();
    }

    // Scenario C's end state.
    ingest(&applier, &blob_store, "job-d1", companies_record("42", "Acme", "2024-01-01T00:00:00Z")).await;
    ingest(&applier, &blob_store, "job-d2", companies_record("42", "Acme Inc", "2024-01-02T00:00:00Z")).await;
    // Backfill delivers an older record.
    ingest(&applier, &blob_store, "job-d3", companies_record("42", "Old Acme", "2023-12-15T00:00:00Z")).await;

    let current = column_store.get_current(CANONICAL, TENANT, "42").await.unwrap().unwrap();
    assert_eq!(current.fields.get("company_name"), Some(&json!("Acme Inc")));
    assert_eq!(current.record_version, 2);

    let historical = mem.historical_rows(CANONICAL);
    assert_eq!(historical.len(), 2);

    let old_acme = historical
        .iter()
        .find(|r| r.fields.get("company_name") == Some(&json!("Old Acme")))
        .unwrap();
    assert_eq!(old_acme.effective_date, ts("2023-12-15T00:00:00Z"));
    assert_eq!(old_acme.expiration_date, Some(ts("2024-01-01T00:00:00Z")));

    let acme_2024_01_01 = historical
        .iter()
        .find(|r| r.fields.get("company_name") == Some(&json!("Acme")))
        .unwrap();
    assert_eq!(acme_2024_01_01.effective_date, ts("2024-01-01T00:00:00Z"));
    assert_eq!(acme_2024_01_01.expiration_date, Some(ts("2024-01-02T00:00:00Z")));
}

/// A connector keyed by the requested window's `since_ts`: windows whose
/// start is `>= fail_from` fail permanently with a non-retryable error, so
/// the test runs fast and deterministically (no `Transient`/`RateLimited`
/// backoff loop).
struct WindowKeyedConnector {
    service: String,
    fail_from: DateTime<Utc>,
}

#[async_trait::async_trait]
impl SourceConnector for WindowKeyedConnector {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn fetch_page(&self, request: FetchPageRequest) -> avesa_connect::Result<FetchPageOutcome> {
        if request.since_ts >= self.fail_from {
            return Err(ConnectError::AuthFailure("simulated permanent failure".to_string()));
        }
        Ok(FetchPageOutcome {
            records: vec![json!({"id": "1", "name": "Acme", "_info": {"lastUpdated": request.since_ts.to_rfc3339()}})],
            next_cursor: None,
            raw_last_updated_max: Some(request.since_ts),
        })
    }
}

fn engine_test_context(tmp: &std::path::Path, config: EngineConfig, connector: impl SourceConnector) -> (Context, Arc<MockStateStore>) {
    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(connector));

    let blob: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp));
    let column_store: Arc<dyn ColumnStore> = Arc::new(MemColumnStore::new());
    let mapping = Arc::new(companies_mapping());
    let state = Arc::new(MockStateStore::new());

    let ctx = Context {
        state: state.clone(),
        blob: blob.clone(),
        secrets: Arc::new(StaticSecretStore::new(HashMap::new())),
        connectors: Arc::new(registry),
        canonical: Arc::new(CanonicalApplier {
            mapping,
            blob_store: blob,
            column_store,
            locks: Arc::new(KeyLockTable::new()),
            max_reject_ratio: 5.0,
        }),
        config: Arc::new(config),
        cancel: CancellationToken::new(),
        audit: Arc::new(avesa_observability::UnifiedLogger::disabled()),
    };
    (ctx, state)
}

fn table_input(job_id: &str) -> TableInput {
    TableInput {
        job_id: job_id.to_string(),
        tenant_id: TENANT.to_string(),
        service: SERVICE.to_string(),
        table_name: TABLE.to_string(),
        canonical_table: CANONICAL.to_string(),
        endpoint_path: ENDPOINT.to_string(),
        credentials: "token".to_string(),
        page_size: 100,
        incremental_field: "_info.lastUpdated".to_string(),
        order_by: "id".to_string(),
        force_full_sync: false,
    }
}

#[tokio::test]
async fn scenario_e_partial_chunk_failure_advances_only_the_succeeded_prefix() {
    let tmp = tempfile::tempdir().unwrap();
    let now = Utc::now();
    let chunk_duration = std::time::Duration::from_secs(3600);
    // Four 1h windows: [ws, ws+1h) succeeds, everything from ws+1h onward
    // fails — a succeeded-then-failed-prefix shape equivalent to spec's
    // three-chunk A/B/C layout, without depending on exact window count.
    let watermark_start = now - chrono::Duration::hours(4);
    let fail_from = watermark_start + chrono::Duration::hours(1);

    let mut config = EngineConfig::default();
    config.chunk_duration = chunk_duration;
    config.chunks_concurrency = 1;

    let connector = WindowKeyedConnector { service: SERVICE.to_string(), fail_from };
    let (ctx, state) = engine_test_context(tmp.path(), config, connector);
    state
        .set_watermark(TENANT, TABLE, watermark_start, "job-seed")
        .await
        .unwrap();

    let input = table_input("job-e");
    let outcome = table::process_table(&ctx, input).await;

    assert_eq!(outcome.status, avesa_core::JobStatus::Partial);
    assert_eq!(outcome.records_written, 1);

    let watermark = ctx.state.get_watermark(TENANT, TABLE).await.unwrap();
    assert_eq!(watermark.last_updated_ts, fail_from);
}

/// A connector that times out on its first call (sleeping past the
/// configured `chunk_timeout`) and resolves immediately on the resumed
/// second call, for Scenario F.
struct TimeoutThenSucceedConnector {
    service: String,
    calls: AtomicU32,
    stall: std::time::Duration,
}

#[async_trait::async_trait]
impl SourceConnector for TimeoutThenSucceedConnector {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn fetch_page(&self, request: FetchPageRequest) -> avesa_connect::Result<FetchPageOutcome> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
        if attempt == 0 {
            tokio::time::sleep(self.stall).await;
        }
        Ok(FetchPageOutcome {
            records: vec![json!({"id": "1", "name": "Acme", "_info": {"lastUpdated": request.since_ts.to_rfc3339()}})],
            next_cursor: None,
            raw_last_updated_max: Some(request.since_ts),
        })
    }
}

#[tokio::test]
async fn scenario_f_chunk_times_out_once_then_succeeds_on_resume() {
    let tmp = tempfile::tempdir().unwrap();
    let now = Utc::now();
    let watermark_start = now - chrono::Duration::seconds(5);

    let mut config = EngineConfig::default();
    config.chunk_duration = std::time::Duration::from_secs(3600);
    config.chunk_timeout = std::time::Duration::from_millis(50);
    config.clock_skew_guard = std::time::Duration::from_secs(1);
    config.chunks_concurrency = 1;

    let connector = TimeoutThenSucceedConnector {
        service: SERVICE.to_string(),
        calls: AtomicU32::new(0),
        stall: std::time::Duration::from_millis(300),
    };
    let (ctx, state) = engine_test_context(tmp.path(), config, connector);
    state
        .set_watermark(TENANT, TABLE, watermark_start, "job-seed")
        .await
        .unwrap();

    let input = table_input("job-e");
    let outcome = table::process_table(&ctx, input).await;

    assert_eq!(outcome.status, avesa_core::JobStatus::Succeeded);
    assert_eq!(outcome.records_written, 1);

    let chunks = ctx.state.list_chunks_for_table("job-e", TENANT, TABLE).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].status, avesa_core::ChunkStatus::Succeeded);
    assert_eq!(chunks[0].attempt_count, 2);
    assert!(ctx.blob.exists(&chunks[0].blob_path(SERVICE)).await.unwrap());
}

#[tokio::test]
async fn reingest_of_unchanged_record_writes_no_new_canonical_rows() {
    // Round-trip/idempotence law from `spec` §8: re-ingesting identical raw
    // data through the canonical transform is a no-op.
    let harness = ApplierHarness::new();

    let first = harness.ingest(companies_record("7", "Initech", "2024-02-01T00:00:00Z")).await;
    assert_eq!(first.inserted, 1);
    let second = harness.ingest(companies_record("7", "Initech", "2024-02-01T00:00:00Z")).await;
    assert_eq!(second.no_op, 1);

    let current = harness.current("7").await;
    assert_eq!(current.record_version, 1);
    assert!(harness.historical().is_empty());
}
