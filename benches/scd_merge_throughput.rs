use avesa_canonical::scd::{self};
use avesa_core::CanonicalRecord;
use avesa_canonical::transform::ProjectedRecord;
use avesa_interface::column::ColumnStore;
use avesa_interface::mem_column::MemColumnStore;
use chrono::{DateTime, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::BTreeMap;
use std::sync::Arc;

fn projected(natural_key: &str, last_updated_secs: i64, value: &str) -> ProjectedRecord {
    let mut fields = BTreeMap::new();
    fields.insert("company_name".to_string(), serde_json::json!(value));
    ProjectedRecord {
        natural_key: natural_key.to_string(),
        data_hash: CanonicalRecord::compute_data_hash(&fields),
        fields,
        last_updated: DateTime::<Utc>::from_timestamp(last_updated_secs, 0).unwrap(),
        source_system: "connectwise".to_string(),
        source_id: natural_key.to_string(),
    }
}

/// Merges `n` distinct keys' first-ever record — the all-insert path.
fn bench_insert_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("scd_merge_throughput");
    let n = 5_000u64;
    group.throughput(Throughput::Elements(n));

    group.bench_function("insert_distinct_keys", |b| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        b.iter(|| {
            rt.block_on(async {
                let store: Arc<dyn ColumnStore> = Arc::new(MemColumnStore::new());
                for i in 0..n {
                    let key = i.to_string();
                    let record = projected(&key, 1_700_000_000, "Acme");
                    black_box(scd::merge_one(&store, "companies", "t1", &record).await.unwrap());
                }
            });
        });
    });

    group.finish();
}

/// Repeatedly replaces the same key's current row, exercising the
/// close-and-replace path `n` times in a row.
fn bench_replace_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("scd_merge_throughput");
    let n = 5_000u64;
    group.throughput(Throughput::Elements(n));

    group.bench_function("replace_single_key_repeatedly", |b| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        b.iter(|| {
            rt.block_on(async {
                let store: Arc<dyn ColumnStore> = Arc::new(MemColumnStore::new());
                for i in 0..n {
                    let record = projected("42", 1_700_000_000 + i as i64, "Acme Inc");
                    black_box(scd::merge_one(&store, "companies", "t1", &record).await.unwrap());
                }
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert_throughput, bench_replace_throughput);
criterion_main!(benches);
