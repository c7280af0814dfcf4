//! Prometheus metrics derived from AVESA events
//!
//! This module provides Prometheus metrics for monitoring AVESA operations.
//! Metrics are derived from the audit event stream.

use prometheus::{Counter, CounterVec, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::OnceLock;

/// Global Prometheus registry for AVESA metrics
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Get or initialize the global registry
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let r = Registry::new();
        register_metrics(&r);
        r
    })
}

/// Chunk terminal-status counter (`spec` §4.4/§4.6).
///
/// Incremented once per chunk when it settles to `succeeded`, `failed`, or
/// `timed_out`. Labels: service, status.
pub static CHUNKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Audit integrity failure counter
///
/// Incremented when audit chain validation fails.
/// This is a CRITICAL metric that should trigger alerts.
pub static AUDIT_INTEGRITY_FAILURES: OnceLock<Counter> = OnceLock::new();

/// Canonical records written counter (`spec` §4.8).
///
/// Incremented by the number of projected records the Canonical Transformer
/// accepts into a canonical table. Labels: service, canonical_table.
pub static RECORDS_WRITTEN_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Reject ratio histogram (`spec` §4.8 `max_reject_ratio` guard).
///
/// Observes the percentage of records a canonical-transform apply rejected,
/// one observation per apply. Labels: canonical_table.
pub static REJECT_RATIO_PERCENT: OnceLock<HistogramVec> = OnceLock::new();

/// Watermark lag gauge (`spec` §4.5 step 6).
///
/// Tracks how far behind "now" the last-advanced watermark is for a given
/// tenant/table pair. Labels: tenant_id, table.
pub static WATERMARK_LAG_SECONDS: OnceLock<GaugeVec> = OnceLock::new();

/// Job duration histogram
///
/// Records job execution time by terminal status.
/// Labels: status (succeeded, partial, failed)
/// Buckets: 1s, 10s, 30s, 1m, 5m, 15m, 30m, 1h
pub static JOB_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    let chunks = CounterVec::new(
        Opts::new("avesa_chunks_total", "Total chunks processed, by service and terminal status"),
        &["service", "status"],
    )
    .expect("Failed to create chunks_total metric");
    registry.register(Box::new(chunks.clone())).expect("Failed to register chunks_total");
    CHUNKS_TOTAL.set(chunks).ok();

    // Audit integrity failures
    let integrity = Counter::with_opts(Opts::new(
        "avesa_audit_integrity_failures_total",
        "Number of audit chain integrity failures (CRITICAL)",
    ))
    .expect("Failed to create audit_integrity_failures metric");
    registry
        .register(Box::new(integrity.clone()))
        .expect("Failed to register audit_integrity_failures");
    AUDIT_INTEGRITY_FAILURES.set(integrity).ok();

    let records = CounterVec::new(
        Opts::new("avesa_records_written_total", "Total source records accepted into canonical tables"),
        &["service", "canonical_table"],
    )
    .expect("Failed to create records_written metric");
    registry.register(Box::new(records.clone())).expect("Failed to register records_written");
    RECORDS_WRITTEN_TOTAL.set(records).ok();

    let reject_ratio = HistogramVec::new(
        HistogramOpts::new("avesa_reject_ratio_percent", "Reject ratio observed per canonical-transform apply")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]),
        &["canonical_table"],
    )
    .expect("Failed to create reject_ratio metric");
    registry.register(Box::new(reject_ratio.clone())).expect("Failed to register reject_ratio");
    REJECT_RATIO_PERCENT.set(reject_ratio).ok();

    let watermark_lag = GaugeVec::new(
        Opts::new("avesa_watermark_lag_seconds", "Seconds between now and the last advanced watermark"),
        &["tenant_id", "table"],
    )
    .expect("Failed to create watermark_lag metric");
    registry.register(Box::new(watermark_lag.clone())).expect("Failed to register watermark_lag");
    WATERMARK_LAG_SECONDS.set(watermark_lag).ok();

    // Job duration
    let duration = HistogramVec::new(
        HistogramOpts::new("avesa_job_duration_seconds", "Job execution time")
            .buckets(vec![1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
        &["status"],
    )
    .expect("Failed to create job_duration metric");
    registry
        .register(Box::new(duration.clone()))
        .expect("Failed to register job_duration");
    JOB_DURATION_SECONDS.set(duration).ok();
}

/// Increment the chunk-outcome counter for one (service, status) pair.
pub fn inc_chunk(service: &str, status: &str) {
    registry();
    if let Some(counter) = CHUNKS_TOTAL.get() {
        counter.with_label_values(&[service, status]).inc();
    }
}

/// Increment audit integrity failure counter
pub fn inc_audit_integrity_failure() {
    registry();
    if let Some(counter) = AUDIT_INTEGRITY_FAILURES.get() {
        counter.inc();
    }
}

/// Increment the records-written counter by `count` for one canonical table.
pub fn inc_records_written(service: &str, canonical_table: &str, count: u64) {
    registry();
    if let Some(counter) = RECORDS_WRITTEN_TOTAL.get() {
        counter.with_label_values(&[service, canonical_table]).inc_by(count as f64);
    }
}

/// Record one canonical-transform apply's reject ratio, as a percentage.
pub fn observe_reject_ratio(canonical_table: &str, ratio_percent: f64) {
    registry();
    if let Some(histogram) = REJECT_RATIO_PERCENT.get() {
        histogram.with_label_values(&[canonical_table]).observe(ratio_percent);
    }
}

/// Set the current watermark lag, in seconds, for one (tenant, table) pair.
pub fn set_watermark_lag(tenant_id: &str, table: &str, lag_seconds: f64) {
    registry();
    if let Some(gauge) = WATERMARK_LAG_SECONDS.get() {
        gauge.with_label_values(&[tenant_id, table]).set(lag_seconds);
    }
}

/// Record job duration
pub fn record_job_duration(status: &str, duration_secs: f64) {
    registry();
    if let Some(histogram) = JOB_DURATION_SECONDS.get() {
        histogram.with_label_values(&[status]).observe(duration_secs);
    }
}

/// Get metrics in Prometheus text format
pub fn metrics_text() -> String {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_initialization() {
        let reg = registry();
        let metrics = reg.gather();
        assert!(!metrics.is_empty());
    }

    #[test]
    fn test_inc_chunk() {
        inc_chunk("connectwise", "succeeded");
        inc_chunk("connectwise", "failed");
        inc_chunk("halopsa", "timed_out");

        let metrics_output = metrics_text();
        assert!(metrics_output.contains("avesa_chunks_total"));
    }

    #[test]
    fn test_inc_audit_integrity_failure() {
        inc_audit_integrity_failure();

        let metrics_output = metrics_text();
        assert!(metrics_output.contains("avesa_audit_integrity_failures_total"));
    }

    #[test]
    fn test_inc_records_written() {
        inc_records_written("connectwise", "companies", 1024);
        inc_records_written("connectwise", "companies", 2048);

        let metrics_output = metrics_text();
        assert!(metrics_output.contains("avesa_records_written_total"));
    }

    #[test]
    fn test_observe_reject_ratio() {
        observe_reject_ratio("companies", 0.5);
        observe_reject_ratio("tickets", 12.0);

        let metrics_output = metrics_text();
        assert!(metrics_output.contains("avesa_reject_ratio_percent"));
    }

    #[test]
    fn test_set_watermark_lag() {
        set_watermark_lag("tenant-1", "companies", 42.0);

        let metrics_output = metrics_text();
        assert!(metrics_output.contains("avesa_watermark_lag_seconds"));
    }

    #[test]
    fn test_record_job_duration() {
        record_job_duration("succeeded", 45.5);
        record_job_duration("failed", 10.2);

        let metrics_output = metrics_text();
        assert!(metrics_output.contains("avesa_job_duration_seconds"));
    }

    #[test]
    fn test_metrics_text_format() {
        inc_chunk("connectwise", "succeeded");

        let output = metrics_text();
        assert!(output.starts_with("# HELP") || output.contains("avesa_"));
    }
}
