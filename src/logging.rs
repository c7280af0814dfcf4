/*!
 * Logging and tracing initialization
 */

use avesa_observability::{AuditBridgeLayer, UnifiedLogger};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::AppConfig;
use crate::error::{AppError, Result};

/// Initialize structured logging based on configuration, layering the audit
/// bridge (`avesa_observability`) on top so every `tracing` span/event also
/// reaches the HMAC-chained audit log when `audit` is enabled.
pub fn init_logging(config: &AppConfig, audit: Arc<UnifiedLogger>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("avesa={}", config.log_level)))
        .map_err(|e| AppError::Config(format!("failed to create log filter: {}", e)))?;

    let audit_layer = AuditBridgeLayer::new((*audit).clone());

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter, audit_layer)?;
    } else {
        init_stdout_logging(env_filter, audit_layer);
    }

    Ok(())
}

/// Initialize logging to stdout
fn init_stdout_logging(env_filter: EnvFilter, audit_layer: AuditBridgeLayer) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).with(audit_layer).init();
}

/// Initialize logging to a file, one JSON event per line — the shape the
/// audit bridge also expects when it is layered on top (`avesa_observability`).
fn init_file_logging(log_path: &std::path::Path, env_filter: EnvFilter, audit_layer: AuditBridgeLayer) -> Result<()> {
    let file = File::create(log_path)?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).with(audit_layer).init();

    Ok(())
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("avesa=debug"));
        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();
        tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init().ok();
    });
}
