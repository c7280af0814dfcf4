//! Unified logger for audit events with cryptographic chaining
//!
//! This module provides the `UnifiedLogger` which combines event emission
//! with cryptographic audit chaining and persistent storage.

use crate::chain::AuditChain;
use crate::context::TraceContext;
use crate::event::{EventPayload, AvesaEvent};
use crate::signer::AuditSigner;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during logging operations
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chain error: {0}")]
    Chain(#[from] crate::chain::ChainError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Logger is disabled")]
    Disabled,
}

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, LoggerError>;

/// Unified logger for AVESA observability events
///
/// UnifiedLogger provides:
/// - Event emission with automatic trace context
/// - Cryptographic chaining via AuditChain
/// - Persistent storage in JSON Lines format
/// - Thread-safe operation
///
/// ## Example
///
/// ```no_run
/// use avesa_observability::{UnifiedLogger, AuditSigner, EventPayload, TraceContext};
/// use std::path::Path;
///
/// let signer = AuditSigner::from_bytes(b"secret");
/// let logger = UnifiedLogger::new(Some(Path::new("audit.jsonl")), signer).unwrap();
///
/// let ctx = TraceContext::new_root().with_job("job-1".to_string());
/// logger.emit_with_context(
///     &ctx,
///     EventPayload::JobStart {
///         tenant_count: 10,
///         table_count: 30,
///         run_kind: "scheduled".to_string(),
///     },
/// ).unwrap();
/// ```
pub struct UnifiedLogger {
    inner: Arc<Mutex<LoggerInner>>,
}

struct LoggerInner {
    writer: Option<BufWriter<File>>,
    chain: AuditChain,
    path: Option<PathBuf>,
}

impl UnifiedLogger {
    /// Create a new unified logger
    ///
    /// If `path` is None, events are not persisted to disk (useful for testing).
    /// If `path` is Some, events are appended to the file in JSON Lines format.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created/opened.
    pub fn new(path: Option<&Path>, signer: AuditSigner) -> Result<Self> {
        let writer = if let Some(p) = path {
            // Create parent directories if needed
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let file = OpenOptions::new().create(true).append(true).open(p)?;

            Some(BufWriter::new(file))
        } else {
            None
        };

        let chain = AuditChain::new(signer);

        Ok(Self {
            inner: Arc::new(Mutex::new(LoggerInner {
                writer,
                chain,
                path: path.map(|p| p.to_path_buf()),
            })),
        })
    }

    /// Create a no-op logger that discards all events
    ///
    /// This is useful when audit logging is disabled but the code still
    /// needs a logger instance.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LoggerInner {
                writer: None,
                chain: AuditChain::new(AuditSigner::from_bytes(b"disabled")),
                path: None,
            })),
        }
    }

    /// Emit an event with the given trace context
    ///
    /// This is the primary method for emitting events. It:
    /// 1. Creates an AvesaEvent from the payload
    /// 2. Attaches the trace context
    /// 3. Signs the event with the audit chain
    /// 4. Writes to the log file
    pub fn emit_with_context(&self, ctx: &TraceContext, payload: EventPayload) -> Result<()> {
        let mut event =
            AvesaEvent::new(payload).with_trace(ctx.trace_id.clone(), ctx.span_id.clone());

        if let Some(ref parent) = ctx.parent_span_id {
            event.parent_span_id = Some(parent.clone());
        }
        if let Some(ref job) = ctx.job_id {
            event.job_id = Some(job.clone());
        }
        if let Some(ref file) = ctx.file_id {
            event.file_id = Some(file.clone());
        }

        self.emit(event)
    }

    /// Emit a pre-constructed event
    ///
    /// This method signs the event and writes it to the log file.
    /// Prefer `emit_with_context` for most use cases.
    pub fn emit(&self, mut event: AvesaEvent) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        // Sign the event with the audit chain
        inner.chain.sign_event(&mut event)?;

        // Write to file if enabled
        if let Some(ref mut writer) = inner.writer {
            let json = serde_json::to_string(&event)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?; // Ensure durability
        }

        Ok(())
    }

    /// Flush the underlying writer
    ///
    /// This ensures all buffered events are written to disk.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ref mut writer) = inner.writer {
            writer.flush()?;
        }
        Ok(())
    }

    /// Get the current sequence number
    pub fn current_sequence(&self) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.chain.current_sequence()
    }

    /// Get the log file path (if any)
    pub fn path(&self) -> Option<PathBuf> {
        let inner = self.inner.lock().unwrap();
        inner.path.clone()
    }

    // Convenience methods for common event types

    /// Emit a job (orchestrator run) start event
    pub fn emit_job_start(
        &self,
        ctx: &TraceContext,
        tenant_count: u32,
        table_count: u64,
        run_kind: &str,
    ) -> Result<()> {
        self.emit_with_context(
            ctx,
            EventPayload::JobStart {
                tenant_count,
                table_count,
                run_kind: run_kind.to_string(),
            },
        )
    }

    /// Emit a job terminal-status event
    pub fn emit_job_complete(
        &self,
        ctx: &TraceContext,
        duration_ms: u64,
        status: &str,
    ) -> Result<()> {
        self.emit_with_context(
            ctx,
            EventPayload::JobComplete {
                duration_ms,
                status: status.to_string(),
            },
        )
    }

    /// Emit a job failed event
    pub fn emit_job_failed(&self, ctx: &TraceContext, error: &str, retries: u32) -> Result<()> {
        self.emit_with_context(
            ctx,
            EventPayload::JobFailed {
                error: error.to_string(),
                retries,
            },
        )
    }

    /// Emit a table-start event
    pub fn emit_table_start(
        &self,
        ctx: &TraceContext,
        tenant_id: &str,
        table: &str,
        chunk_count: u64,
    ) -> Result<()> {
        self.emit_with_context(
            ctx,
            EventPayload::TableStart {
                tenant_id: tenant_id.to_string(),
                table: table.to_string(),
                chunk_count,
            },
        )
    }

    /// Emit a table-complete event, including the watermark it advanced to
    /// (if any — `spec` §4.5 step 6).
    pub fn emit_table_complete(
        &self,
        ctx: &TraceContext,
        records_written: u64,
        duration_ms: u64,
        watermark: &str,
    ) -> Result<()> {
        self.emit_with_context(
            ctx,
            EventPayload::TableComplete {
                records_written,
                duration_ms,
                watermark: watermark.to_string(),
            },
        )
    }

    /// Emit a table-failed event
    pub fn emit_table_failed(
        &self,
        ctx: &TraceContext,
        error: &str,
        records_written: u64,
    ) -> Result<()> {
        self.emit_with_context(
            ctx,
            EventPayload::TableFailed {
                error: error.to_string(),
                records_written,
            },
        )
    }
}

// Allow cloning to share logger across threads
impl Clone for UnifiedLogger {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
