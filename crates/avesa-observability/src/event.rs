//! Unified event schema for AVESA observability
//!
//! This module provides the `AvesaEvent` structure that consolidates
//! audit events, telemetry events, and tracing events into a single
//! unified schema with cryptographic integrity support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unified event schema for all AVESA operations
///
/// AvesaEvent provides a single event structure that replaces the legacy
/// AuditEvent and TelemetryEvent types. Every event includes:
/// - Trace correlation IDs (W3C Trace Context format)
/// - Job and file-level correlation
/// - Cryptographic integrity (HMAC chain)
/// - Monotonic sequencing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvesaEvent {
    /// W3C Trace Context trace ID (32-char hex, 128-bit)
    pub trace_id: String,

    /// W3C Trace Context span ID (16-char hex, 64-bit)
    pub span_id: String,

    /// Parent span ID for distributed tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,

    /// Job-level correlation ID (from the orchestrator)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// File-level correlation ID (format: "source -> dest")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    /// Event timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Monotonic sequence number for ordering
    pub sequence: u64,

    /// HMAC-SHA256 hash linking to previous event in chain
    /// None for first event or if chaining is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,

    /// Event-specific payload
    pub payload: EventPayload,

    /// Optional structured metadata for extensibility
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AvesaEvent {
    /// Create a new event with the given payload
    ///
    /// This initializes an event with:
    /// - Current timestamp
    /// - Zero sequence (will be set by AuditChain)
    /// - No trace IDs (should be set from TraceContext)
    pub fn new(payload: EventPayload) -> Self {
        Self {
            trace_id: String::new(),
            span_id: String::new(),
            parent_span_id: None,
            job_id: None,
            file_id: None,
            timestamp: Utc::now(),
            sequence: 0,
            integrity_hash: None,
            payload,
            metadata: None,
        }
    }

    /// Set trace context for this event
    pub fn with_trace(mut self, trace_id: String, span_id: String) -> Self {
        self.trace_id = trace_id;
        self.span_id = span_id;
        self
    }

    /// Set job ID for this event
    pub fn with_job(mut self, job_id: String) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Set file ID for this event
    pub fn with_file(mut self, file_id: String) -> Self {
        self.file_id = Some(file_id);
        self
    }

    /// Set custom metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Event payload variants
///
/// The payload enum uses serde's "tag" attribute for clean JSON representation
/// where the event type is stored in a "type" field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Orchestrator run started
    JobStart {
        tenant_count: u32,
        table_count: u64,
        run_kind: String,
    },

    /// Orchestrator run reached a terminal status
    JobComplete { duration_ms: u64, status: String },

    /// Orchestrator run failed fatally
    JobFailed { error: String, retries: u32 },

    /// Table Processor started planning/executing one (tenant, table)
    TableStart {
        tenant_id: String,
        table: String,
        chunk_count: u64,
    },

    /// Table Processor chunk-map progress update
    TableProgress {
        chunks_done: u64,
        chunks_total: u64,
    },

    /// Table Processor reached a terminal status and (maybe) advanced the watermark
    TableComplete {
        records_written: u64,
        duration_ms: u64,
        watermark: String,
    },

    /// Table Processor could not advance past a failed/timed-out chunk
    TableFailed {
        error: String,
        records_written: u64,
    },

    /// Chunk Processor settled a chunk to `succeeded`
    ChunkSucceeded {
        chunk_seq: u32,
        records_written: u64,
        attempt: u32,
    },

    /// Chunk Processor settled a chunk to `failed` or `timed_out`
    ChunkFailed { chunk_seq: u32, error: String },

    /// Capability-store read (`StateStore`/`BlobStore`/`ColumnStore`)
    BackendRead {
        path: String,
        bytes: u64,
        duration_ms: u64,
    },

    /// Capability-store write (`StateStore`/`BlobStore`/`ColumnStore`)
    BackendWrite {
        path: String,
        bytes: u64,
        duration_ms: u64,
    },

    /// Capability-store prefix listing (`BlobStore::list`)
    BackendList {
        path: String,
        entries: u64,
        duration_ms: u64,
    },

    /// Tracing span started
    SpanStart { name: String, level: String },

    /// Tracing span ended
    SpanEnd { name: String, duration_ms: u64 },

    /// Custom event for extensibility
    Custom {
        event_type: String,
        data: serde_json::Value,
    },
}
