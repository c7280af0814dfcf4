//! Dead-letter queue: in-memory holding area for rejected canonical records
//!
//! The Canonical Transformer routes a record here when a required field
//! resolves to null instead of failing the whole chunk. The queue is flushed
//! to the per-job reject blob by the caller; this crate stays storage-free.
//!
//! # Example
//!
//! ```
//! use avesa_resilience::dead_letter::{DeadLetterQueue, DeadLetterEntry, FailureReason};
//!
//! let mut dlq = DeadLetterQueue::new(1000);
//!
//! dlq.push(DeadLetterEntry {
//!     tenant_id: "t1".to_string(),
//!     job_id: "job-1".to_string(),
//!     item_key: "connectwise/company/companies#42".to_string(),
//!     failure_reason: FailureReason::RequiredFieldMissing { field: "owner.id".to_string() },
//!     raw_record: serde_json::json!({"id": "42"}),
//!     failed_at: std::time::SystemTime::now(),
//! });
//!
//! assert_eq!(dlq.len(), 1);
//! let entries = dlq.drain();
//! assert_eq!(entries.len(), 1);
//! ```

use serde::Serialize;
use std::collections::VecDeque;
use std::time::SystemTime;

/// Reason a raw record was routed to the dead-letter queue
#[derive(Debug, Clone, Serialize)]
pub enum FailureReason {
    /// A `required: true` field in the mapping resolved to null
    RequiredFieldMissing { field: String },
    /// The mapping's `transform` could not be applied to the resolved value
    TransformFailed { field: String, detail: String },
    /// No mapping could be resolved for this (service, endpoint) pair
    UnmappedRecord,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::RequiredFieldMissing { field } => {
                write!(f, "required field missing: {field}")
            }
            FailureReason::TransformFailed { field, detail } => {
                write!(f, "transform failed on {field}: {detail}")
            }
            FailureReason::UnmappedRecord => write!(f, "no mapping resolved"),
        }
    }
}

/// One rejected record, carrying enough context to write `{raw, reason}`
/// to the per-job reject blob (`spec` §6).
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterEntry {
    pub tenant_id: String,
    pub job_id: String,
    /// `{service}/{endpoint}#{natural_key}` — for operator triage, not parsed
    pub item_key: String,
    pub failure_reason: FailureReason,
    pub raw_record: serde_json::Value,
    #[serde(skip)]
    pub failed_at: SystemTime,
}

/// In-memory dead-letter queue with bounded capacity.
///
/// Entries beyond capacity are dropped oldest-first so a pathological chunk
/// of rejects cannot exhaust memory; `stats()` reports how many were lost.
#[derive(Debug)]
pub struct DeadLetterQueue {
    entries: VecDeque<DeadLetterEntry>,
    max_capacity: usize,
    total_received: u64,
    total_dropped: u64,
}

impl DeadLetterQueue {
    pub fn new(max_capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_capacity.min(1024)),
            max_capacity,
            total_received: 0,
            total_dropped: 0,
        }
    }

    /// Push an entry, dropping the oldest if at capacity.
    pub fn push(&mut self, entry: DeadLetterEntry) {
        self.total_received += 1;

        if self.entries.len() >= self.max_capacity {
            self.entries.pop_front();
            self.total_dropped += 1;
        }

        self.entries.push_back(entry);
    }

    /// Drain all entries for flushing to the reject blob.
    pub fn drain(&mut self) -> Vec<DeadLetterEntry> {
        self.entries.drain(..).collect()
    }

    pub fn entries_for_job(&self, job_id: &str) -> Vec<&DeadLetterEntry> {
        self.entries.iter().filter(|e| e.job_id == job_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> DeadLetterStats {
        DeadLetterStats {
            current_count: self.entries.len(),
            max_capacity: self.max_capacity,
            total_received: self.total_received,
            total_dropped: self.total_dropped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterStats {
    pub current_count: usize,
    pub max_capacity: usize,
    pub total_received: u64,
    pub total_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(key: &str, job_id: &str) -> DeadLetterEntry {
        DeadLetterEntry {
            tenant_id: "t1".to_string(),
            job_id: job_id.to_string(),
            item_key: key.to_string(),
            failure_reason: FailureReason::RequiredFieldMissing {
                field: "owner.id".to_string(),
            },
            raw_record: serde_json::json!({}),
            failed_at: SystemTime::now(),
        }
    }

    #[test]
    fn push_and_drain() {
        let mut dlq = DeadLetterQueue::new(100);
        dlq.push(make_entry("a", "job-1"));
        dlq.push(make_entry("b", "job-1"));
        assert_eq!(dlq.len(), 2);

        let entries = dlq.drain();
        assert_eq!(entries.len(), 2);
        assert!(dlq.is_empty());
    }

    #[test]
    fn capacity_overflow_drops_oldest() {
        let mut dlq = DeadLetterQueue::new(2);
        dlq.push(make_entry("a", "job-1"));
        dlq.push(make_entry("b", "job-1"));
        dlq.push(make_entry("c", "job-1"));

        assert_eq!(dlq.len(), 2);
        let entries = dlq.drain();
        assert_eq!(entries[0].item_key, "b");
        assert_eq!(entries[1].item_key, "c");
    }

    #[test]
    fn entries_for_job_filters() {
        let mut dlq = DeadLetterQueue::new(100);
        dlq.push(make_entry("a", "job-1"));
        dlq.push(make_entry("b", "job-2"));
        dlq.push(make_entry("c", "job-1"));

        assert_eq!(dlq.entries_for_job("job-1").len(), 2);
        assert_eq!(dlq.entries_for_job("job-2").len(), 1);
    }

    #[test]
    fn stats_track_drops() {
        let mut dlq = DeadLetterQueue::new(2);
        for i in 0..50 {
            dlq.push(make_entry(&format!("r{i}"), "job-1"));
        }

        let stats = dlq.stats();
        assert_eq!(stats.current_count, 2);
        assert_eq!(stats.total_received, 50);
        assert_eq!(stats.total_dropped, 48);
    }

    #[test]
    fn failure_reason_display() {
        let r = FailureReason::RequiredFieldMissing {
            field: "id".to_string(),
        };
        assert_eq!(r.to_string(), "required field missing: id");

        let r = FailureReason::UnmappedRecord;
        assert_eq!(r.to_string(), "no mapping resolved");
    }
}
