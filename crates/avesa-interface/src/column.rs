//! `ColumnStore`: the analytical-warehouse capability the Canonical
//! Transformer / SCD-2 Applier writes through (`spec` §4.8).
//!
//! The trait exposes exactly the primitives the SCD-2 merge algorithm
//! needs — look up the current row, insert a fresh current row, atomically
//! close-and-replace the current row, and insert a historical row — rather
//! than a generic query interface. This keeps the merge logic in
//! `avesa-canonical` storage-agnostic: a real column store implements these
//! four operations however its transaction model allows.

use async_trait::async_trait;
use avesa_core::CanonicalRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColumnStoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("concurrent writer broke the single-current invariant for ({tenant_id}, {id})")]
    InvariantViolated { tenant_id: String, id: String },
}

pub type Result<T> = std::result::Result<T, ColumnStoreError>;

impl From<ColumnStoreError> for avesa_core::AvesaError {
    fn from(err: ColumnStoreError) -> Self {
        match err {
            ColumnStoreError::Backend(msg) => avesa_core::AvesaError::Transient(msg),
            ColumnStoreError::InvariantViolated { tenant_id, id } => {
                avesa_core::AvesaError::Conflict(format!("current-row invariant violated for ({tenant_id}, {id})"))
            }
        }
    }
}

#[async_trait]
pub trait ColumnStore: Send + Sync + 'static {
    /// The row with `is_current = true` for `(tenant_id, id)` in
    /// `canonical_table`, if any has ever been ingested.
    async fn get_current(
        &self,
        canonical_table: &str,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<CanonicalRecord>>;

    /// Insert the first row for a natural key that has never been seen
    /// before. Fails (`InvariantViolated`) if a current row already exists
    /// — callers are expected to have just checked `get_current`, but a
    /// concurrent writer on the same key is still possible without the
    /// per-key lock `spec` §4.8 requires, so the store itself enforces it.
    async fn insert_current(&self, canonical_table: &str, record: CanonicalRecord) -> Result<()>;

    /// Atomically close `existing` (`is_current = false`, stamped with
    /// `new.effective_date` as its `expiration_date`) and insert `new` as
    /// the current row. Implementations without a native multi-row
    /// transaction should perform insert-then-close and let the caller's
    /// read-after-write verifier detect and repair a lost race.
    async fn replace_current(
        &self,
        canonical_table: &str,
        existing: CanonicalRecord,
        new: CanonicalRecord,
    ) -> Result<()>;

    /// Insert a non-current historical row (late-arriving record whose
    /// `last_updated` is older than the current row's).
    async fn insert_historical(&self, canonical_table: &str, record: CanonicalRecord) -> Result<()>;

    /// The row for `(tenant_id, id)` — current or historical — with the
    /// smallest `effective_date` that is still strictly greater than
    /// `after`. Used by the SCD-2 merge's late-arriving branch (`spec`
    /// §8 invariant 4) to close a newly-inserted historical row against
    /// its immediate successor rather than always against the current
    /// row, which is only correct when no other historical row sits
    /// between the late arrival and the current row.
    async fn find_successor(
        &self,
        canonical_table: &str,
        tenant_id: &str,
        id: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<CanonicalRecord>>;
}
