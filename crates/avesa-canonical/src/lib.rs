//! The Canonical Transformer & SCD-2 Applier (`spec` §4.8).
//!
//! Turns one chunk's raw records into canonical, SCD-2-versioned rows:
//! decode the raw blob, project each record through its mapping, dedup
//! within the batch, then merge each surviving record into `ColumnStore`
//! under a per-natural-key lock so at most one writer ever touches a given
//! key's current row at a time.

pub mod applier;
pub mod error;
pub mod lock;
pub mod reject;
pub mod scd;
pub mod transform;

pub use applier::{ApplyOutcome, CanonicalApplier};
pub use error::{CanonicalError, Result};
pub use lock::KeyLockTable;
pub use scd::MergeOutcome;

/// The canonical field name mapping documents use for the record's
/// `last_updated` timestamp, by convention — not structurally required
/// by the mapping schema, but the name every reference mapping in this
/// repository projects its incremental field into.
pub const LAST_UPDATED_CANONICAL_FIELD: &str = "last_updated";
