//! The per-`(tenant_id, natural_key)` logical lock an SCD-2 merge holds for
//! its duration (`spec` §4.8: "single-writer-per-key discipline is
//! sufficient"), grounded on `dashmap`'s sharded concurrent map — the
//! natural idiom for a keyed lock table whose entries must not serialize
//! unrelated keys against each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyLockTable {
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl KeyLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `(tenant_id, natural_key)`, creating it on first
    /// use. The returned guard must be held for the entire merge; dropping
    /// it releases the key for the next writer.
    pub async fn lock(&self, tenant_id: &str, natural_key: &str) -> OwnedMutexGuard<()> {
        let entry = self
            .locks
            .entry((tenant_id.to_string(), natural_key.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        entry.lock_owned().await
    }
}
