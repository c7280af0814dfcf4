//! `MemColumnStore`: an in-memory `ColumnStore`, the reference
//! implementation for tests and local operation. Real deployments target a
//! warehouse (Snowflake, BigQuery, Postgres) instead (out of scope here).

use crate::column::{ColumnStore, ColumnStoreError, Result};
use async_trait::async_trait;
use avesa_core::CanonicalRecord;
use std::collections::HashMap;
use std::sync::Mutex;

type Key = (String, String, String);

#[derive(Default)]
pub struct MemColumnStore {
    current: Mutex<HashMap<Key, CanonicalRecord>>,
    historical: Mutex<Vec<(String, CanonicalRecord)>>,
}

impl MemColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(canonical_table: &str, tenant_id: &str, id: &str) -> Key {
        (canonical_table.to_string(), tenant_id.to_string(), id.to_string())
    }

    /// Test/inspection helper: every historical row ever recorded for a
    /// canonical table, in insertion order.
    pub fn historical_rows(&self, canonical_table: &str) -> Vec<CanonicalRecord> {
        self.historical
            .lock()
            .unwrap()
            .iter()
            .filter(|(table, _)| table == canonical_table)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

#[async_trait]
impl ColumnStore for MemColumnStore {
    async fn get_current(
        &self,
        canonical_table: &str,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<CanonicalRecord>> {
        let key = Self::key(canonical_table, tenant_id, id);
        Ok(self.current.lock().unwrap().get(&key).cloned())
    }

    async fn insert_current(&self, canonical_table: &str, record: CanonicalRecord) -> Result<()> {
        let key = Self::key(canonical_table, &record.tenant_id, &record.id);
        let mut current = self.current.lock().unwrap();
        if current.contains_key(&key) {
            return Err(ColumnStoreError::InvariantViolated {
                tenant_id: record.tenant_id.clone(),
                id: record.id.clone(),
            });
        }
        current.insert(key, record);
        Ok(())
    }

    async fn replace_current(
        &self,
        canonical_table: &str,
        existing: CanonicalRecord,
        new: CanonicalRecord,
    ) -> Result<()> {
        let key = Self::key(canonical_table, &new.tenant_id, &new.id);
        let mut current = self.current.lock().unwrap();
        let mut historical = self.historical.lock().unwrap();

        match current.get(&key) {
            Some(row) if row.record_version == existing.record_version => {}
            _ => {
                return Err(ColumnStoreError::InvariantViolated {
                    tenant_id: new.tenant_id.clone(),
                    id: new.id.clone(),
                })
            }
        }

        let closed = CanonicalRecord {
            is_current: false,
            expiration_date: Some(new.effective_date),
            ..existing
        };
        historical.push((canonical_table.to_string(), closed));
        current.insert(key, new);
        Ok(())
    }

    async fn insert_historical(&self, canonical_table: &str, record: CanonicalRecord) -> Result<()> {
        self.historical
            .lock()
            .unwrap()
            .push((canonical_table.to_string(), record));
        Ok(())
    }

    async fn find_successor(
        &self,
        canonical_table: &str,
        tenant_id: &str,
        id: &str,
        after: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<CanonicalRecord>> {
        let current = self.current.lock().unwrap();
        let historical = self.historical.lock().unwrap();

        let candidates = current
            .get(&Self::key(canonical_table, tenant_id, id))
            .cloned()
            .into_iter()
            .chain(
                historical
                    .iter()
                    .filter(|(table, row)| {
                        table == canonical_table && row.tenant_id == tenant_id && row.id == id
                    })
                    .map(|(_, row)| row.clone()),
            );

        Ok(candidates
            .filter(|row| row.effective_date > after)
            .min_by_key(|row| row.effective_date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(id: &str, version: u32) -> CanonicalRecord {
        let fields = BTreeMap::new();
        CanonicalRecord {
            tenant_id: "t1".to_string(),
            id: id.to_string(),
            fields: fields.clone(),
            source_system: "connectwise".to_string(),
            source_id: id.to_string(),
            last_updated: Utc::now(),
            data_hash: avesa_core::CanonicalRecord::compute_data_hash(&fields),
            effective_date: Utc::now(),
            expiration_date: None,
            is_current: true,
            record_version: version,
        }
    }

    #[tokio::test]
    async fn insert_then_get_current_round_trips() {
        let store = MemColumnStore::new();
        store.insert_current("companies", record("c1", 1)).await.unwrap();
        let found = store.get_current("companies", "t1", "c1").await.unwrap();
        assert_eq!(found.unwrap().record_version, 1);
    }

    #[tokio::test]
    async fn second_insert_for_same_key_is_rejected() {
        let store = MemColumnStore::new();
        store.insert_current("companies", record("c1", 1)).await.unwrap();
        let err = store.insert_current("companies", record("c1", 1)).await.unwrap_err();
        assert!(matches!(err, ColumnStoreError::InvariantViolated { .. }));
    }

    #[tokio::test]
    async fn replace_current_moves_old_row_to_historical() {
        let store = MemColumnStore::new();
        let v1 = record("c1", 1);
        store.insert_current("companies", v1.clone()).await.unwrap();
        let v2 = record("c1", 2);
        store.replace_current("companies", v1, v2.clone()).await.unwrap();

        let current = store.get_current("companies", "t1", "c1").await.unwrap().unwrap();
        assert_eq!(current.record_version, 2);
        assert_eq!(store.historical_rows("companies").len(), 1);
    }

    #[tokio::test]
    async fn replace_current_with_stale_existing_is_rejected() {
        let store = MemColumnStore::new();
        let v1 = record("c1", 1);
        store.insert_current("companies", v1.clone()).await.unwrap();
        let v2 = record("c1", 2);
        store.replace_current("companies", v1.clone(), v2).await.unwrap();

        let v3 = record("c1", 3);
        let err = store.replace_current("companies", v1, v3).await.unwrap_err();
        assert!(matches!(err, ColumnStoreError::InvariantViolated { .. }));
    }
}
