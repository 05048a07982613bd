use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use vecroute_common::Result;

use super::{RecordStore, StoredRecord};

/// Record store kept in process memory
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: StoredRecord) -> Result<String> {
        let id = record.id.clone();
        self.records.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn list(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<StoredRecord>> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn record(id: &str) -> StoredRecord {
        StoredRecord::new(id, vec![1, 2, 3, 4], Metadata::new())
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.put(record("ns:a")).await.unwrap(), "ns:a");
        assert_eq!(store.get("ns:a").await.unwrap().unwrap().data, vec![1, 2, 3, 4]);
        assert!(store.delete("ns:a").await.unwrap());
        assert!(!store.delete("ns:a").await.unwrap());
        assert!(store.get("ns:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryRecordStore::new();
        for id in ["ns:b", "other:a", "ns:a", "ns2:c"] {
            store.put(record(id)).await.unwrap();
        }

        let ids: Vec<_> = store
            .list("ns:", None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["ns:a", "ns:b"]);

        assert_eq!(store.list("ns", Some(2)).await.unwrap().len(), 2);
        assert_eq!(store.len().await, 4);
    }
}
