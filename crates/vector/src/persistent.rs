use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vecroute_common::Result;

use crate::backend::VectorBackend;
use crate::codec::{decode_vector, encode_vector};
use crate::metric::DistanceMetric;
use crate::scan::linear_scan;
use crate::store::{RecordStore, StoredRecord};
use crate::types::{
    ensure_dimension, Embedding, Metadata, SearchQuery, SearchResult, VectorEntry, VectorInput,
};

/// Record metadata key carrying the embedding's provenance tag
pub const SOURCE_METADATA_KEY: &str = "__source";

/// Durable backend over an external record store
///
/// Each entry is one record keyed `"{namespace}:{id}"`. The in-memory
/// index starts empty; call [`replay`](Self::replay) to rebuild it from
/// the store before searching. Mutations hit the store first and only
/// then the index.
pub struct PersistentLogBackend {
    store: Arc<dyn RecordStore>,
    namespace: String,
    dimension: usize,
    metric: DistanceMetric,
    index: RwLock<HashMap<String, VectorEntry>>,
    replayed: AtomicBool,
}

impl PersistentLogBackend {
    pub fn new(
        store: Arc<dyn RecordStore>,
        namespace: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            dimension,
            metric,
            index: RwLock::new(HashMap::new()),
            replayed: AtomicBool::new(false),
        }
    }

    /// Whether [`replay`](Self::replay) has completed
    pub fn is_replayed(&self) -> bool {
        self.replayed.load(Ordering::Acquire)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}:{}", self.namespace, id)
    }

    /// Rebuild the index from every record under the namespace
    ///
    /// Records that fail to decode or have the wrong dimension are skipped.
    /// Returns the number of entries loaded.
    pub async fn replay(&self) -> Result<usize> {
        let prefix = self.prefix();
        let records = self.store.list(&prefix, None).await?;
        let total = records.len();

        let mut rebuilt = HashMap::with_capacity(total);
        for record in records {
            if let Some(entry) = self.decode_record(&prefix, record) {
                rebuilt.insert(entry.id.clone(), entry);
            }
        }

        let loaded = rebuilt.len();
        *self.index.write().await = rebuilt;
        self.replayed.store(true, Ordering::Release);

        info!(
            "Replayed namespace '{}' - {} entries loaded, {} skipped",
            self.namespace,
            loaded,
            total - loaded
        );
        Ok(loaded)
    }

    fn decode_record(&self, prefix: &str, record: StoredRecord) -> Option<VectorEntry> {
        let id = record.id.strip_prefix(prefix)?.to_string();

        let vector = match decode_vector(&record.data) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Skipping record '{}': {}", record.id, e);
                return None;
            }
        };
        if vector.len() != self.dimension {
            warn!(
                "Skipping record '{}': dimension {} != {}",
                record.id,
                vector.len(),
                self.dimension
            );
            return None;
        }

        let mut metadata = record.metadata;
        let source = metadata.remove(SOURCE_METADATA_KEY).unwrap_or_default();
        Some(VectorEntry::new(id, Embedding::new(vector, source), metadata))
    }
}

#[async_trait]
impl VectorBackend for PersistentLogBackend {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn add(
        &self,
        id: &str,
        vector: VectorInput,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        let embedding = vector.into_embedding(self.dimension)?;
        let metadata = metadata.unwrap_or_default();

        let mut record_metadata = metadata.clone();
        if !embedding.source().is_empty() {
            record_metadata.insert(SOURCE_METADATA_KEY.to_string(), embedding.source().to_string());
        }
        let record = StoredRecord::new(
            self.record_key(id),
            encode_vector(embedding.vector()),
            record_metadata,
        );
        self.store.put(record).await?;

        self.index
            .write()
            .await
            .insert(id.to_string(), VectorEntry::new(id, embedding, metadata));

        debug!("Persisted '{}' in namespace '{}'", id, self.namespace);
        Ok(id.to_string())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete(&self.record_key(id)).await?;
        let removed = self.index.write().await.remove(id).is_some();
        Ok(deleted || removed)
    }

    async fn clear(&self) -> Result<usize> {
        let records = self.store.list(&self.prefix(), None).await?;
        let mut deleted = 0;
        for record in &records {
            if self.store.delete(&record.id).await? {
                deleted += 1;
            }
        }

        let mut index = self.index.write().await;
        let indexed = index.len();
        index.clear();

        info!(
            "Cleared namespace '{}' - {} records deleted",
            self.namespace, deleted
        );
        Ok(deleted.max(indexed))
    }

    async fn get(&self, id: &str) -> Result<Option<VectorEntry>> {
        Ok(self.index.read().await.get(id).cloned())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        ensure_dimension(self.dimension, query.vector.len())?;

        if !self.is_replayed() {
            debug!(
                "Searching namespace '{}' before replay; results reflect this process's writes only",
                self.namespace
            );
        }

        let index = self.index.read().await;
        Ok(linear_scan(index.values(), query, self.metric))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.index.read().await.len())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.index.read().await.contains_key(id))
    }
}
