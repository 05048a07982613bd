use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use vecroute_common::Result;

use crate::backend::VectorBackend;
use crate::metric::DistanceMetric;
use crate::scan::linear_scan;
use crate::types::{ensure_dimension, Metadata, SearchQuery, SearchResult, VectorEntry, VectorInput};

/// Ephemeral in-process backend
///
/// Everything lives in a map and is lost when the process exits.
pub struct MemoryBackend {
    dimension: usize,
    metric: DistanceMetric,
    entries: RwLock<HashMap<String, VectorEntry>>,
}

impl MemoryBackend {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
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
        let entry = VectorEntry::new(id, embedding, metadata.unwrap_or_default());

        self.entries.write().await.insert(id.to_string(), entry);
        debug!("Memory backend stored '{}'", id);
        Ok(id.to_string())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        ensure_dimension(self.dimension, query.vector.len())?;

        let entries = self.entries.read().await;
        let results = linear_scan(entries.values(), query, self.metric);

        debug!(
            "Memory search completed - {} results from {} candidates",
            results.len(),
            entries.len()
        );
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;

    fn axis(dim: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[i] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_cosine_scenario() {
        let backend = MemoryBackend::new(8, DistanceMetric::Cosine);
        backend.add("a", axis(8, 0).into(), None).await.unwrap();
        backend.add("b", axis(8, 1).into(), None).await.unwrap();

        let results = backend
            .search(&SearchQuery::new(axis(8, 0)).with_limit(2))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[1].id, "b");
        assert!(results[1].similarity.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_replaces_wholesale() {
        let backend = MemoryBackend::new(2, DistanceMetric::Euclidean);
        let meta = Metadata::from([("k".to_string(), "v".to_string())]);

        backend.add("a", vec![1.0, 2.0].into(), Some(meta)).await.unwrap();
        backend.add("a", vec![3.0, 4.0].into(), None).await.unwrap();

        assert_eq!(backend.count().await.unwrap(), 1);
        let entry = backend.get("a").await.unwrap().unwrap();
        assert_eq!(entry.vector(), &[3.0, 4.0]);
        assert!(entry.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_validated() {
        let backend = MemoryBackend::new(3, DistanceMetric::Cosine);
        let err = backend.add("a", vec![1.0].into(), None).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.count().await.unwrap(), 0);

        let err = backend.search(&SearchQuery::new(vec![1.0, 0.0])).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_embedding_input_keeps_source() {
        let backend = MemoryBackend::new(2, DistanceMetric::Cosine);
        let embedding = Embedding::new(vec![0.6, 0.8], "nomic-embed-text");
        backend.add("e", embedding.into(), None).await.unwrap();

        let entry = backend.get("e").await.unwrap().unwrap();
        assert_eq!(entry.embedding.source(), "nomic-embed-text");
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let backend = MemoryBackend::new(2, DistanceMetric::Manhattan);
        backend.add("a", vec![0.0, 1.0].into(), None).await.unwrap();
        backend.add("b", vec![1.0, 0.0].into(), None).await.unwrap();

        assert!(backend.exists("a").await.unwrap());
        assert!(backend.remove("a").await.unwrap());
        assert!(!backend.remove("a").await.unwrap());
        assert!(!backend.exists("a").await.unwrap());

        assert_eq!(backend.clear().await.unwrap(), 1);
        assert_eq!(backend.count().await.unwrap(), 0);
        assert!(backend
            .search(&SearchQuery::new(vec![0.0, 0.0]))
            .await
            .unwrap()
            .is_empty());
    }
}
