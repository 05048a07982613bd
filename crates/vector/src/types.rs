use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use vecroute_common::{Result, VecRouteError};

/// String metadata attached to an entry
pub type Metadata = HashMap<String, String>;

/// Default number of results returned by a search
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Immutable fixed-dimension embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEmbedding")]
pub struct Embedding {
    vector: Vec<f32>,
    dimension: usize,
    source: String,
}

#[derive(Deserialize)]
struct RawEmbedding {
    vector: Vec<f32>,
    dimension: usize,
    #[serde(default)]
    source: String,
}

impl TryFrom<RawEmbedding> for Embedding {
    type Error = VecRouteError;

    fn try_from(raw: RawEmbedding) -> Result<Self> {
        Embedding::with_dimension(raw.vector, raw.dimension, raw.source)
    }
}

impl Embedding {
    /// Create embedding, inferring the dimension from the vector
    pub fn new(vector: Vec<f32>, source: impl Into<String>) -> Self {
        let dimension = vector.len();
        Self {
            vector,
            dimension,
            source: source.into(),
        }
    }

    /// Create embedding with an explicit dimension, checked against the vector
    pub fn with_dimension(
        vector: Vec<f32>,
        dimension: usize,
        source: impl Into<String>,
    ) -> Result<Self> {
        if vector.len() != dimension {
            return Err(VecRouteError::dimension_mismatch(dimension, vector.len()));
        }
        Ok(Self {
            vector,
            dimension,
            source: source.into(),
        })
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Provenance tag (typically the embedding model name)
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vector: Vec<f32>) -> Self {
        Embedding::new(vector, "")
    }
}

/// Vector payload accepted by `add`
#[derive(Debug, Clone, PartialEq)]
pub enum VectorInput {
    Raw(Vec<f32>),
    Embedding(Embedding),
}

impl VectorInput {
    /// Resolve into an embedding whose dimension equals `expected`
    pub fn into_embedding(self, expected: usize) -> Result<Embedding> {
        let embedding = match self {
            VectorInput::Raw(vector) => Embedding::from(vector),
            VectorInput::Embedding(embedding) => embedding,
        };
        ensure_dimension(expected, embedding.dimension())?;
        Ok(embedding)
    }

    pub fn len(&self) -> usize {
        match self {
            VectorInput::Raw(vector) => vector.len(),
            VectorInput::Embedding(embedding) => embedding.dimension(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f32>> for VectorInput {
    fn from(vector: Vec<f32>) -> Self {
        VectorInput::Raw(vector)
    }
}

impl From<&[f32]> for VectorInput {
    fn from(vector: &[f32]) -> Self {
        VectorInput::Raw(vector.to_vec())
    }
}

impl From<Embedding> for VectorInput {
    fn from(embedding: Embedding) -> Self {
        VectorInput::Embedding(embedding)
    }
}

/// Stored vector entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Entry ID
    pub id: String,

    /// Embedding
    pub embedding: Embedding,

    /// Entry metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorEntry {
    pub fn new(id: impl Into<String>, embedding: impl Into<Embedding>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            embedding: embedding.into(),
            metadata,
        }
    }

    pub fn vector(&self) -> &[f32] {
        self.embedding.vector()
    }
}

/// Search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Query vector
    pub vector: Vec<f32>,

    /// Maximum number of results
    pub limit: usize,

    /// Exact-match metadata filters, all of which must hold
    pub filters: Metadata,

    /// Inclusive lower bound on similarity
    pub threshold: Option<f64>,
}

impl SearchQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            limit: DEFAULT_SEARCH_LIMIT,
            filters: Metadata::new(),
            threshold: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn with_filters(mut self, filters: Metadata) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Whether `metadata` satisfies every filter (absent key never matches)
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.filters
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }

    /// Whether `similarity` clears the threshold
    pub fn passes_threshold(&self, similarity: f64) -> bool {
        self.threshold.map_or(true, |t| similarity >= t)
    }
}

/// Search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Entry ID
    pub id: String,

    /// Similarity score (0.0 to 1.0)
    pub similarity: f64,

    /// Distance under the backend's metric
    pub distance: f64,

    /// Metadata
    pub metadata: Metadata,
}

impl SearchResult {
    pub fn new(id: String, similarity: f64, distance: f64, metadata: Metadata) -> Self {
        Self {
            id,
            similarity,
            distance,
            metadata,
        }
    }

    /// Ranking order: similarity descending, then id ascending
    pub fn ranking(a: &SearchResult, b: &SearchResult) -> Ordering {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Fail with a dimension mismatch unless `got == expected`
pub fn ensure_dimension(expected: usize, got: usize) -> Result<()> {
    if got != expected {
        return Err(VecRouteError::dimension_mismatch(expected, got));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_inferred_dimension() {
        let e = Embedding::new(vec![0.1, 0.2, 0.3], "nomic-embed-text");
        assert_eq!(e.dimension(), 3);
        assert_eq!(e.source(), "nomic-embed-text");
    }

    #[test]
    fn test_embedding_dimension_checked() {
        assert!(Embedding::with_dimension(vec![1.0, 2.0], 2, "m").is_ok());

        let err = Embedding::with_dimension(vec![1.0, 2.0], 3, "m").unwrap_err();
        assert!(matches!(
            err,
            VecRouteError::DimensionMismatch { expected: 3, got: 2 }
        ));
    }

    #[test]
    fn test_embedding_deserialize_validates() {
        let ok: Embedding =
            serde_json::from_str(r#"{"vector":[1.0,0.0],"dimension":2,"source":"m"}"#).unwrap();
        assert_eq!(ok.vector(), &[1.0, 0.0]);

        let bad = serde_json::from_str::<Embedding>(r#"{"vector":[1.0],"dimension":2}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_vector_input_dimension() {
        let input = VectorInput::from(vec![1.0, 2.0, 3.0]);
        assert!(input.clone().into_embedding(3).is_ok());
        assert!(input.into_embedding(4).unwrap_err().is_validation());
    }

    #[test]
    fn test_query_filters() {
        let query = SearchQuery::new(vec![1.0]).with_filter("lang", "en");

        let mut meta = Metadata::new();
        assert!(!query.matches(&meta));

        meta.insert("lang".into(), "de".into());
        assert!(!query.matches(&meta));

        meta.insert("lang".into(), "en".into());
        meta.insert("extra".into(), "x".into());
        assert!(query.matches(&meta));
    }

    #[test]
    fn test_query_threshold_inclusive() {
        let query = SearchQuery::new(vec![1.0]).with_threshold(0.5);
        assert!(query.passes_threshold(0.5));
        assert!(!query.passes_threshold(0.4999));
        assert!(SearchQuery::new(vec![1.0]).passes_threshold(0.0));
    }

    #[test]
    fn test_search_result_ranking() {
        let mut results = vec![
            SearchResult::new("c".into(), 0.6, 0.4, Metadata::new()),
            SearchResult::new("b".into(), 0.95, 0.05, Metadata::new()),
            SearchResult::new("a".into(), 0.6, 0.4, Metadata::new()),
        ];
        results.sort_by(SearchResult::ranking);
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
