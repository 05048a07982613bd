use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use vecroute_common::{Result, VecRouteError};

use crate::metric::DistanceMetric;
use crate::types::{
    ensure_dimension, Metadata, SearchQuery, SearchResult, VectorEntry, VectorInput,
};

/// Storage tier, ordered from least to most durable/scalable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    PersistentLog,
    SqlNative,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Memory,
        BackendKind::PersistentLog,
        BackendKind::SqlNative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::PersistentLog => "persistent_log",
            BackendKind::SqlNative => "sql_native",
        }
    }

    /// Whether the tier's index must be rebuilt from external state before use
    pub fn needs_replay(&self) -> bool {
        matches!(self, BackendKind::PersistentLog)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = VecRouteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "memory" | "ephemeral" | "in_memory" => Ok(BackendKind::Memory),
            "persistent" | "persistent_log" | "log" => Ok(BackendKind::PersistentLog),
            "sql" | "sql_native" | "pgvector" | "postgres" => Ok(BackendKind::SqlNative),
            other => Err(VecRouteError::validation(format!(
                "Unknown backend '{}'",
                other
            ))),
        }
    }
}

/// Operations every storage tier implements
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Dimension every stored and queried vector must have
    fn dimension(&self) -> usize;

    /// Metric used for scoring
    fn metric(&self) -> DistanceMetric;

    /// Insert or replace an entry, returning its id
    ///
    /// `None` metadata stores an empty map.
    async fn add(&self, id: &str, vector: VectorInput, metadata: Option<Metadata>)
        -> Result<String>;

    /// Apply `add` to each entry in order, returning the ids committed
    ///
    /// Dimensions are checked for the whole batch before anything is
    /// written. Not atomic: if an entry fails later, the entries before it
    /// stay committed and only their ids are returned.
    async fn add_batch(&self, entries: Vec<VectorEntry>) -> Result<Vec<String>> {
        for entry in &entries {
            ensure_dimension(self.dimension(), entry.embedding.dimension())?;
        }

        let total = entries.len();
        let mut ids = Vec::with_capacity(total);
        for entry in entries {
            let VectorEntry {
                id,
                embedding,
                metadata,
            } = entry;
            match self.add(&id, embedding.into(), Some(metadata)).await {
                Ok(added) => ids.push(added),
                Err(e) => {
                    warn!(
                        "Batch add stopped at '{}' after {} of {} entries: {}",
                        id,
                        ids.len(),
                        total,
                        e
                    );
                    break;
                }
            }
        }
        Ok(ids)
    }

    /// Remove an entry; false when it did not exist
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Remove every entry, returning how many there were
    async fn clear(&self) -> Result<usize>;

    async fn get(&self, id: &str) -> Result<Option<VectorEntry>>;

    /// Nearest entries to the query, similarity descending
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;

    async fn count(&self) -> Result<usize>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }
}
