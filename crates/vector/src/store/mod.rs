//! External content-addressed record stores
//!
//! The persistent log tier writes one record per vector through the
//! [`RecordStore`] trait. Two implementations ship with the crate:
//! [`MemoryRecordStore`] for tests and embedding, and [`FileRecordStore`]
//! which keeps one JSON envelope per record on disk.

mod file;
mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vecroute_common::Result;

use crate::types::Metadata;

/// Record held by an external store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Record key
    pub id: String,

    /// Opaque payload
    pub data: Vec<u8>,

    /// String metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl StoredRecord {
    pub fn new(id: impl Into<String>, data: Vec<u8>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            data,
            metadata,
        }
    }
}

/// Append-oriented key/record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write (or overwrite) a record, returning its id
    async fn put(&self, record: StoredRecord) -> Result<String>;

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>>;

    /// Delete a record; false when it did not exist
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Records whose id starts with `prefix`, id-ascending, at most `limit`
    async fn list(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<StoredRecord>>;
}
