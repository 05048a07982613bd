//! VecRoute vector storage
//!
//! Similarity search over fixed-dimension embeddings with three storage
//! tiers behind one trait: an ephemeral in-memory map, a replayable log
//! over a key-value record store, and a SQL engine with a native vector
//! column. [`VectorRouter`] probes the tiers and picks one at first use.

pub mod backend;
pub mod codec;
pub mod memory;
pub mod metric;
pub mod persistent;
pub mod router;
mod scan;
pub mod sql;
pub mod store;
pub mod types;

pub use backend::{BackendKind, VectorBackend};
pub use codec::{decode_vector, encode_vector};
pub use memory::MemoryBackend;
pub use metric::DistanceMetric;
pub use persistent::{PersistentLogBackend, SOURCE_METADATA_KEY};
pub use router::{ProbeOutcome, RouterSettings, VectorRouter};
pub use sql::{NativeOperator, SqlBackendConfig, SqlExecutor, SqlNativeBackend, SqlRow, SqlValue};
pub use store::{FileRecordStore, MemoryRecordStore, RecordStore, StoredRecord};
pub use types::{
    ensure_dimension, Embedding, Metadata, SearchQuery, SearchResult, VectorEntry, VectorInput,
    DEFAULT_SEARCH_LIMIT,
};
