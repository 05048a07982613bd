use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use vecroute_common::{Result, VecRouteError};

use super::{RecordStore, StoredRecord};
use crate::types::Metadata;

const RECORD_EXTENSION: &str = "json";

/// On-disk form of a record
#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope {
    /// Record key
    id: String,

    /// Hex-encoded payload
    data: String,

    #[serde(default)]
    metadata: Metadata,

    /// Time of the write
    stored_at: DateTime<Utc>,
}

/// Record store with one JSON file per record
///
/// Files are named by the SHA-256 of the record id, so any id maps to a
/// safe file name. Writes land in a temporary file that is renamed into
/// place, leaving each record either fully written or absent.
pub struct FileRecordStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileRecordStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            VecRouteError::store(format!(
                "Failed to create record directory {}: {}",
                root.display(),
                e
            ))
        })?;

        info!("File record store opened at {}", root.display());
        Ok(Self {
            root,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> PathBuf {
        let digest = Sha256::digest(id.as_bytes());
        self.root
            .join(format!("{}.{}", hex::encode(digest), RECORD_EXTENSION))
    }

    fn tmp_path(&self, final_path: &Path) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        final_path.with_extension(format!("tmp-{}-{}", std::process::id(), n))
    }

    async fn read_envelope(path: &Path) -> Result<Option<RecordEnvelope>> {
        match tokio::fs::read_to_string(path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VecRouteError::store(format!(
                "Failed to read record {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn into_record(envelope: RecordEnvelope) -> Result<StoredRecord> {
        let data = hex::decode(&envelope.data).map_err(|e| {
            VecRouteError::store(format!("Corrupt payload in record '{}': {}", envelope.id, e))
        })?;
        Ok(StoredRecord::new(envelope.id, data, envelope.metadata))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn put(&self, record: StoredRecord) -> Result<String> {
        let path = self.record_path(&record.id);
        let envelope = RecordEnvelope {
            id: record.id.clone(),
            data: hex::encode(&record.data),
            metadata: record.metadata,
            stored_at: Utc::now(),
        };
        let json = serde_json::to_string(&envelope)?;

        let tmp = self.tmp_path(&path);
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            VecRouteError::store(format!("Failed to write record '{}': {}", record.id, e))
        })?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(VecRouteError::store(format!(
                "Failed to commit record '{}': {}",
                record.id, e
            )));
        }

        debug!("Record written: {} -> {}", record.id, path.display());
        Ok(record.id)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        match Self::read_envelope(&self.record_path(id)).await? {
            Some(envelope) if envelope.id == id => Ok(Some(Self::into_record(envelope)?)),
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VecRouteError::store(format!(
                "Failed to delete record '{}': {}",
                id, e
            ))),
        }
    }

    async fn list(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<StoredRecord>> {
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            VecRouteError::store(format!(
                "Failed to list records in {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let envelope = match Self::read_envelope(&path).await {
                Ok(Some(envelope)) if envelope.id.starts_with(prefix) => envelope,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping unreadable record file {}: {}", path.display(), e);
                    continue;
                }
            };
            match Self::into_record(envelope) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping record file {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.id.cmp(&b.id));
        records.truncate(limit.unwrap_or(usize::MAX));
        Ok(records)
    }
}
