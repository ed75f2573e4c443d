//! Tier 3: one JSON document per key under a cache directory.
//!
//! Each file is `<key>.json` holding `{"data", "created_at", "expires_at"}`.
//! Writes go to a temp file first and are renamed into place, so a reader
//! never sees a half-written document. The directory has no category index
//! and is never swept on its own; the tiered cache removes files by key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tier::{CacheEntry, CacheTier, StoredPayload, TierKind};
use crate::error::{CatalogError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct FileDocument {
    data: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

fn io_err(path: &Path, e: std::io::Error) -> CatalogError {
    CatalogError::TierUnavailable(format!("file: {}: {e}", path.display()))
}

/// Durable tier rooted at a directory.
pub struct FileTier {
    dir: PathBuf,
}

impl FileTier {
    /// Use `dir` as the cache directory, creating it if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CacheTier for FileTier {
    fn kind(&self) -> TierKind {
        TierKind::Durable
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredPayload>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        let doc: FileDocument = serde_json::from_slice(&bytes)
            .map_err(|e| CatalogError::Parse(format!("{}: {e}", path.display())))?;
        if now > doc.expires_at {
            return Ok(None);
        }
        Ok(Some(StoredPayload {
            payload: doc.data,
            created_at: doc.created_at,
            expires_at: doc.expires_at,
        }))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let doc = FileDocument {
            data: entry.payload.clone(),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        };
        let body = serde_json::to_vec(&doc)
            .map_err(|e| CatalogError::Parse(format!("serialize payload: {e}")))?;

        let path = self.path_for(&entry.key);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|e| io_err(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| io_err(&path, e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    async fn scan_category(&self, _category: &str) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    async fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    async fn entry_count(&self, _now: DateTime<Utc>) -> Result<u64> {
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_err(&self.dir, e))?;
        let mut count = 0;
        while let Some(item) = dir.next_entry().await.map_err(|e| io_err(&self.dir, e))? {
            if item.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}
