//! Tier 2: SQLite table keyed by cache key, indexed by category and expiry.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::tier::{CacheEntry, CacheTier, StoredPayload, TierKind};
use crate::error::{CatalogError, Result};

/// DDL for the structured tier. Idempotent.
const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS cache_data (
    key        TEXT PRIMARY KEY,
    data       TEXT NOT NULL,   -- JSON payload
    cache_type TEXT NOT NULL,   -- category
    created_at TEXT NOT NULL,   -- RFC 3339, UTC, microseconds
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_data(cache_type, expires_at);
"#;

/// Timestamps are stored as fixed-width UTC strings so that text comparison
/// in SQL matches chronological order.
fn to_sql_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_sql_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CatalogError::Parse(format!("bad timestamp '{raw}': {e}")))
}

/// Structured tier backed by a single SQLite file.
pub struct SqliteTier {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteTier {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::TierUnavailable(format!("sqlite: {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CatalogError::TierUnavailable(format!("sqlite lock poisoned: {e}")))
    }

    fn get_sync(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredPayload>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT data, created_at, expires_at FROM cache_data
                 WHERE key = ?1 AND expires_at >= ?2",
                params![key, to_sql_time(now)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        drop(conn);

        let Some((data, created_at, expires_at)) = row else {
            return Ok(None);
        };
        let payload = serde_json::from_str(&data)
            .map_err(|e| CatalogError::Parse(format!("sqlite payload for {key}: {e}")))?;
        Ok(Some(StoredPayload {
            payload,
            created_at: from_sql_time(&created_at)?,
            expires_at: from_sql_time(&expires_at)?,
        }))
    }

    fn put_sync(&self, entry: &CacheEntry) -> Result<()> {
        let data = serde_json::to_string(&entry.payload)
            .map_err(|e| CatalogError::Parse(format!("serialize payload: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_data (key, data, cache_type, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.key,
                data,
                entry.category,
                to_sql_time(entry.created_at),
                to_sql_time(entry.expires_at),
            ],
        )?;
        Ok(())
    }

    fn delete_sync(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM cache_data WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn scan_sync(&self, category: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM cache_data WHERE cache_type = ?1")?;
        let keys = stmt
            .query_map(params![category], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn sweep_sync(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let cutoff = to_sql_time(now);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let keys = {
            let mut stmt = tx.prepare("SELECT key FROM cache_data WHERE expires_at < ?1")?;
            let keys = stmt
                .query_map(params![cutoff], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            keys
        };
        tx.execute("DELETE FROM cache_data WHERE expires_at < ?1", params![cutoff])?;
        tx.commit()?;
        Ok(keys)
    }

    fn count_sync(&self, now: DateTime<Utc>) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_data WHERE expires_at >= ?1",
            params![to_sql_time(now)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl CacheTier for SqliteTier {
    fn kind(&self) -> TierKind {
        TierKind::Structured
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredPayload>> {
        self.get_sync(key, now)
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.put_sync(entry)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_sync(key)
    }

    async fn scan_category(&self, category: &str) -> Result<Option<Vec<String>>> {
        self.scan_sync(category).map(Some)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Option<Vec<String>>> {
        self.sweep_sync(now).map(Some)
    }

    async fn entry_count(&self, now: DateTime<Utc>) -> Result<u64> {
        self.count_sync(now)
    }
}
