//! The storage-tier abstraction behind [`super::TieredCache`].
//!
//! Every backend implements [`CacheTier`]. The tiered cache only talks to
//! this trait, so adding or removing a backend never touches the
//! read-through/write-through logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One cached value as written to every tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hex digest of `"{category}:{identifier}"`.
    pub key: String,
    pub category: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// What a tier hands back on a hit.
///
/// Tiers do not all record the category (the durable file format does not),
/// so a hit carries only the payload and its timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPayload {
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Which backend a tier is, ordered fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// In-process volatile cache.
    Memory,
    /// SQLite table with a category/expiry index.
    Structured,
    /// One JSON file per key.
    Durable,
}

impl TierKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Structured => "sqlite",
            Self::Durable => "file",
        }
    }
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single backing store in the cache hierarchy.
///
/// Implementations report failures as
/// [`CatalogError::TierUnavailable`](crate::error::CatalogError::TierUnavailable)
/// (or `Parse` for corrupt payloads); the tiered cache logs them and carries
/// on with the remaining tiers.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> TierKind;

    /// Look up `key`, returning it only if `expires_at > now`.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredPayload>>;

    /// Insert or replace an entry.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys stored under `category`, or `None` if this tier has no category
    /// index.
    async fn scan_category(&self, category: &str) -> Result<Option<Vec<String>>>;

    /// Remove entries with `expires_at < now` and return their keys, or
    /// `None` if this tier does not sweep itself.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Option<Vec<String>>>;

    /// Number of entries currently held.
    async fn entry_count(&self, now: DateTime<Utc>) -> Result<u64>;
}
