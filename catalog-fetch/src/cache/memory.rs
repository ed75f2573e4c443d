//! Tier 1: in-process volatile cache.
//!
//! Backed by [`moka`], with each entry's lifetime derived from its own
//! `expires_at` measured against the tier's [`Clock`]. Entries expire
//! natively, so this tier is never swept.
//! Category scans walk the live entries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;

use super::tier::{CacheEntry, CacheTier, StoredPayload, TierKind};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Expire each entry at its own `expires_at`.
struct EntryExpiry {
    clock: Arc<dyn Clock>,
}

impl EntryExpiry {
    fn remaining(&self, entry: &CacheEntry) -> Option<Duration> {
        Some(remaining_at(entry, self.clock.now()))
    }
}

/// Time left before `entry` expires, as seen at `now`.
fn remaining_at(entry: &CacheEntry, now: DateTime<Utc>) -> Duration {
    entry
        .expires_at
        .signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.remaining(value)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.remaining(value)
    }
}

/// Volatile tier holding at most `capacity` entries.
pub struct MemoryTier {
    cache: Cache<String, CacheEntry>,
}

impl MemoryTier {
    pub fn new(capacity: u64) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Like [`MemoryTier::new`], but entry lifetimes are measured against
    /// `clock`.
    pub fn with_clock(capacity: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .expire_after(EntryExpiry { clock })
                .build(),
        }
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredPayload>> {
        Ok(self
            .cache
            .get(key)
            .await
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| StoredPayload {
                payload: entry.payload,
                created_at: entry.created_at,
                expires_at: entry.expires_at,
            }))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.cache.insert(entry.key.clone(), entry.clone()).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn scan_category(&self, category: &str) -> Result<Option<Vec<String>>> {
        let keys = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.category == category)
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        Ok(Some(keys))
    }

    async fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    async fn entry_count(&self, _now: DateTime<Utc>) -> Result<u64> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count())
    }
}
