//! Three-tier read-through / write-through cache.
//!
//! ```text
//! get:  memory ──miss──► sqlite ──miss──► file ──miss──► None
//!          ▲               │ hit            │ hit
//!          └── promote ────┘◄── promote ────┘
//!
//! set:  memory + sqlite + file, each independently; result = AND
//! ```
//!
//! Every tier call is guarded on its own. A failing tier is logged and
//! skipped; the cache as a whole never returns an error to its caller.
//! Entries are keyed by [`cache_key`] and expire at `now + ttl(category)`.

pub mod file;
pub mod memory;
pub mod sqlite;
pub mod tier;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, DEFAULT_TTL, MAX_TTL};

pub use file::FileTier;
pub use memory::MemoryTier;
pub use sqlite::SqliteTier;
pub use tier::{CacheEntry, CacheTier, StoredPayload, TierKind};

/// Deterministic cache key: lowercase hex SHA-256 of `"{category}:{identifier}"`.
pub fn cache_key(category: &str, identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update(b":");
    hasher.update(identifier.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Snapshot of cache occupancy and hit accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Live entries per active tier, keyed by tier name.
    pub tiers: BTreeMap<String, u64>,
    pub hits: u64,
    pub misses: u64,
}

/// A single logical key/value store over an ordered set of tiers.
pub struct TieredCache {
    tiers: Vec<Box<dyn CacheTier>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("tiers", &self.tier_kinds())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl TieredCache {
    /// Open every tier enabled in `config` against the system clock.
    pub fn open(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open every tier enabled in `config`, reading time from `clock`.
    ///
    /// A tier whose backend cannot be opened is logged and left out.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut tiers: Vec<Box<dyn CacheTier>> = Vec::new();

        if config.memory_enabled {
            tiers.push(Box::new(MemoryTier::with_clock(
                config.memory_capacity,
                Arc::clone(&clock),
            )));
        }
        if let Some(path) = &config.sqlite_path {
            match SqliteTier::open(path) {
                Ok(tier) => tiers.push(Box::new(tier)),
                Err(e) => tracing::warn!(
                    tier = TierKind::Structured.name(),
                    path = %path.display(),
                    error = %e,
                    "cache tier unavailable, continuing without it"
                ),
            }
        }
        if let Some(dir) = &config.file_dir {
            match FileTier::open(dir) {
                Ok(tier) => tiers.push(Box::new(tier)),
                Err(e) => tracing::warn!(
                    tier = TierKind::Durable.name(),
                    path = %dir.display(),
                    error = %e,
                    "cache tier unavailable, continuing without it"
                ),
            }
        }

        Self::from_tiers(tiers, config, clock)
    }

    /// Build a cache over caller-supplied tiers. `tiers` must be ordered
    /// fastest first.
    pub fn from_tiers(
        tiers: Vec<Box<dyn CacheTier>>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let kinds: Vec<TierKind> = tiers.iter().map(|t| t.kind()).collect();
        tracing::debug!(tiers = ?kinds, "cache opened");
        Self {
            tiers,
            config,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Active tiers, fastest first.
    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn fresh_entry(
        &self,
        category: &str,
        key: String,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> CacheEntry {
        let ttl = chrono::Duration::from_std(self.config.ttl_for(category).min(MAX_TTL))
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_TTL.as_secs() as i64));
        CacheEntry {
            key,
            category: category.to_string(),
            payload,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Look up `(category, identifier)`, probing tiers fastest first.
    ///
    /// A hit in a slower tier is copied into every faster tier with a fresh
    /// TTL. Promotion failures are logged and do not affect the result.
    pub async fn get(&self, category: &str, identifier: &str) -> Option<serde_json::Value> {
        let key = cache_key(category, identifier);
        let now = self.now();

        for (index, tier) in self.tiers.iter().enumerate() {
            let hit = match tier.get(&key, now).await {
                Ok(Some(hit)) if now <= hit.expires_at => hit,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(tier = tier.kind().name(), error = %e, "cache tier read failed");
                    continue;
                }
            };

            tracing::debug!(tier = tier.kind().name(), category, "cache hit");
            self.hits.fetch_add(1, Ordering::Relaxed);

            if index > 0 {
                let promoted = self.fresh_entry(category, key.clone(), hit.payload.clone(), now);
                for faster in &self.tiers[..index] {
                    if let Err(e) = faster.put(&promoted).await {
                        tracing::warn!(
                            tier = faster.kind().name(),
                            error = %e,
                            "cache promotion failed"
                        );
                    }
                }
            }
            return Some(hit.payload);
        }

        tracing::debug!(category, "cache miss");
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Write `payload` to every tier with `expires_at = now + ttl(category)`.
    ///
    /// Returns `true` only if every tier accepted the write. Tiers that
    /// succeeded are not rolled back when another fails.
    pub async fn set(&self, category: &str, identifier: &str, payload: serde_json::Value) -> bool {
        let key = cache_key(category, identifier);
        let entry = self.fresh_entry(category, key, payload, self.now());

        let mut all_ok = true;
        for tier in &self.tiers {
            if let Err(e) = tier.put(&entry).await {
                tracing::warn!(
                    tier = tier.kind().name(),
                    category,
                    error = %e,
                    "cache tier write failed"
                );
                all_ok = false;
            }
        }
        all_ok
    }

    /// [`get`](Self::get) and deserialize. A payload of the wrong shape is
    /// logged and treated as a miss.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        category: &str,
        identifier: &str,
    ) -> Option<T> {
        let value = self.get(category, identifier).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(category, error = %e, "cached payload did not decode, ignoring");
                None
            }
        }
    }

    /// Serialize `value` and [`set`](Self::set) it.
    pub async fn set_json<T: Serialize>(
        &self,
        category: &str,
        identifier: &str,
        value: &T,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(payload) => self.set(category, identifier, payload).await,
            Err(e) => {
                tracing::warn!(category, error = %e, "payload did not serialize, not cached");
                false
            }
        }
    }

    /// Remove one entry, or with `identifier = None` every entry of
    /// `category` known to an indexed tier.
    pub async fn invalidate(&self, category: &str, identifier: Option<&str>) {
        let keys: BTreeSet<String> = match identifier {
            Some(id) => BTreeSet::from([cache_key(category, id)]),
            None => {
                let mut keys = BTreeSet::new();
                for tier in &self.tiers {
                    match tier.scan_category(category).await {
                        Ok(Some(found)) => keys.extend(found),
                        Ok(None) => {}
                        Err(e) => tracing::warn!(
                            tier = tier.kind().name(),
                            category,
                            error = %e,
                            "category scan failed"
                        ),
                    }
                }
                keys
            }
        };

        self.delete_everywhere(&keys, None).await;
        tracing::debug!(category, count = keys.len(), "cache invalidated");
    }

    /// Remove expired entries from tiers that sweep themselves, then delete
    /// the same keys from the remaining tiers. Returns the number of
    /// distinct keys removed.
    pub async fn sweep(&self) -> usize {
        let now = self.now();
        let mut removed = BTreeSet::new();
        let mut swept_tiers = Vec::new();

        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.sweep_expired(now).await {
                Ok(Some(keys)) => {
                    removed.extend(keys);
                    swept_tiers.push(index);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(tier = tier.kind().name(), error = %e, "cache sweep failed");
                }
            }
        }

        self.delete_everywhere(&removed, Some(&swept_tiers)).await;
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "swept expired cache entries");
        }
        removed.len()
    }

    async fn delete_everywhere(&self, keys: &BTreeSet<String>, skip: Option<&[usize]>) {
        for (index, tier) in self.tiers.iter().enumerate() {
            if skip.is_some_and(|s| s.contains(&index)) {
                continue;
            }
            for key in keys {
                if let Err(e) = tier.delete(key).await {
                    tracing::warn!(tier = tier.kind().name(), error = %e, "cache delete failed");
                }
            }
        }
    }

    /// Per-tier entry counts plus hit/miss counters.
    pub async fn stats(&self) -> CacheStats {
        let now = self.now();
        let mut tiers = BTreeMap::new();
        for tier in &self.tiers {
            match tier.entry_count(now).await {
                Ok(count) => {
                    tiers.insert(tier.kind().name().to_string(), count);
                }
                Err(e) => {
                    tracing::warn!(tier = tier.kind().name(), error = %e, "cache count failed");
                }
            }
        }
        CacheStats {
            tiers,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
