//! The primary/fallback orchestrator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::TieredCache;
use crate::config::{CacheConfig, ProviderConfig};
use crate::error::CatalogError;
use crate::provider::CatalogProvider;
use crate::providers::{MarketplaceProvider, RetailProvider};
use crate::types::ProductRecord;

use super::dedup::deduplicate;
use super::ranking::rank;

/// A provider plus its call counter.
struct Slot {
    provider: Arc<dyn CatalogProvider>,
    calls: AtomicU64,
}

impl Slot {
    fn new(provider: Arc<dyn CatalogProvider>) -> Self {
        Self {
            provider,
            calls: AtomicU64::new(0),
        }
    }
}

/// Snapshot returned by [`SourceOrchestrator::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStats {
    pub total_requests: u64,
    /// Calls issued to each provider, keyed by provider name.
    pub provider_calls: BTreeMap<String, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// `cache_hits / max(cache_hits + cache_misses, 1)`.
    pub cache_hit_rate: f64,
    /// Live entries per cache tier.
    pub tiers: BTreeMap<String, u64>,
}

/// Merges a primary provider with an optional fallback.
///
/// Provider failures never reach the caller: they are logged and treated
/// as empty results.
pub struct SourceOrchestrator {
    primary: Slot,
    fallback: Option<Slot>,
    cache: Arc<TieredCache>,
    total_requests: AtomicU64,
}

impl SourceOrchestrator {
    pub fn new(
        primary: Arc<dyn CatalogProvider>,
        fallback: Option<Arc<dyn CatalogProvider>>,
        cache: Arc<TieredCache>,
    ) -> Self {
        Self {
            primary: Slot::new(primary),
            fallback: fallback.map(Slot::new),
            cache,
            total_requests: AtomicU64::new(0),
        }
    }

    /// Open the cache and build the retail primary and optional marketplace
    /// fallback over it.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Config`] if any config fails validation.
    pub fn from_config(
        primary: ProviderConfig,
        fallback: Option<ProviderConfig>,
        cache: CacheConfig,
    ) -> Result<Self, CatalogError> {
        cache.validate()?;
        let cache = Arc::new(TieredCache::open(cache));
        let primary: Arc<dyn CatalogProvider> =
            Arc::new(RetailProvider::new(primary, Arc::clone(&cache))?);
        let fallback = match fallback {
            Some(config) => Some(Arc::new(MarketplaceProvider::new(config, Arc::clone(&cache))?)
                as Arc<dyn CatalogProvider>),
            None => None,
        };
        Ok(Self::new(primary, fallback, cache))
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    async fn call_search(&self, slot: &Slot, query: &str, limit: usize) -> Vec<ProductRecord> {
        slot.calls.fetch_add(1, Ordering::Relaxed);
        let name = slot.provider.name();
        match slot.provider.search(query, limit).await {
            Ok(records) => {
                tracing::debug!(
                    provider = %name,
                    count = records.len(),
                    "provider returned results"
                );
                records
            }
            Err(e) => {
                tracing::warn!(provider = %name, error = %e, "provider search failed");
                Vec::new()
            }
        }
    }

    /// Search the primary, top up from the fallback, dedup, rank, truncate.
    ///
    /// # Pipeline
    ///
    /// 1. Query the primary for `limit` records; a failure counts as empty
    /// 2. If short of `limit` and a fallback exists, ask it for the shortfall
    /// 3. Append fallback records after the primary's
    /// 4. Deduplicate by normalized title, keeping the first occurrence
    /// 5. Sort by `rating * review_count`, descending
    /// 6. Truncate to `limit`
    pub async fn search(&self, query: &str, limit: usize) -> Vec<ProductRecord> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(query, limit, "orchestrated search");
        if limit == 0 {
            return Vec::new();
        }

        let mut merged = self.call_search(&self.primary, query, limit).await;

        if merged.len() < limit {
            if let Some(fallback) = &self.fallback {
                let shortfall = limit - merged.len();
                merged.extend(self.call_search(fallback, query, shortfall).await);
            }
        }

        rank(deduplicate(merged), limit)
    }

    /// Fetch one record from exactly the provider named `source`.
    ///
    /// There is no cross-provider fallback. An unknown source, an absent
    /// item and a failed lookup all yield `None`; failures are logged.
    pub async fn get_details(&self, id: &str, source: &str) -> Option<ProductRecord> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let slot = std::iter::once(&self.primary)
            .chain(self.fallback.as_ref())
            .find(|slot| slot.provider.name() == source);
        let Some(slot) = slot else {
            tracing::warn!(source, "details requested from unknown provider");
            return None;
        };

        slot.calls.fetch_add(1, Ordering::Relaxed);
        match slot.provider.get_details(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(provider = %source, id, error = %e, "details lookup failed");
                None
            }
        }
    }

    /// Request counters plus cache hit accounting and tier occupancy.
    pub async fn stats(&self) -> OrchestratorStats {
        let cache = self.cache.stats().await;
        let provider_calls = std::iter::once(&self.primary)
            .chain(self.fallback.as_ref())
            .map(|slot| {
                (
                    slot.provider.name().to_string(),
                    slot.calls.load(Ordering::Relaxed),
                )
            })
            .collect();
        let lookups = (cache.hits + cache.misses).max(1);

        OrchestratorStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            provider_calls,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_hit_rate: cache.hits as f64 / lookups as f64,
            tiers: cache.tiers,
        }
    }

    /// Remove expired cache entries; returns how many were removed.
    pub async fn sweep_cache(&self) -> usize {
        self.cache.sweep().await
    }

    /// Drop one cached entry, or every entry of `category`.
    pub async fn invalidate(&self, category: &str, identifier: Option<&str>) {
        self.cache.invalidate(category, identifier).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::clock::ManualClock;
    use crate::types::sample_record;

    /// Scripted provider that records the limits it was asked for.
    struct ScriptedProvider {
        name: &'static str,
        results: Result<Vec<ProductRecord>, ()>,
        limits: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn ok(name: &'static str, results: Vec<ProductRecord>) -> Arc<Self> {
            Arc::new(Self {
                name,
                results: Ok(results),
                limits: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                results: Err(()),
                limits: Mutex::new(Vec::new()),
            })
        }

        fn limits(&self) -> Vec<usize> {
            self.limits.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CatalogProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(
            &self,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<ProductRecord>, CatalogError> {
            self.limits.lock().expect("lock").push(limit);
            match &self.results {
                Ok(records) => Ok(records.iter().take(limit).cloned().collect()),
                Err(()) => Err(CatalogError::Transport("connection refused".into())),
            }
        }

        async fn get_details(&self, id: &str) -> Result<Option<ProductRecord>, CatalogError> {
            match &self.results {
                Ok(records) => Ok(records.iter().find(|r| r.id == id).cloned()),
                Err(()) => Err(CatalogError::Transport("connection refused".into())),
            }
        }
    }

    fn memory_cache() -> Arc<TieredCache> {
        Arc::new(TieredCache::from_tiers(
            vec![Box::new(crate::cache::MemoryTier::new(64))],
            CacheConfig::default(),
            Arc::new(ManualClock::default()),
        ))
    }

    #[tokio::test]
    async fn full_primary_skips_fallback() {
        let primary = ScriptedProvider::ok(
            "retail",
            vec![sample_record("A", "retail", 4.0, 1), sample_record("BB", "retail", 4.0, 2)],
        );
        let fallback =
            ScriptedProvider::ok("marketplace", vec![sample_record("C", "walmart", 5.0, 9)]);
        let orchestrator = SourceOrchestrator::new(
            primary.clone(),
            Some(fallback.clone() as Arc<dyn CatalogProvider>),
            memory_cache(),
        );

        let results = orchestrator.search("laptop", 2).await;
        assert_eq!(results.len(), 2);
        assert!(fallback.limits().is_empty());
    }

    #[tokio::test]
    async fn fallback_asked_for_shortfall_only() {
        let primary = ScriptedProvider::ok("retail", vec![sample_record("A", "retail", 4.0, 1)]);
        let fallback = ScriptedProvider::ok(
            "marketplace",
            (0..10).map(|i| sample_record(&format!("F{i}"), "walmart", 3.0, i)).collect(),
        );
        let orchestrator = SourceOrchestrator::new(
            primary,
            Some(fallback.clone() as Arc<dyn CatalogProvider>),
            memory_cache(),
        );

        let results = orchestrator.search("laptop", 5).await;
        assert_eq!(fallback.limits(), vec![4]);
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn failing_primary_is_logged_not_raised() {
        let primary = ScriptedProvider::failing("retail");
        let fallback =
            ScriptedProvider::ok("marketplace", vec![sample_record("C", "walmart", 5.0, 9)]);
        let orchestrator = SourceOrchestrator::new(
            primary,
            Some(fallback as Arc<dyn CatalogProvider>),
            memory_cache(),
        );

        let results = orchestrator.search("laptop", 10).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_id, "walmart");
    }

    #[tokio::test]
    async fn no_fallback_and_failing_primary_is_empty() {
        let orchestrator =
            SourceOrchestrator::new(ScriptedProvider::failing("retail"), None, memory_cache());
        assert!(orchestrator.search("laptop", 10).await.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_returns_nothing_without_calls() {
        let primary = ScriptedProvider::ok("retail", vec![sample_record("A", "retail", 4.0, 1)]);
        let orchestrator = SourceOrchestrator::new(primary.clone(), None, memory_cache());
        assert!(orchestrator.search("laptop", 0).await.is_empty());
        assert!(primary.limits().is_empty());
    }

    #[tokio::test]
    async fn details_route_to_named_provider_only() {
        let primary = ScriptedProvider::ok("retail", vec![sample_record("A", "retail", 4.0, 1)]);
        let fallback =
            ScriptedProvider::ok("marketplace", vec![sample_record("C", "walmart", 5.0, 9)]);
        let orchestrator = SourceOrchestrator::new(
            primary,
            Some(fallback as Arc<dyn CatalogProvider>),
            memory_cache(),
        );

        assert!(orchestrator.get_details("retail-1", "retail").await.is_some());
        // The record exists on the primary, but the fallback was named.
        assert!(orchestrator.get_details("retail-1", "marketplace").await.is_none());
        assert!(orchestrator.get_details("walmart-1", "marketplace").await.is_some());
        assert!(orchestrator.get_details("retail-1", "nowhere").await.is_none());
    }

    #[tokio::test]
    async fn details_failure_becomes_none() {
        let orchestrator =
            SourceOrchestrator::new(ScriptedProvider::failing("retail"), None, memory_cache());
        assert!(orchestrator.get_details("x", "retail").await.is_none());
    }

    #[tokio::test]
    async fn stats_track_calls_and_hit_rate() {
        let primary = ScriptedProvider::ok("retail", vec![sample_record("A", "retail", 4.0, 1)]);
        let fallback = ScriptedProvider::ok("marketplace", vec![]);
        let cache = memory_cache();
        let orchestrator = SourceOrchestrator::new(
            primary,
            Some(fallback as Arc<dyn CatalogProvider>),
            Arc::clone(&cache),
        );

        orchestrator.search("laptop", 3).await;
        orchestrator.search("phone", 3).await;
        cache.set("search_results", "k", serde_json::json!([])).await;
        cache.get("search_results", "k").await;
        cache.get("search_results", "missing").await;

        let stats = orchestrator.stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.provider_calls.get("retail"), Some(&2));
        assert_eq!(stats.provider_calls.get("marketplace"), Some(&2));
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert!((stats.cache_hit_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.tiers.contains_key("memory"));
    }

    #[tokio::test]
    async fn hit_rate_is_zero_without_lookups() {
        let orchestrator =
            SourceOrchestrator::new(ScriptedProvider::failing("retail"), None, memory_cache());
        let stats = orchestrator.stats().await;
        assert_eq!(stats.cache_hit_rate, 0.0);
    }
}
