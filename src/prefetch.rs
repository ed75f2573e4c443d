//! Cache warming for popular queries.

use std::collections::BTreeMap;

use catalog_fetch::SourceOrchestrator;
use catalog_fetch::types::SEARCH_RESULTS;
use futures_util::future::join_all;

/// Queries warmed when the config does not name any.
pub const DEFAULT_POPULAR_QUERIES: &[&str] = &[
    "laptop",
    "phone",
    "headphones",
    "tablet",
    "smartwatch",
    "gaming",
    "camera",
    "speaker",
    "tv",
    "fitness tracker",
];

/// Run a search for every query concurrently so the results land in cache.
///
/// Returns the number of records each query produced. Duplicate queries
/// are searched once.
pub async fn prefetch<S: AsRef<str>>(
    orchestrator: &SourceOrchestrator,
    queries: &[S],
    limit: usize,
) -> BTreeMap<String, usize> {
    let mut unique: Vec<&str> = queries.iter().map(|q| q.as_ref()).collect();
    unique.sort_unstable();
    unique.dedup();

    let searches = unique.into_iter().map(|query| async move {
        let count = orchestrator.search(query, limit).await.len();
        tracing::info!(query, count, "prefetched");
        (query.to_string(), count)
    });
    let summary: BTreeMap<String, usize> = join_all(searches).await.into_iter().collect();

    tracing::info!(
        queries = summary.len(),
        records = summary.values().sum::<usize>(),
        "prefetch complete"
    );
    summary
}

/// Drop every cached search result, then prefetch again.
pub async fn refresh<S: AsRef<str>>(
    orchestrator: &SourceOrchestrator,
    queries: &[S],
    limit: usize,
) -> BTreeMap<String, usize> {
    orchestrator.invalidate(SEARCH_RESULTS, None).await;
    prefetch(orchestrator, queries, limit).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use catalog_fetch::cache::MemoryTier;
    use catalog_fetch::{
        Availability, CacheConfig, CatalogError, CatalogProvider, ManualClock, ProductRecord,
        TieredCache,
    };

    use super::*;

    /// Provider that caches its answer like the real ones and counts
    /// upstream calls.
    struct CountingProvider {
        cache: Arc<TieredCache>,
        upstream: AtomicUsize,
    }

    #[async_trait]
    impl CatalogProvider for CountingProvider {
        fn name(&self) -> &str {
            "retail"
        }

        async fn search(
            &self,
            query: &str,
            limit: usize,
        ) -> Result<Vec<ProductRecord>, CatalogError> {
            if let Some(hit) = self
                .cache
                .get_json::<Vec<ProductRecord>>(SEARCH_RESULTS, query)
                .await
            {
                return Ok(hit);
            }
            self.upstream.fetch_add(1, Ordering::SeqCst);
            let records: Vec<ProductRecord> = (0..limit.min(2))
                .map(|i| record(&format!("{query} {i}")))
                .collect();
            self.cache.set_json(SEARCH_RESULTS, query, &records).await;
            Ok(records)
        }

        async fn get_details(&self, _id: &str) -> Result<Option<ProductRecord>, CatalogError> {
            Ok(None)
        }
    }

    fn record(title: &str) -> ProductRecord {
        ProductRecord {
            id: title.to_string(),
            title: title.to_string(),
            brand: String::new(),
            price: 1.0,
            sale_price: None,
            category: String::new(),
            description: String::new(),
            rating: 4.0,
            review_count: 1,
            availability: Availability::InStock,
            images: vec![],
            specifications: Default::default(),
            url: String::new(),
            source_id: "retail".into(),
            fetched_at: chrono::Utc::now(),
        }
    }

    fn setup() -> (Arc<CountingProvider>, SourceOrchestrator) {
        let cache = Arc::new(TieredCache::from_tiers(
            vec![Box::new(MemoryTier::new(64))],
            CacheConfig::default(),
            Arc::new(ManualClock::default()),
        ));
        let provider = Arc::new(CountingProvider {
            cache: Arc::clone(&cache),
            upstream: AtomicUsize::new(0),
        });
        let orchestrator =
            SourceOrchestrator::new(provider.clone() as Arc<dyn CatalogProvider>, None, cache);
        (provider, orchestrator)
    }

    #[tokio::test]
    async fn prefetch_reports_counts_per_query() {
        let (provider, orchestrator) = setup();
        let summary = prefetch(&orchestrator, &["laptop", "phone", "laptop"], 5).await;
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.get("laptop"), Some(&2));
        assert_eq!(provider.upstream.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn prefetched_queries_are_served_from_cache() {
        let (provider, orchestrator) = setup();
        prefetch(&orchestrator, DEFAULT_POPULAR_QUERIES, 5).await;
        let before = provider.upstream.load(Ordering::SeqCst);
        assert_eq!(before, DEFAULT_POPULAR_QUERIES.len());

        orchestrator.search("camera", 5).await;
        assert_eq!(provider.upstream.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn refresh_goes_back_upstream() {
        let (provider, orchestrator) = setup();
        prefetch(&orchestrator, &["tv"], 5).await;
        refresh(&orchestrator, &["tv"], 5).await;
        assert_eq!(provider.upstream.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_query_list_is_a_no_op() {
        let (provider, orchestrator) = setup();
        let summary = prefetch::<&str>(&orchestrator, &[], 5).await;
        assert!(summary.is_empty());
        assert_eq!(provider.upstream.load(Ordering::SeqCst), 0);
    }
}
