//! Integration tests for the source orchestrator pipeline.
//!
//! These tests exercise the full primary → fallback → dedup → rank →
//! truncate pipeline through the public API using in-process providers
//! (no network calls). A live test against the real retail API is marked
//! `#[ignore]` for manual validation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catalog_fetch::cache::MemoryTier;
use catalog_fetch::orchestrator::dedup::deduplicate;
use catalog_fetch::orchestrator::ranking::rank;
use catalog_fetch::{
    Availability, CacheConfig, CatalogError, CatalogProvider, ManualClock, ProductRecord,
    ProviderConfig, SourceOrchestrator, TieredCache,
};
use chrono::Utc;

fn make_record(title: &str, source: &str, rating: f64, reviews: u64) -> ProductRecord {
    ProductRecord {
        id: format!("{source}:{title}"),
        title: title.to_string(),
        brand: "Acme".into(),
        price: 499.0,
        sale_price: None,
        category: "Laptops".into(),
        description: String::new(),
        rating,
        review_count: reviews,
        availability: Availability::InStock,
        images: vec![],
        specifications: BTreeMap::new(),
        url: format!("https://{source}.example/{title}"),
        source_id: source.to_string(),
        fetched_at: Utc::now(),
    }
}

/// Provider returning a fixed list, or failing every call.
struct FixedProvider {
    name: &'static str,
    records: Option<Vec<ProductRecord>>,
}

impl FixedProvider {
    fn ok(name: &'static str, records: Vec<ProductRecord>) -> Arc<dyn CatalogProvider> {
        Arc::new(Self {
            name,
            records: Some(records),
        })
    }

    fn failing(name: &'static str) -> Arc<dyn CatalogProvider> {
        Arc::new(Self {
            name,
            records: None,
        })
    }
}

#[async_trait]
impl CatalogProvider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<ProductRecord>, CatalogError> {
        match &self.records {
            Some(records) => Ok(records.iter().take(limit).cloned().collect()),
            None => Err(CatalogError::Transport("upstream unreachable".into())),
        }
    }

    async fn get_details(&self, id: &str) -> Result<Option<ProductRecord>, CatalogError> {
        match &self.records {
            Some(records) => Ok(records.iter().find(|r| r.id == id).cloned()),
            None => Err(CatalogError::Transport("upstream unreachable".into())),
        }
    }
}

fn memory_cache() -> Arc<TieredCache> {
    Arc::new(TieredCache::from_tiers(
        vec![Box::new(MemoryTier::new(128))],
        CacheConfig::default(),
        Arc::new(ManualClock::default()),
    ))
}

#[tokio::test]
async fn duplicate_titles_merge_into_primary_record() {
    let primary = FixedProvider::ok("retail", vec![make_record("Acme Pro 15", "retail", 4.0, 10)]);
    let fallback = FixedProvider::ok(
        "marketplace",
        vec![
            make_record("acme pro   15", "walmart", 4.9, 5000),
            make_record("Other Laptop", "walmart", 3.0, 3),
        ],
    );
    let orchestrator = SourceOrchestrator::new(primary, Some(fallback), memory_cache());

    let results = orchestrator.search("acme", 10).await;
    let acme: Vec<_> = results
        .iter()
        .filter(|r| r.title.to_lowercase().starts_with("acme"))
        .collect();
    assert_eq!(acme.len(), 1);
    assert_eq!(acme[0].source_id, "retail");
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn ranking_prefers_review_volume() {
    let primary = FixedProvider::ok(
        "retail",
        vec![make_record("B", "retail", 4.5, 10), make_record("A", "retail", 4.0, 100)],
    );
    let orchestrator = SourceOrchestrator::new(primary, None, memory_cache());

    let results = orchestrator.search("x", 10).await;
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B"]);
}

#[tokio::test]
async fn failing_primary_still_yields_fallback_results() {
    let fallback = FixedProvider::ok(
        "marketplace",
        vec![make_record("Tablet One", "amazon", 4.2, 80)],
    );
    let orchestrator =
        SourceOrchestrator::new(FixedProvider::failing("retail"), Some(fallback), memory_cache());

    let results = orchestrator.search("tablet", 5).await;
    assert!(!results.is_empty());
    assert_eq!(results[0].source_id, "amazon");

    let stats = orchestrator.stats().await;
    assert_eq!(stats.provider_calls.get("retail"), Some(&1));
    assert_eq!(stats.provider_calls.get("marketplace"), Some(&1));
}

#[tokio::test]
async fn result_never_exceeds_limit() {
    let primary = FixedProvider::ok(
        "retail",
        (0..3).map(|i| make_record(&format!("R{i}"), "retail", 4.0, i)).collect(),
    );
    let fallback = FixedProvider::ok(
        "marketplace",
        (0..30).map(|i| make_record(&format!("M{i}"), "target", 5.0, 100 + i)).collect(),
    );
    let orchestrator = SourceOrchestrator::new(primary, Some(fallback), memory_cache());

    for limit in [1, 3, 7, 20] {
        assert!(orchestrator.search("q", limit).await.len() <= limit);
    }
}

#[tokio::test]
async fn details_have_no_cross_provider_fallback() {
    let record = make_record("Speaker", "retail", 4.0, 1);
    let id = record.id.clone();
    let orchestrator = SourceOrchestrator::new(
        FixedProvider::ok("retail", vec![record]),
        Some(FixedProvider::failing("marketplace")),
        memory_cache(),
    );

    assert!(orchestrator.get_details(&id, "retail").await.is_some());
    assert!(orchestrator.get_details(&id, "marketplace").await.is_none());
}

#[test]
fn dedup_then_rank_pipeline() {
    let merged = vec![
        make_record("Phone X", "retail", 4.0, 50),
        make_record("Phone Y", "retail", 3.5, 400),
        make_record("PHONE X", "walmart", 5.0, 10_000),
        make_record("Phone Z", "target", 4.8, 1),
    ];
    let ranked = rank(deduplicate(merged), 2);
    let titles: Vec<&str> = ranked.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Phone Y", "Phone X"]);
    assert_eq!(ranked[1].source_id, "retail");
}

#[test]
fn empty_merge_returns_empty() {
    assert!(rank(deduplicate(Vec::new()), 10).is_empty());
}

// ---------------------------------------------------------------------------
// Live test (requires network and CATALOG_PRIMARY_API_KEY)
// Run with: cargo test -p catalog-fetch --test orchestrator_integration live_ -- --ignored
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn live_retail_search_returns_ranked_results() {
    let Ok(key) = std::env::var("CATALOG_PRIMARY_API_KEY") else {
        eprintln!("CATALOG_PRIMARY_API_KEY not set, skipping");
        return;
    };
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let orchestrator = catalog_fetch::connect(
        ProviderConfig::retail(key),
        None,
        CacheConfig::in_dir(dir.path()),
    )
    .expect("connect");

    let results = tokio::time::timeout(Duration::from_secs(30), orchestrator.search("laptop", 10))
        .await
        .expect("search should finish");
    assert!(results.len() <= 10);
    for pair in results.windows(2) {
        assert!(pair[0].popularity() >= pair[1].popularity());
    }
}
