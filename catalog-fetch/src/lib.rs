//! # catalog-fetch
//!
//! Rate-limited product catalog fetching with a three-tier cache and a
//! primary/fallback provider merge.
//!
//! ## Design
//!
//! - Each provider owns a sliding-window [`RateLimiter`] with a burst allowance
//! - Every fetch goes through a [`TieredCache`]: in-process memory, SQLite,
//!   then JSON files, with read-through promotion and write-through replication
//! - A throttling response (HTTP 429) is retried exactly once after a fixed delay
//! - The [`SourceOrchestrator`] tops up a short primary result from the
//!   fallback, deduplicates by normalized title and ranks by popularity
//! - Graceful degradation: a failing provider or cache tier is logged and
//!   skipped, never surfaced to the caller
//!
//! ## Security
//!
//! - API credentials are never logged and are redacted from `Debug` output
//! - Search queries are logged only at trace level

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod rate_limit;
pub mod types;

pub use cache::{CacheStats, TieredCache, cache_key};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, ProviderConfig, ProviderDescriptor, RateLimitConfig};
pub use error::{CatalogError, Result};
pub use orchestrator::{OrchestratorStats, SourceOrchestrator};
pub use provider::CatalogProvider;
pub use providers::{MarketplaceProvider, RetailProvider};
pub use rate_limit::{Admission, RateLimiter};
pub use types::{Availability, ProductRecord};

/// Build an orchestrator over a retail primary and optional marketplace
/// fallback, sharing one cache.
///
/// # Errors
///
/// Returns [`CatalogError::Config`] if any of the configs fails validation.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> catalog_fetch::Result<()> {
/// use catalog_fetch::{CacheConfig, ProviderConfig};
///
/// let orchestrator = catalog_fetch::connect(
///     ProviderConfig::retail("retail-key"),
///     Some(ProviderConfig::marketplace("marketplace-key")),
///     CacheConfig::default(),
/// )?;
/// for product in orchestrator.search("laptop", 10).await {
///     println!("{product}");
/// }
/// # Ok(())
/// # }
/// ```
pub fn connect(
    primary: ProviderConfig,
    fallback: Option<ProviderConfig>,
    cache: CacheConfig,
) -> Result<SourceOrchestrator> {
    SourceOrchestrator::from_config(primary, fallback, cache)
}
