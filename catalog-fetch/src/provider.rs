//! Trait definition for pluggable catalog providers.
//!
//! Each upstream (a retail catalog API, a marketplace aggregator, ...)
//! implements [`CatalogProvider`] so the orchestrator can treat them
//! uniformly as primary or fallback sources.

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::types::ProductRecord;

/// A source of normalized product records.
///
/// Implementors own their HTTP client, rate limiter and cache handle. Each
/// one handles its own:
///
/// - cache lookups before any network call
/// - rate limiting and the single retry after a throttling response
/// - per-item parsing, skipping items that do not normalize
///
/// All implementations must be `Send + Sync` so they can be shared behind
/// an `Arc` across concurrent requests.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Provider name, used for `get_details` routing and statistics.
    fn name(&self) -> &str;

    /// Search for up to `limit` products matching `query`.
    ///
    /// # Errors
    ///
    /// Implementations degrade transport and parse failures to an empty or
    /// partial result where they can. An `Err` tells the caller that nothing
    /// usable came back; the orchestrator logs it and carries on.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, CatalogError>;

    /// Fetch one product by its provider-scoped id.
    ///
    /// Returns `Ok(None)` when the upstream reports the item does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Transport`] (or `Throttled` after the retry)
    /// when the lookup could not be completed.
    async fn get_details(&self, id: &str) -> Result<Option<ProductRecord>, CatalogError>;
}
