//! Concrete catalog providers.
//!
//! - [`RetailProvider`]: a single retail catalog API (primary source).
//! - [`MarketplaceProvider`]: several marketplace sub-endpoints queried as
//!   one fallback source.
//!
//! Both share [`Upstream`]: the HTTP client, the provider's rate limiter,
//! the cache handle and the retry-once policy for throttling responses.

pub mod marketplace;
pub mod retail;

pub use marketplace::MarketplaceProvider;
pub use retail::RetailProvider;

use std::sync::Arc;

use serde_json::Value;

use crate::cache::TieredCache;
use crate::config::ProviderConfig;
use crate::error::CatalogError;
use crate::http::{build_client, fetch_json};
use crate::rate_limit::RateLimiter;

/// Per-provider network state.
pub(crate) struct Upstream {
    pub(crate) config: ProviderConfig,
    pub(crate) client: reqwest::Client,
    pub(crate) limiter: RateLimiter,
    pub(crate) cache: Arc<TieredCache>,
}

impl Upstream {
    pub(crate) fn new(
        config: ProviderConfig,
        cache: Arc<TieredCache>,
    ) -> Result<Self, CatalogError> {
        config.validate()?;
        let client = build_client(&config)?;
        let limiter = RateLimiter::new(config.rate_limit.clone());
        Ok(Self {
            config,
            client,
            limiter,
            cache,
        })
    }

    /// Rate-limited GET returning the decoded JSON body.
    ///
    /// `build` is called once per attempt. A throttling response is retried
    /// exactly once after `throttle_retry_delay`; a second throttling
    /// response is returned as [`CatalogError::Throttled`].
    pub(crate) async fn fetch<F>(&self, build: F, context: &str) -> Result<Value, CatalogError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut retried = false;
        loop {
            self.limiter.acquire().await;
            match fetch_json(build(), context).await {
                Err(e) if e.is_retryable() && !retried => {
                    tracing::warn!(
                        provider = %self.config.name,
                        delay_ms = self.config.throttle_retry_delay.as_millis() as u64,
                        "upstream throttled, retrying once"
                    );
                    tokio::time::sleep(self.config.throttle_retry_delay).await;
                    retried = true;
                }
                other => return other,
            }
        }
    }
}

/// Lower-case, trim and collapse internal whitespace so equivalent queries
/// share a cache entry.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First present, non-null field among `names`.
pub(crate) fn field<'a>(item: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| item.get(*name).filter(|v| !v.is_null()))
}

/// String field, accepting numbers as well (ids are often numeric).
pub(crate) fn string_field(item: &Value, names: &[&str]) -> Option<String> {
    match field(item, names)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric field, accepting numeric strings. Absent means `Ok(None)`;
/// present but not a number is a parse error.
pub(crate) fn number_field(item: &Value, names: &[&str]) -> Result<Option<f64>, CatalogError> {
    let Some(value) = field(item, names) else {
        return Ok(None);
    };
    match value {
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| CatalogError::Parse(format!("{} is not a number: {s:?}", names[0]))),
        other => Err(CatalogError::Parse(format!(
            "{} is not a number: {other}",
            names[0]
        ))),
    }
}

/// Image URLs from either an array field or a single-string field.
pub(crate) fn image_list(item: &Value, array_names: &[&str], single_names: &[&str]) -> Vec<String> {
    if let Some(Value::Array(images)) = field(item, array_names) {
        return images
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .filter(|s| !s.is_empty())
            .collect();
    }
    string_field(item, single_names)
        .filter(|s| !s.is_empty())
        .into_iter()
        .collect()
}
