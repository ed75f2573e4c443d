//! Fetch and cache configuration with sensible defaults.
//!
//! [`ProviderConfig`] describes one upstream (its endpoints, credential,
//! rate limit and timeouts); [`CacheConfig`] controls which cache tiers are
//! opened and how long each category lives. All structs implement
//! [`Default`] and a `validate()` that rejects unusable values.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::CatalogError;
use crate::types::{
    CATEGORY_DATA, PRODUCT_DETAILS, PRODUCT_REVIEWS, SEARCH_RESULTS, TRENDING_PRODUCTS,
};

/// TTL applied to categories missing from the TTL table.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Longest lifetime any entry is given, whatever the configured TTL.
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// Steady-state throttle for one upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted without waiting inside one `time_window`.
    pub max_requests: usize,
    /// Trailing window length. `Duration::ZERO` disables throttling.
    pub time_window: Duration,
    /// Extra waited admissions allowed per 60 s burst period.
    pub burst_capacity: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            time_window: Duration::from_secs(1),
            burst_capacity: 10,
        }
    }
}

impl RateLimitConfig {
    /// `n` requests per second with the default burst capacity.
    pub fn per_second(n: usize) -> Self {
        Self {
            max_requests: n,
            ..Default::default()
        }
    }

    /// A configuration that never suspends.
    pub fn unlimited() -> Self {
        Self {
            time_window: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.max_requests == 0 && !self.time_window.is_zero() {
            return Err(CatalogError::Config(
                "max_requests must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Static description of one upstream endpoint.
///
/// The credential is never printed by the `Debug` impl.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Short name, used in cache identifiers and as the record `source_id`.
    pub name: String,
    /// Scheme + host (+ optional path prefix), e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Path appended to `base_url` for search requests.
    pub search_path: String,
    /// Path prefix for single-item lookups (`{base}{details_path}/{id}`).
    /// `None` means this endpoint cannot serve details.
    pub details_path: Option<String>,
    /// API key sent with every request.
    pub credential: String,
}

impl ProviderDescriptor {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        search_path: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            search_path: search_path.into(),
            details_path: None,
            credential: credential.into(),
        }
    }

    /// Enable single-item lookups under `path`.
    pub fn with_details_path(mut self, path: impl Into<String>) -> Self {
        self.details_path = Some(path.into());
        self
    }

    /// Full search URL.
    pub fn search_url(&self) -> String {
        join_url(&self.base_url, &self.search_path)
    }

    /// Full details URL for `id`, if this endpoint serves details.
    ///
    /// `id` becomes exactly one percent-encoded path segment. Ids that
    /// cannot name a segment (empty, `.` or `..`) yield `None`.
    pub fn details_url(&self, id: &str) -> Option<String> {
        let path = self.details_path.as_ref()?;
        if matches!(id, "" | "." | "..") {
            return None;
        }
        let mut url = Url::parse(&join_url(&self.base_url, path)).ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().push(id);
        Some(url.into())
    }

    /// Host component of the base URL, or an empty string if unparseable.
    pub fn host(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::Config("endpoint name must not be empty".into()));
        }
        Url::parse(&self.base_url).map_err(|e| {
            CatalogError::Config(format!(
                "endpoint '{}' has invalid base_url: {e}",
                self.name
            ))
        })?;
        Ok(())
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("search_path", &self.search_path)
            .field("details_path", &self.details_path)
            .field("credential", &"<redacted>")
            .finish()
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Configuration for one provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider name used for routing `get_details` and for statistics.
    pub name: String,
    /// Upstream endpoints. Single-endpoint providers use the first one.
    pub endpoints: Vec<ProviderDescriptor>,
    pub rate_limit: RateLimitConfig,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Fixed delay before the single retry after a throttling response.
    pub throttle_retry_delay: Duration,
    /// Custom User-Agent. If `None`, `catalog-fetch/<version>` is sent.
    pub user_agent: Option<String>,
}

impl ProviderConfig {
    /// Retail catalog API (primary): 4 requests/second.
    pub fn retail(credential: impl Into<String>) -> Self {
        Self {
            name: "retail".into(),
            endpoints: vec![ProviderDescriptor::new(
                "retail",
                "https://api.bestbuy.com/v1",
                "/products",
                credential,
            )
            .with_details_path("/products")],
            rate_limit: RateLimitConfig::per_second(4),
            timeout_seconds: 10,
            throttle_retry_delay: Duration::from_secs(2),
            user_agent: None,
        }
    }

    /// Marketplace aggregator (fallback): three sub-endpoints, 10 requests/second.
    pub fn marketplace(credential: impl Into<String>) -> Self {
        let credential = credential.into();
        let endpoint = |name: &str, host: &str, path: &str| {
            ProviderDescriptor::new(name, format!("https://{host}"), path, credential.clone())
        };
        Self {
            name: "marketplace".into(),
            endpoints: vec![
                endpoint("walmart", "walmart-api-by-speedapi.p.rapidapi.com", "/products/search"),
                endpoint("amazon", "amazon-api-by-speedapi.p.rapidapi.com", "/search"),
                endpoint("target", "target-api-by-speedapi.p.rapidapi.com", "/search"),
            ],
            rate_limit: RateLimitConfig::per_second(10),
            timeout_seconds: 10,
            throttle_retry_delay: Duration::from_secs(2),
            user_agent: None,
        }
    }

    /// Point every endpoint at `base_url` (keeps paths). Used for testing
    /// against a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        for endpoint in &mut self.endpoints {
            endpoint.base_url = base_url.clone();
        }
        self
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::Config("provider name must not be empty".into()));
        }
        if self.endpoints.is_empty() {
            return Err(CatalogError::Config(format!(
                "provider '{}' needs at least one endpoint",
                self.name
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(CatalogError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        for endpoint in &self.endpoints {
            endpoint.validate()?;
        }
        self.rate_limit.validate()
    }
}

/// Which cache tiers to open and how long entries live.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Open the in-process volatile tier.
    pub memory_enabled: bool,
    /// Maximum entries held by the volatile tier.
    pub memory_capacity: u64,
    /// SQLite database file for the structured tier. `None` disables it.
    pub sqlite_path: Option<PathBuf>,
    /// Directory for the durable JSON file tier. `None` disables it.
    pub file_dir: Option<PathBuf>,
    /// TTL for categories not present in `ttl_table`.
    pub default_ttl: Duration,
    /// Per-category TTL.
    pub ttl_table: HashMap<String, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_capacity: 10_000,
            sqlite_path: Some(PathBuf::from("cache.db")),
            file_dir: Some(PathBuf::from("file_cache")),
            default_ttl: DEFAULT_TTL,
            ttl_table: default_ttl_table(),
        }
    }
}

impl CacheConfig {
    /// All three tiers rooted under `dir` (`dir/cache.db`, `dir/file_cache/`).
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            sqlite_path: Some(dir.join("cache.db")),
            file_dir: Some(dir.join("file_cache")),
            ..Default::default()
        }
    }

    /// TTL for `category`, falling back to `default_ttl`.
    pub fn ttl_for(&self, category: &str) -> Duration {
        self.ttl_table
            .get(category)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.memory_enabled && self.memory_capacity == 0 {
            return Err(CatalogError::Config(
                "memory_capacity must be greater than 0 when the memory tier is enabled".into(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CatalogError::Config("default_ttl must be greater than 0".into()));
        }
        if self.default_ttl > MAX_TTL {
            return Err(CatalogError::Config(format!(
                "default_ttl must be at most {}s",
                MAX_TTL.as_secs()
            )));
        }
        if let Some((category, _)) = self.ttl_table.iter().find(|(_, ttl)| ttl.is_zero()) {
            return Err(CatalogError::Config(format!(
                "ttl for category '{category}' must be greater than 0"
            )));
        }
        if let Some((category, _)) = self.ttl_table.iter().find(|(_, ttl)| **ttl > MAX_TTL) {
            return Err(CatalogError::Config(format!(
                "ttl for category '{category}' must be at most {}s",
                MAX_TTL.as_secs()
            )));
        }
        Ok(())
    }
}

/// The built-in category → TTL table.
pub fn default_ttl_table() -> HashMap<String, Duration> {
    [
        (PRODUCT_DETAILS, 3600),
        (SEARCH_RESULTS, 1800),
        (CATEGORY_DATA, 7200),
        (PRODUCT_REVIEWS, 14400),
        (TRENDING_PRODUCTS, 900),
    ]
    .into_iter()
    .map(|(category, secs)| (category.to_string(), Duration::from_secs(secs)))
    .collect()
}
