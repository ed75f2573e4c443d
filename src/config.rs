//! Host configuration loaded from a TOML file.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration. Provider credentials may be left out of the file and
//! supplied through [`PRIMARY_KEY_ENV`] / [`FALLBACK_KEY_ENV`] instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use catalog_fetch::config::default_ttl_table;
use catalog_fetch::{CacheConfig, ProviderConfig, SourceOrchestrator};
use serde::{Deserialize, Serialize};

use crate::error::{HostError, Result};
use crate::prefetch::DEFAULT_POPULAR_QUERIES;

/// Environment variable holding the primary provider's API key.
pub const PRIMARY_KEY_ENV: &str = "CATALOG_PRIMARY_API_KEY";
/// Environment variable holding the fallback provider's API key.
pub const FALLBACK_KEY_ENV: &str = "CATALOG_FALLBACK_API_KEY";

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Cache tier locations and TTLs.
    pub cache: CacheSection,
    /// Retail catalog API (primary source).
    pub primary: ProviderSection,
    /// Marketplace aggregator (fallback source).
    pub fallback: ProviderSection,
    /// Cache warming.
    pub prefetch: PrefetchSection,
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Directory holding `cache.db` and `file_cache/`.
    pub dir: PathBuf,
    pub memory_enabled: bool,
    pub memory_capacity: u64,
    /// Open the SQLite tier.
    pub sqlite_enabled: bool,
    /// Open the JSON file tier.
    pub files_enabled: bool,
    /// TTL for categories without an entry in `ttl_secs`.
    pub default_ttl_secs: u64,
    /// Per-category TTL overrides, merged over the built-in table.
    pub ttl_secs: BTreeMap<String, u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("catalog_cache"),
            memory_enabled: true,
            memory_capacity: 10_000,
            sqlite_enabled: true,
            files_enabled: true,
            default_ttl_secs: 3600,
            ttl_secs: BTreeMap::new(),
        }
    }
}

/// Overrides applied on top of a provider preset. Unset fields keep the
/// preset's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub enabled: bool,
    /// API key. Falls back to the provider's environment variable.
    pub api_key: Option<String>,
    /// Replace the base URL of every endpoint (testing, proxies).
    pub base_url: Option<String>,
    pub requests_per_second: Option<usize>,
    pub burst_capacity: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub throttle_retry_delay_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            requests_per_second: None,
            burst_capacity: None,
            timeout_seconds: None,
            throttle_retry_delay_ms: None,
            user_agent: None,
        }
    }
}

impl ProviderSection {
    fn credential(&self, env_key: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| lookup(env_key))
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    fn apply(&self, mut config: ProviderConfig) -> ProviderConfig {
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(n) = self.requests_per_second {
            config.rate_limit.max_requests = n;
        }
        if let Some(burst) = self.burst_capacity {
            config.rate_limit.burst_capacity = burst;
        }
        if let Some(secs) = self.timeout_seconds {
            config.timeout_seconds = secs;
        }
        if let Some(ms) = self.throttle_retry_delay_ms {
            config.throttle_retry_delay = Duration::from_millis(ms);
        }
        if let Some(ua) = &self.user_agent {
            config.user_agent = Some(ua.clone());
        }
        config
    }
}

/// Cache warming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchSection {
    pub queries: Vec<String>,
    /// Results requested per query.
    pub limit: usize,
}

impl Default for PrefetchSection {
    fn default() -> Self {
        Self {
            queries: DEFAULT_POPULAR_QUERIES.iter().map(|q| (*q).to_string()).collect(),
            limit: 20,
        }
    }
}

/// Read and parse a config file.
///
/// # Errors
/// Returns [`HostError::Config`] if the file cannot be read or parsed.
pub fn read_config(path: &Path) -> Result<CatalogConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        HostError::Config(format!("failed to read config file '{}': {e}", path.display()))
    })?;
    toml::from_str(&contents).map_err(|e| {
        HostError::Config(format!("failed to parse config file '{}': {e}", path.display()))
    })
}

impl CatalogConfig {
    /// Cache configuration for the fetch layer.
    pub fn cache_config(&self) -> CacheConfig {
        let section = &self.cache;
        let mut ttl_table = default_ttl_table();
        for (category, secs) in &section.ttl_secs {
            ttl_table.insert(category.clone(), Duration::from_secs(*secs));
        }
        CacheConfig {
            memory_enabled: section.memory_enabled,
            memory_capacity: section.memory_capacity,
            sqlite_path: section
                .sqlite_enabled
                .then(|| section.dir.join("cache.db")),
            file_dir: section
                .files_enabled
                .then(|| section.dir.join("file_cache")),
            default_ttl: Duration::from_secs(section.default_ttl_secs),
            ttl_table,
        }
    }

    /// Primary provider config.
    ///
    /// # Errors
    /// Returns [`HostError::Config`] if the primary is disabled or has no
    /// credential.
    pub fn primary_config(
        &self,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<ProviderConfig> {
        if !self.primary.enabled {
            return Err(HostError::Config("the primary provider cannot be disabled".into()));
        }
        let key = self.primary.credential(PRIMARY_KEY_ENV, lookup).ok_or_else(|| {
            HostError::Config(format!(
                "no API key for the primary provider; set primary.api_key or {PRIMARY_KEY_ENV}"
            ))
        })?;
        Ok(self.primary.apply(ProviderConfig::retail(key)))
    }

    /// Fallback provider config, or `None` when disabled or without a
    /// credential.
    pub fn fallback_config(
        &self,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Option<ProviderConfig> {
        if !self.fallback.enabled {
            return None;
        }
        let Some(key) = self.fallback.credential(FALLBACK_KEY_ENV, lookup) else {
            tracing::info!("no fallback API key configured; running primary only");
            return None;
        };
        Some(self.fallback.apply(ProviderConfig::marketplace(key)))
    }

    /// Build the orchestrator, reading credentials from the process
    /// environment when the file omits them.
    ///
    /// # Errors
    /// Returns [`HostError::Config`] or [`HostError::Catalog`] if the
    /// configuration is unusable.
    pub fn build_orchestrator(&self) -> Result<SourceOrchestrator> {
        self.build_orchestrator_with(&|name| std::env::var(name).ok())
    }

    /// [`build_orchestrator`](Self::build_orchestrator) with an explicit
    /// environment lookup.
    pub fn build_orchestrator_with(
        &self,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<SourceOrchestrator> {
        let primary = self.primary_config(lookup)?;
        let fallback = self.fallback_config(lookup);
        Ok(SourceOrchestrator::from_config(
            primary,
            fallback,
            self.cache_config(),
        )?)
    }
}
