//! Catalog host: cached, rate-limited product search over a JSON-lines
//! stdio protocol.
//!
//! The fetching, caching and provider merge live in [`catalog_fetch`].
//! This crate adds the hosting layer:
//! - **Config**: a TOML file with per-section defaults and environment
//!   credentials
//! - **Prefetch**: concurrent cache warming for popular queries
//! - **Host**: the command contract, router and stdin/stdout bridge

pub mod config;
pub mod error;
pub mod host;
pub mod prefetch;

use std::sync::Arc;

pub use config::{CatalogConfig, read_config};
pub use error::{HostError, Result};
pub use host::handler::CatalogHandler;

/// Build the orchestrator described by `config` and wrap it in a command
/// handler.
///
/// # Errors
///
/// Returns [`HostError::Config`] when the primary has no credential, or
/// [`HostError::Catalog`] when a provider or cache config is invalid.
pub fn build_handler(config: &CatalogConfig) -> Result<CatalogHandler> {
    let orchestrator = config.build_orchestrator()?;
    Ok(CatalogHandler::new(
        Arc::new(orchestrator),
        config.prefetch.clone(),
    ))
}
