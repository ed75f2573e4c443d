//! Headless catalog host for stdin/stdout JSON communication.
//!
//! Usage: `catalog-host [CONFIG]`. Without an argument the config path is
//! taken from `CATALOG_CONFIG`; without either, built-in defaults are used.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use std::path::PathBuf;

use catalog::host::stdio::run_stdio_bridge;
use catalog::{CatalogConfig, build_handler, read_config};

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "CATALOG_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let config = match &config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            read_config(path)?
        }
        None => CatalogConfig::default(),
    };

    let handler = build_handler(&config)?;
    tracing::info!("catalog-host starting");

    run_stdio_bridge(handler).await.map_err(|e| {
        tracing::error!(error = %e, "catalog-host exited with error");
        anyhow::anyhow!("catalog-host failed: {e}")
    })?;

    tracing::info!("catalog-host shut down cleanly");
    Ok(())
}
