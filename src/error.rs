//! Error types for the catalog host.

use catalog_fetch::CatalogError;

/// Top-level error type for the host layer.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Config file missing, unreadable or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A fetch-layer error that escaped to the host (construction only).
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command payload that does not match its command.
    #[error("invalid payload: {0}")]
    Payload(String),

    /// Response encoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stdio protocol channel failure.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HostError>;
