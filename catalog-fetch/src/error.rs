//! Error types for the catalog-fetch crate.
//!
//! All errors use stable string messages suitable for logging. No
//! credentials appear in error messages.

/// Errors that can occur while fetching or caching catalog data.
///
/// Only [`CatalogError::Config`] ever reaches a caller of the orchestrator
/// or the cache. Every other variant is handled where it occurs: logged,
/// retried once (throttling), or mapped to an empty/absent result.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Network failure, timeout, or unexpected upstream status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream explicitly signalled rate limiting (HTTP 429).
    #[error("throttled: {0}")]
    Throttled(String),

    /// The upstream reported that the requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upstream payload or a single item could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A cache storage backend is unreachable or failed an operation.
    #[error("tier unavailable: {0}")]
    TierUnavailable(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Whether a single bounded retry is warranted for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        Self::TierUnavailable(format!("sqlite: {e}"))
    }
}

/// Convenience type alias for catalog-fetch results.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_transport() {
        let err = CatalogError::Transport("connection refused".into());
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn display_throttled() {
        let err = CatalogError::Throttled("HTTP 429".into());
        assert_eq!(err.to_string(), "throttled: HTTP 429");
    }

    #[test]
    fn display_not_found() {
        let err = CatalogError::NotFound("sku 42".into());
        assert_eq!(err.to_string(), "not found: sku 42");
    }

    #[test]
    fn display_parse() {
        let err = CatalogError::Parse("missing products array".into());
        assert_eq!(err.to_string(), "parse error: missing products array");
    }

    #[test]
    fn display_tier_unavailable() {
        let err = CatalogError::TierUnavailable("sqlite: disk I/O error".into());
        assert_eq!(err.to_string(), "tier unavailable: sqlite: disk I/O error");
    }

    #[test]
    fn display_config() {
        let err = CatalogError::Config("max_requests must be > 0".into());
        assert_eq!(err.to_string(), "config error: max_requests must be > 0");
    }

    #[test]
    fn only_throttled_is_retryable() {
        assert!(CatalogError::Throttled("429".into()).is_retryable());
        assert!(!CatalogError::Transport("timeout".into()).is_retryable());
        assert!(!CatalogError::NotFound("x".into()).is_retryable());
        assert!(!CatalogError::Parse("x".into()).is_retryable());
    }

    #[test]
    fn sqlite_error_maps_to_tier_unavailable() {
        let err: CatalogError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, CatalogError::TierUnavailable(_)));
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CatalogError>();
    }
}
