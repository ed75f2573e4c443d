//! Shared HTTP plumbing for provider clients.
//!
//! Builds a [`reqwest::Client`] per provider and maps upstream status codes
//! onto the [`CatalogError`] taxonomy.

use std::time::Duration;

use reqwest::StatusCode;

use crate::config::ProviderConfig;
use crate::error::CatalogError;

/// User-Agent sent when the provider config does not override it.
pub const DEFAULT_USER_AGENT: &str = concat!("catalog-fetch/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] for one provider.
///
/// The client carries the provider's request timeout and User-Agent, and
/// accepts gzip-compressed responses.
///
/// # Errors
///
/// Returns [`CatalogError::Config`] if the client cannot be constructed.
pub fn build_client(config: &ProviderConfig) -> Result<reqwest::Client, CatalogError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| CatalogError::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a non-success status to its error class.
pub fn status_error(status: StatusCode, context: &str) -> CatalogError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => CatalogError::Throttled(format!("{context}: HTTP 429")),
        StatusCode::NOT_FOUND => CatalogError::NotFound(context.to_owned()),
        other => CatalogError::Transport(format!("{context}: HTTP {other}")),
    }
}

/// Send `request` and decode the body as JSON.
///
/// Connect failures and timeouts become [`CatalogError::Transport`]; an
/// undecodable body becomes [`CatalogError::Parse`].
pub async fn fetch_json(
    request: reqwest::RequestBuilder,
    context: &str,
) -> Result<serde_json::Value, CatalogError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            CatalogError::Transport(format!("{context}: request timed out"))
        } else {
            CatalogError::Transport(format!("{context}: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(status_error(status, context));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| CatalogError::Parse(format!("{context}: invalid JSON body: {e}")))
}
