//! Command handler backed by a [`SourceOrchestrator`].

use std::sync::Arc;

use catalog_fetch::SourceOrchestrator;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::PrefetchSection;
use crate::error::{HostError, Result};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};
use crate::prefetch;

/// Results returned by `search` when the payload gives no limit.
const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchPayload {
    query: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Debug, Deserialize)]
struct DetailsPayload {
    id: String,
    #[serde(default = "default_details_source")]
    source: String,
}

fn default_details_source() -> String {
    "retail".to_owned()
}

#[derive(Debug, Deserialize)]
struct InvalidatePayload {
    category: String,
    #[serde(default)]
    identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PrefetchPayload {
    #[serde(default)]
    queries: Option<Vec<String>>,
    #[serde(default)]
    limit: Option<usize>,
    /// Invalidate cached search results before warming.
    #[serde(default)]
    refresh: bool,
}

/// Routes host commands to the orchestrator.
pub struct CatalogHandler {
    orchestrator: Arc<SourceOrchestrator>,
    prefetch: PrefetchSection,
}

impl CatalogHandler {
    pub fn new(orchestrator: Arc<SourceOrchestrator>, prefetch: PrefetchSection) -> Self {
        Self {
            orchestrator,
            prefetch,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SourceOrchestrator> {
        &self.orchestrator
    }

    /// Route a command envelope to the matching handler.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Payload`] when the payload does not fit the
    /// command. Provider and cache failures never surface here.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let payload = match envelope.command {
            CommandName::Search => self.handle_search(envelope).await?,
            CommandName::Details => self.handle_details(envelope).await?,
            CommandName::Stats => serde_json::to_value(self.orchestrator.stats().await)?,
            CommandName::Sweep => {
                let removed = self.orchestrator.sweep_cache().await;
                serde_json::json!({ "removed": removed })
            }
            CommandName::Invalidate => self.handle_invalidate(envelope).await?,
            CommandName::Prefetch => self.handle_prefetch(envelope).await?,
            CommandName::Stop => serde_json::json!({ "stopping": true }),
        };
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), payload))
    }

    async fn handle_search(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let payload: SearchPayload = parse_payload(envelope)?;
        if payload.query.trim().is_empty() {
            return Err(HostError::Payload("search: query cannot be empty".into()));
        }
        let results = self.orchestrator.search(&payload.query, payload.limit).await;
        Ok(serde_json::json!({
            "count": results.len(),
            "results": serde_json::to_value(&results)?,
        }))
    }

    async fn handle_details(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let payload: DetailsPayload = parse_payload(envelope)?;
        let product = self
            .orchestrator
            .get_details(&payload.id, &payload.source)
            .await;
        Ok(serde_json::json!({
            "found": product.is_some(),
            "product": serde_json::to_value(&product)?,
        }))
    }

    async fn handle_invalidate(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let payload: InvalidatePayload = parse_payload(envelope)?;
        self.orchestrator
            .invalidate(&payload.category, payload.identifier.as_deref())
            .await;
        Ok(serde_json::json!({
            "category": payload.category,
            "identifier": payload.identifier,
        }))
    }

    async fn handle_prefetch(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let payload: PrefetchPayload = if envelope.payload.is_null() {
            PrefetchPayload::default()
        } else {
            parse_payload(envelope)?
        };
        let queries = payload
            .queries
            .unwrap_or_else(|| self.prefetch.queries.clone());
        let limit = payload.limit.unwrap_or(self.prefetch.limit);

        let summary = if payload.refresh {
            prefetch::refresh(&self.orchestrator, queries.as_slice(), limit).await
        } else {
            prefetch::prefetch(&self.orchestrator, queries.as_slice(), limit).await
        };
        Ok(serde_json::json!({ "summary": summary }))
    }
}

fn parse_payload<T: DeserializeOwned>(envelope: &CommandEnvelope) -> Result<T> {
    serde_json::from_value(envelope.payload.clone())
        .map_err(|e| HostError::Payload(format!("{}: {e}", envelope.command.as_str())))
}
