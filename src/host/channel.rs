//! Request channel between the stdio reader and the command handler.

use tokio::sync::{mpsc, oneshot};

use crate::error::{HostError, Result};
use crate::host::contract::{CommandEnvelope, ResponseEnvelope};
use crate::host::handler::CatalogHandler;

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<ResponseEnvelope>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
}

impl HostCommandClient {
    /// Validate `envelope`, hand it to the server and wait for the response.
    ///
    /// An invalid envelope is answered locally with an error response.
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        if let Err(e) = envelope.validate() {
            return Ok(ResponseEnvelope::error(envelope.request_id, e.to_string()));
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| HostError::Channel(format!("failed to send host command request: {e}")))?;

        response_rx
            .await
            .map_err(|e| HostError::Channel(format!("host command response dropped: {e}")))
    }
}

pub struct HostCommandServer {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    handler: CatalogHandler,
}

#[must_use]
pub fn command_channel(
    request_capacity: usize,
    handler: CatalogHandler,
) -> (HostCommandClient, HostCommandServer) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    (
        HostCommandClient { request_tx },
        HostCommandServer {
            request_rx,
            handler,
        },
    )
}

impl HostCommandServer {
    /// Serve requests until every client is dropped.
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let request_id = request.envelope.request_id.clone();
            let response = match self.handler.route(&request.envelope).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        request_id = %request_id,
                        command = request.envelope.command.as_str(),
                        error = %e,
                        "host command failed"
                    );
                    ResponseEnvelope::error(request_id, e.to_string())
                }
            };
            let _ = request.response_tx.send(response);
        }
        tracing::debug!("host command channel closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use catalog_fetch::cache::MemoryTier;
    use catalog_fetch::{
        CacheConfig, ManualClock, ProviderConfig, RetailProvider, SourceOrchestrator, TieredCache,
    };
    use serde_json::json;

    use super::*;
    use crate::config::PrefetchSection;
    use crate::host::contract::CommandName;

    fn offline_handler() -> CatalogHandler {
        let cache = Arc::new(TieredCache::from_tiers(
            vec![Box::new(MemoryTier::new(8))],
            CacheConfig::default(),
            Arc::new(ManualClock::default()),
        ));
        // Nothing listens on port 9; every fetch fails fast and degrades.
        let config = ProviderConfig::retail("k").with_base_url("http://127.0.0.1:9");
        let provider = RetailProvider::new(config, Arc::clone(&cache)).expect("provider");
        let orchestrator = SourceOrchestrator::new(Arc::new(provider), None, cache);
        CatalogHandler::new(Arc::new(orchestrator), PrefetchSection::default())
    }

    #[tokio::test]
    async fn client_receives_handler_response() {
        let (client, server) = command_channel(4, offline_handler());
        let server = tokio::spawn(server.run());

        let resp = client
            .send(CommandEnvelope::new("r1", CommandName::Sweep, json!(null)))
            .await
            .expect("send");
        assert!(resp.ok);
        assert_eq!(resp.request_id, "r1");

        drop(client);
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn handler_error_becomes_error_response() {
        let (client, server) = command_channel(4, offline_handler());
        tokio::spawn(server.run());

        let resp = client
            .send(CommandEnvelope::new("r2", CommandName::Invalidate, json!({})))
            .await
            .expect("send");
        assert!(!resp.ok);
        assert_eq!(resp.request_id, "r2");
        assert!(resp.error.unwrap_or_default().contains("invalidate"));
    }

    #[tokio::test]
    async fn invalid_envelope_answered_without_server() {
        let (client, _server) = command_channel(1, offline_handler());
        let resp = client
            .send(CommandEnvelope::new("", CommandName::Stats, json!(null)))
            .await
            .expect("send");
        assert!(!resp.ok);
        assert!(resp.error.unwrap_or_default().contains("request_id"));
    }

    #[tokio::test]
    async fn dropped_server_is_channel_error() {
        let (client, server) = command_channel(1, offline_handler());
        drop(server);
        let err = client
            .send(CommandEnvelope::new("r3", CommandName::Stats, json!(null)))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Channel(_)));
    }
}
