//! Lazily connected chain client handle
//!
//! The client is created on first use and shared by every later request.
//! Concurrent first calls wait on the same initialization; a failed attempt
//! is not cached, so the next call connects again.

use super::client::Connector;
use crate::error::PipelineResult;

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Shared, lazily created client for one chain
pub struct ChainProvider<C: ?Sized> {
    /// Chain name used in logs and metrics
    name: String,
    /// Endpoint handed to the connector
    url: String,
    connector: Arc<dyn Connector<C>>,
    client: OnceCell<Arc<C>>,
}

impl<C: ?Sized + Send + Sync> ChainProvider<C> {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        connector: Arc<dyn Connector<C>>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            connector,
            client: OnceCell::new(),
        }
    }

    /// Get the client, connecting on first use
    pub async fn client(&self) -> PipelineResult<Arc<C>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                debug!("Connecting chain {} at {}", self.name, self.url);
                match self.connector.connect(&self.url).await {
                    Ok(client) => {
                        info!("Chain {} connected", self.name);
                        crate::metrics::record_chain_connected(&self.name, true);
                        Ok(client)
                    }
                    Err(e) => {
                        warn!("Failed to connect chain {}: {}", self.name, e);
                        crate::metrics::record_chain_connected(&self.name, false);
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(client.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
