use std::sync::Arc;

use contract_class_common::{Error, Result};
use contract_class_core::ChainClient;
use ethers::providers::{Http, Provider, Ws};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::EthersClient;

/// Ethereum provider types
#[derive(Debug, Clone)]
pub enum EthereumProvider {
    /// HTTP provider
    Http(Arc<Provider<Http>>),

    /// WebSocket provider
    Websocket(Arc<Provider<Ws>>),
}

/// Configuration for the Ethereum provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EthereumProviderConfig {
    /// RPC URL
    pub rpc_url: String,

    /// Whether to use WebSocket
    pub use_websocket: bool,

    /// Confirmations awaited before a submission reports its receipt
    pub confirmations: usize,
}

impl Default for EthereumProviderConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            use_websocket: false,
            confirmations: 1,
        }
    }
}

impl EthereumProviderConfig {
    /// Config for `rpc_url`; `ws://` and `wss://` URLs select the WebSocket transport
    pub fn for_url(rpc_url: impl Into<String>) -> Self {
        let rpc_url = rpc_url.into();
        let use_websocket = rpc_url.starts_with("ws://") || rpc_url.starts_with("wss://");
        Self {
            rpc_url,
            use_websocket,
            ..Default::default()
        }
    }

    /// Connect and wrap the provider in a chain client
    pub async fn connect(&self) -> Result<Arc<dyn ChainClient>> {
        let provider = EthereumProvider::new(self).await?;
        Ok(provider.into_client(self.confirmations))
    }
}

impl EthereumProvider {
    /// Create a new Ethereum provider
    pub async fn new(config: &EthereumProviderConfig) -> Result<Self> {
        if config.use_websocket {
            let ws_provider = Provider::<Ws>::connect(&config.rpc_url)
                .await
                .map_err(|e| Error::client(format!("Failed to connect to Ethereum node via WebSocket: {}", e)))?;

            info!(url = %config.rpc_url, "Connected WebSocket provider");
            Ok(Self::Websocket(Arc::new(ws_provider)))
        } else {
            let http_provider = Provider::<Http>::try_from(config.rpc_url.as_str())
                .map_err(|e| Error::client(format!("Failed to create Ethereum HTTP provider: {}", e)))?;

            debug!(url = %config.rpc_url, "Created HTTP provider");
            Ok(Self::Http(Arc::new(http_provider)))
        }
    }

    /// Chain client speaking through this provider
    pub fn into_client(self, confirmations: usize) -> Arc<dyn ChainClient> {
        match self {
            EthereumProvider::Http(provider) => {
                Arc::new(EthersClient::new(provider).with_confirmations(confirmations))
            }
            EthereumProvider::Websocket(provider) => {
                Arc::new(EthersClient::new(provider).with_confirmations(confirmations))
            }
        }
    }
}
