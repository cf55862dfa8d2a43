//! Wallet provider abstraction and the Alloy implementation

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{hex, Address, Bytes, U256};
use alloy::providers::{
    fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
    Identity, Provider, ProviderBuilder, RootProvider,
};
use anyhow::{Context, Result};

/// Failures of a single provider request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("rpc request failed: {0}")]
    Rpc(String),

    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
}

/// Provider configuration
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// HTTP JSON-RPC endpoint
    Http(String),
    /// WebSocket endpoint
    WebSocket(String),
    /// IPC socket path (Unix only)
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl ProviderConfig {
    /// Get display name for this endpoint
    pub fn display(&self) -> String {
        match self {
            ProviderConfig::Http(url) => url.clone(),
            ProviderConfig::WebSocket(url) => url.clone(),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => path.display().to_string(),
        }
    }
}

/// The account-facing slice of an Ethereum node the dashboard needs.
///
/// Addresses are passed as the strings the user connected with; each
/// implementation decides how to parse them.
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Transaction count (nonce) of `address` at the latest block
    async fn transaction_count(&self, address: &str) -> Result<u64, ProviderError>;

    /// Accounts the node exposes (dev nodes, unlocked wallets)
    async fn accounts(&self) -> Result<Vec<String>, ProviderError>;

    /// Balance of `address` in wei
    async fn balance(&self, address: &str) -> Result<U256, ProviderError>;

    /// Current gas price in wei
    async fn gas_price(&self) -> Result<u128, ProviderError>;

    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// `personal_sign` of a UTF-8 message by `address`; returns the hex signature
    async fn sign_message(&self, address: &str, message: &str) -> Result<String, ProviderError>;

    /// Get endpoint display name
    fn endpoint_name(&self) -> String;
}

type FilledProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Alloy-backed provider; the transport is fixed at connect time
pub struct AlloyWallet {
    provider: FilledProvider,
    endpoint: String,
}

/// Create a provider from configuration
pub async fn create_provider(config: ProviderConfig) -> Result<Arc<dyn WalletProvider>> {
    let endpoint = config.display();
    let provider = match config {
        ProviderConfig::Http(url) => {
            let rpc_url = url.parse().context("Invalid HTTP URL")?;
            ProviderBuilder::new().connect_http(rpc_url)
        }
        ProviderConfig::WebSocket(url) => ProviderBuilder::new()
            .connect(&url)
            .await
            .context("Failed to create WebSocket provider")?,
        #[cfg(unix)]
        ProviderConfig::Ipc(path) => {
            use alloy::providers::IpcConnect;
            let ipc = IpcConnect::new(path.to_string_lossy().to_string());
            ProviderBuilder::new()
                .connect_ipc(ipc)
                .await
                .context("Failed to create IPC provider")?
        }
    };

    Ok(Arc::new(AlloyWallet { provider, endpoint }))
}

#[async_trait::async_trait]
impl WalletProvider for AlloyWallet {
    async fn transaction_count(&self, address: &str) -> Result<u64, ProviderError> {
        let address = parse_address(address)?;
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(rpc_error)
    }

    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        let accounts = self.provider.get_accounts().await.map_err(rpc_error)?;
        Ok(accounts.into_iter().map(|a| a.to_checksum(None)).collect())
    }

    async fn balance(&self, address: &str) -> Result<U256, ProviderError> {
        let address = parse_address(address)?;
        self.provider.get_balance(address).await.map_err(rpc_error)
    }

    async fn gas_price(&self) -> Result<u128, ProviderError> {
        self.provider.get_gas_price().await.map_err(rpc_error)
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn sign_message(&self, address: &str, message: &str) -> Result<String, ProviderError> {
        let address = parse_address(address)?;
        let data = hex::encode_prefixed(message.as_bytes());
        let signature: Bytes = self
            .provider
            .raw_request("personal_sign".into(), (data, address))
            .await
            .map_err(rpc_error)?;
        Ok(signature.to_string())
    }

    fn endpoint_name(&self) -> String {
        self.endpoint.clone()
    }
}

fn parse_address(address: &str) -> Result<Address, ProviderError> {
    Address::from_str(address.trim()).map_err(|_| ProviderError::InvalidAddress(address.to_string()))
}

fn rpc_error(err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Rpc(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert!(parse_address("0x000000000000000000000000000000000000dEaD").is_ok());
        assert_eq!(
            parse_address("0x12"),
            Err(ProviderError::InvalidAddress("0x12".to_string()))
        );
    }

    #[test]
    fn test_endpoint_display() {
        let config = ProviderConfig::Http("http://127.0.0.1:8545".to_string());
        assert_eq!(config.display(), "http://127.0.0.1:8545");
    }
}
