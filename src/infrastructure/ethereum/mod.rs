//! Ethereum infrastructure - wallet provider implementations

mod provider;
mod scripted;

pub use provider::{create_provider, AlloyWallet, ProviderConfig, ProviderError, WalletProvider};
pub use scripted::{ScriptedProvider, DEMO_ACCOUNT};
