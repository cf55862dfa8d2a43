//! In-process provider for mock mode and tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{keccak256, U256};

use super::provider::{ProviderError, WalletProvider};

/// Provider whose answers are set by the caller.
///
/// Queued nonce results are served first; once the queue is drained the
/// current nonce is returned, advancing by one every `drift_every` calls
/// when drift is enabled.
#[derive(Debug)]
pub struct ScriptedProvider {
    nonce: Mutex<u64>,
    queued: Mutex<VecDeque<Result<u64, ProviderError>>>,
    accounts: Vec<String>,
    balance_wei: U256,
    gas_price_wei: u128,
    chain_id: u64,
    latency: Mutex<Option<Duration>>,
    drift_every: Option<usize>,
    sign_failure: Mutex<Option<ProviderError>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(nonce: u64) -> Self {
        Self {
            nonce: Mutex::new(nonce),
            queued: Mutex::new(VecDeque::new()),
            accounts: Vec::new(),
            balance_wei: U256::ZERO,
            gas_price_wei: 0,
            chain_id: 31337,
            latency: Mutex::new(None),
            drift_every: None,
            sign_failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that looks like a busy dev account
    pub fn demo() -> Self {
        Self::new(42)
            .with_accounts(vec![DEMO_ACCOUNT.to_string()])
            .with_balance(U256::from(1_234_567_000_000_000_000u128))
            .with_gas_price(12_500_000_000)
            .with_drift(3)
    }

    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_balance(mut self, wei: U256) -> Self {
        self.balance_wei = wei;
        self
    }

    pub fn with_gas_price(mut self, wei: u128) -> Self {
        self.gas_price_wei = wei;
        self
    }

    pub fn with_drift(mut self, every: usize) -> Self {
        self.drift_every = Some(every.max(1));
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(Some(latency));
        self
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    pub fn set_nonce(&self, nonce: u64) {
        if let Ok(mut guard) = self.nonce.lock() {
            *guard = nonce;
        }
    }

    /// Make `sign_message` fail with `err` until cleared
    pub fn set_sign_failure(&self, err: Option<ProviderError>) {
        if let Ok(mut guard) = self.sign_failure.lock() {
            *guard = err;
        }
    }

    /// Serve `result` on a future call, ahead of the current nonce
    pub fn push(&self, result: Result<u64, ProviderError>) {
        if let Ok(mut queue) = self.queued.lock() {
            queue.push_back(result);
        }
    }

    /// Number of `transaction_count` calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_nonce(&self, call: usize) -> Result<u64, ProviderError> {
        if let Some(result) = self.queued.lock().ok().and_then(|mut q| q.pop_front()) {
            return result;
        }
        let mut nonce = self
            .nonce
            .lock()
            .map_err(|_| ProviderError::Rpc("scripted provider poisoned".to_string()))?;
        if let Some(every) = self.drift_every {
            if call > 0 && call % every == 0 {
                *nonce += 1;
            }
        }
        Ok(*nonce)
    }
}

pub const DEMO_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

#[async_trait::async_trait]
impl WalletProvider for ScriptedProvider {
    async fn transaction_count(&self, _address: &str) -> Result<u64, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency.lock().ok().and_then(|guard| *guard);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.next_nonce(call)
    }

    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.accounts.clone())
    }

    async fn balance(&self, _address: &str) -> Result<U256, ProviderError> {
        Ok(self.balance_wei)
    }

    async fn gas_price(&self) -> Result<u128, ProviderError> {
        Ok(self.gas_price_wei)
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.chain_id)
    }

    async fn sign_message(&self, address: &str, message: &str) -> Result<String, ProviderError> {
        if let Some(err) = self.sign_failure.lock().ok().and_then(|guard| guard.clone()) {
            return Err(err);
        }
        // deterministic r || s || v, shaped like a real 65-byte signature
        let r = keccak256(format!("{address}:{message}").as_bytes());
        let s = keccak256(message.as_bytes());
        Ok(format!("0x{r:x}{s:x}1b"))
    }

    fn endpoint_name(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_current() {
        let provider = ScriptedProvider::new(7);
        provider.push(Err(ProviderError::Rpc("boom".into())));
        provider.push(Ok(3));

        assert!(provider.transaction_count("0x1").await.is_err());
        assert_eq!(provider.transaction_count("0x1").await, Ok(3));
        assert_eq!(provider.transaction_count("0x1").await, Ok(7));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_drift_advances_nonce() {
        let provider = ScriptedProvider::new(0).with_drift(2);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(provider.transaction_count("0x1").await.unwrap());
        }
        assert_eq!(seen, vec![0, 0, 1, 1, 2]);
    }

    #[tokio::test]
    async fn test_sign_message_is_deterministic() {
        let provider = ScriptedProvider::demo();
        let first = provider.sign_message(DEMO_ACCOUNT, "hi").await.unwrap();
        assert_eq!(first.len(), 2 + 130);
        assert!(first.starts_with("0x"));
        assert_eq!(provider.sign_message(DEMO_ACCOUNT, "hi").await.unwrap(), first);
        assert_ne!(provider.sign_message(DEMO_ACCOUNT, "bye").await.unwrap(), first);

        provider.set_sign_failure(Some(ProviderError::Rpc("user rejected".into())));
        assert!(provider.sign_message(DEMO_ACCOUNT, "hi").await.is_err());
    }
}
