//! Account nonce state persisted as JSON under `state:<address>`

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::domain::nonce::AccountNonceState;
use crate::store::KeyValueStore;

const CONNECTED_ADDRESS_KEY: &str = "connectedAddress";

/// Reads and writes [`AccountNonceState`] on top of a key-value backend
#[derive(Clone)]
pub struct PersistentStateStore {
    kv: Arc<dyn KeyValueStore>,
}

impl PersistentStateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load state for `address`.
    ///
    /// Never fails: a missing entry, a backend error or undecodable JSON all
    /// yield a zero state.
    pub fn read(&self, address: &str) -> AccountNonceState {
        if address.trim().is_empty() {
            return AccountNonceState::default();
        }

        let key = state_key(address);
        let raw = match self.kv.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return AccountNonceState::default(),
            Err(err) => {
                warn!(%address, error = %format!("{err:#}"), "state read failed, starting fresh");
                return AccountNonceState::default();
            }
        };

        match serde_json::from_str::<AccountNonceState>(&raw) {
            Ok(state) => state,
            Err(err) => {
                warn!(%address, error = %err, "stored state is corrupt, starting fresh");
                AccountNonceState::default()
            }
        }
    }

    /// Persist state for `address`; empty addresses are ignored
    pub fn write(&self, address: &str, state: &AccountNonceState) -> Result<()> {
        if address.trim().is_empty() {
            return Ok(());
        }
        let raw = serde_json::to_string(state).context("encode nonce state")?;
        self.kv
            .set(&state_key(address), &raw)
            .with_context(|| format!("persist state for {address}"))
    }

    // === Remembered account ===

    pub fn connected_address(&self) -> Option<String> {
        match self.kv.get(CONNECTED_ADDRESS_KEY) {
            Ok(value) => value.filter(|addr| !addr.trim().is_empty()),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "could not load remembered address");
                None
            }
        }
    }

    pub fn remember_address(&self, address: &str) -> Result<()> {
        self.kv.set(CONNECTED_ADDRESS_KEY, address)
    }

    pub fn forget_address(&self) -> Result<()> {
        self.kv.remove(CONNECTED_ADDRESS_KEY)
    }
}

/// Storage key for an address, used verbatim
pub fn state_key(address: &str) -> String {
    format!("state:{}", address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> (Arc<MemoryStore>, PersistentStateStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), PersistentStateStore::new(kv))
    }

    #[test]
    fn test_missing_state_is_zero() {
        let (_, store) = store();
        assert_eq!(store.read("0xabc"), AccountNonceState::default());
    }

    #[test]
    fn test_write_then_read() {
        let (kv, store) = store();
        let mut state = AccountNonceState::default();
        state.observe(4, "2024-03-01");
        store.write("0xabc", &state).unwrap();

        assert_eq!(store.read("0xabc"), state);
        assert!(kv.get("state:0xabc").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_state_is_zero() {
        let (kv, store) = store();
        for raw in ["{not json", "42", r#"{"lastSeenNonce":-3}"#, r#"{"dailyCounts":{"x":"y"}}"#] {
            kv.set("state:0xabc", raw).unwrap();
            assert_eq!(store.read("0xabc"), AccountNonceState::default(), "raw: {raw}");
        }
    }

    #[test]
    fn test_empty_address_is_ignored() {
        let (kv, store) = store();
        let mut state = AccountNonceState::default();
        state.observe(1, "2024-03-01");
        store.write("  ", &state).unwrap();
        assert_eq!(kv.get("state:").unwrap(), None);
        assert_eq!(store.read(""), AccountNonceState::default());
    }

    #[test]
    fn test_remembered_address() {
        let (_, store) = store();
        assert_eq!(store.connected_address(), None);
        store.remember_address("0xabc").unwrap();
        assert_eq!(store.connected_address().as_deref(), Some("0xabc"));
        store.forget_address().unwrap();
        assert_eq!(store.connected_address(), None);
    }
}
