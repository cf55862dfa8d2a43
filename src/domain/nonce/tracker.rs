//! Nonce tracker: observes the on-chain nonce and attributes increments to days

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::{debug, info};

use super::day::DayClock;
use super::state::AccountNonceState;
use crate::infrastructure::ethereum::{ProviderError, WalletProvider};
use crate::store::PersistentStateStore;

pub const DEFAULT_HISTORY_DAYS: usize = 14;

/// Why a refresh did not complete. Persisted state is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("no wallet provider connected")]
    ProviderUnavailable,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("could not persist nonce state: {0}")]
    Store(String),
}

/// Outcome of a successful refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Refresh {
    pub address: String,
    pub current_nonce: u64,
    pub delta: u64,
    /// Day key the delta was attributed to
    pub day: String,
    /// `dailyCounts[day]` after this refresh
    pub today_count: u64,
    /// Most recent day buckets, oldest first
    pub history: Vec<(String, u64)>,
}

type InFlight = Shared<BoxFuture<'static, Result<Refresh, TrackerError>>>;

/// Fetches nonces and maintains per-account daily counts.
///
/// Refreshes of the same address are coalesced: a call made while another
/// is awaiting the provider joins it and receives the same result.
pub struct NonceTracker {
    provider: RwLock<Option<Arc<dyn WalletProvider>>>,
    store: PersistentStateStore,
    clock: Arc<dyn DayClock>,
    timeout: Option<Duration>,
    history_days: usize,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl NonceTracker {
    pub fn new(store: PersistentStateStore, clock: Arc<dyn DayClock>) -> Self {
        Self {
            provider: RwLock::new(None),
            store,
            clock,
            timeout: None,
            history_days: DEFAULT_HISTORY_DAYS,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_provider(self, provider: Arc<dyn WalletProvider>) -> Self {
        self.attach_provider(provider);
        self
    }

    /// Fail provider calls that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_days(mut self, days: usize) -> Self {
        self.history_days = days;
        self
    }

    pub fn attach_provider(&self, provider: Arc<dyn WalletProvider>) {
        let mut slot = self.provider.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(provider);
    }

    pub fn detach_provider(&self) {
        let mut slot = self.provider.write().unwrap_or_else(|p| p.into_inner());
        *slot = None;
    }

    pub fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.provider
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Persisted state for `address`, zero state if none
    pub fn state(&self, address: &str) -> AccountNonceState {
        self.store.read(address)
    }

    /// Observe the current nonce of `address` and update its daily count
    pub async fn refresh(self: &Arc<Self>, address: &str) -> Result<Refresh, TrackerError> {
        let pending = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
            match in_flight.get(address) {
                Some(existing) => {
                    debug!(%address, "joining in-flight refresh");
                    existing.clone()
                }
                None => {
                    let tracker = Arc::clone(self);
                    let owned = address.to_string();
                    let fut = async move {
                        let result = tracker.refresh_once(&owned).await;
                        tracker
                            .in_flight
                            .lock()
                            .unwrap_or_else(|p| p.into_inner())
                            .remove(&owned);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(address.to_string(), fut.clone());
                    fut
                }
            }
        };
        pending.await
    }

    async fn refresh_once(&self, address: &str) -> Result<Refresh, TrackerError> {
        let provider = self.provider().ok_or(TrackerError::ProviderUnavailable)?;

        let request = provider.transaction_count(address);
        let current_nonce = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| ProviderError::Timeout(limit))??,
            None => request.await?,
        };

        // Nothing below awaits, so a failed provider call can never leave
        // a half-applied update behind.
        let mut state = self.store.read(address);
        let day = self.clock.today();
        let delta = state.observe(current_nonce, &day);
        self.store
            .write(address, &state)
            .map_err(|err| TrackerError::Store(format!("{err:#}")))?;

        if delta > 0 {
            info!(%address, nonce = current_nonce, delta, %day, "new transactions observed");
        } else {
            debug!(%address, nonce = current_nonce, %day, "nonce unchanged");
        }

        Ok(Refresh {
            address: address.to_string(),
            current_nonce,
            delta,
            today_count: state.count_for(&day),
            history: state.recent(self.history_days),
            day,
        })
    }
}
