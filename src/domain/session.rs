//! Connection lifecycle for the active account

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::DisplaySink;
use crate::domain::nonce::{AutoRefreshScheduler, NonceTracker, Refresh, TrackerError};
use crate::store::PersistentStateStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("connect an account first")]
    NotConnected,

    #[error("account address is empty")]
    EmptyAddress,

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Owns the connected address and drives the tracker and scheduler for it.
///
/// Connecting shows the account, refreshes once and starts the schedule;
/// disconnecting stops the schedule and clears the display. Nothing here is
/// global: the application controller owns one session.
pub struct WalletSession {
    tracker: Arc<NonceTracker>,
    scheduler: AutoRefreshScheduler,
    sink: Arc<dyn DisplaySink>,
    store: PersistentStateStore,
    address: Option<String>,
}

impl WalletSession {
    pub fn new(
        tracker: Arc<NonceTracker>,
        store: PersistentStateStore,
        sink: Arc<dyn DisplaySink>,
        interval: Duration,
    ) -> Self {
        let scheduler = AutoRefreshScheduler::new(Arc::clone(&tracker), Arc::clone(&sink), interval);
        Self {
            tracker,
            scheduler,
            sink,
            store,
            address: None,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn tracker(&self) -> &Arc<NonceTracker> {
        &self.tracker
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Address remembered from a previous run, if any
    pub fn remembered_address(&self) -> Option<String> {
        self.store.connected_address()
    }

    /// Make `address` the active account.
    ///
    /// Also used for account switches: the previous schedule is replaced.
    /// The immediate refresh result is returned and shown; a failure there
    /// doesn't prevent the schedule from starting.
    pub async fn connect(&mut self, address: &str) -> Result<Refresh, SessionError> {
        if address.trim().is_empty() {
            return Err(SessionError::EmptyAddress);
        }

        info!(%address, "account connected");
        self.address = Some(address.to_string());
        if let Err(err) = self.store.remember_address(address) {
            warn!(%address, error = %format!("{err:#}"), "could not remember address");
        }
        self.sink.show_connected(address);

        let result = self.tracker.refresh(address).await;
        self.present(address, &result);
        self.scheduler.start(address);

        result.map_err(SessionError::from)
    }

    /// Forget the active account and stop background refreshes
    pub fn disconnect(&mut self) {
        self.scheduler.stop();
        if let Some(address) = self.address.take() {
            info!(%address, "account disconnected");
        }
        if let Err(err) = self.store.forget_address() {
            warn!(error = %format!("{err:#}"), "could not clear remembered address");
        }
        self.sink.show_disconnected();
    }

    /// User-initiated refresh; errors are surfaced to the sink
    pub async fn refresh_now(&self) -> Result<Refresh, SessionError> {
        let Some(address) = self.address.clone() else {
            self.sink
                .show_error(None, &SessionError::NotConnected.to_string());
            return Err(SessionError::NotConnected);
        };
        let result = self.tracker.refresh(&address).await;
        self.present(&address, &result);
        result.map_err(SessionError::from)
    }

    fn present(&self, address: &str, result: &Result<Refresh, TrackerError>) {
        match result {
            Ok(refresh) => self.sink.show_nonce(refresh),
            Err(err) => {
                warn!(%address, error = %err, "nonce refresh failed");
                self.sink.show_error(Some(address), &err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RecordingSink, SinkEvent};
    use crate::domain::nonce::{FixedDayClock, DEFAULT_REFRESH_INTERVAL};
    use crate::infrastructure::ethereum::{ProviderError, ScriptedProvider};
    use crate::store::{KeyValueStore, MemoryStore};
    use chrono::NaiveDate;

    const ADDR: &str = "0x00000000000000000000000000000000000000aa";

    fn session(nonce: u64) -> (Arc<ScriptedProvider>, Arc<RecordingSink>, WalletSession) {
        let provider = Arc::new(ScriptedProvider::new(nonce));
        let store = PersistentStateStore::new(Arc::new(MemoryStore::new()));
        let tracker = Arc::new(
            NonceTracker::new(
                store.clone(),
                Arc::new(FixedDayClock::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())),
            )
            .with_provider(provider.clone()),
        );
        let sink = Arc::new(RecordingSink::default());
        let session = WalletSession::new(tracker, store, sink.clone(), DEFAULT_REFRESH_INTERVAL);
        (provider, sink, session)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_refreshes_then_schedules() {
        let (provider, sink, mut session) = session(3);
        let refresh = session.connect(ADDR).await.unwrap();
        assert_eq!(refresh.current_nonce, 3);
        assert!(session.is_auto_refreshing());
        assert_eq!(session.remembered_address().as_deref(), Some(ADDR));

        let events = sink.events();
        assert_eq!(events[0], SinkEvent::Connected(ADDR.to_string()));
        assert!(matches!(events[1], SinkEvent::Nonce(_)));

        provider.set_nonce(5);
        tokio::time::sleep(Duration::from_secs(31)).await;
        let last = sink.nonces().pop().unwrap();
        assert_eq!(last.today_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_schedule() {
        let (provider, sink, mut session) = session(3);
        session.connect(ADDR).await.unwrap();
        session.disconnect();

        assert_eq!(session.address(), None);
        assert_eq!(session.remembered_address(), None);
        assert_eq!(sink.events().last(), Some(&SinkEvent::Disconnected));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_manual_refresh_requires_account() {
        let (_, sink, session) = session(3);
        assert_eq!(session.refresh_now().await, Err(SessionError::NotConnected));
        assert_eq!(sink.errors(), vec!["connect an account first".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_surfaces_provider_errors() {
        let (provider, sink, mut session) = session(3);
        session.connect(ADDR).await.unwrap();

        provider.push(Err(ProviderError::Rpc("user rejected".into())));
        let err = session.refresh_now().await.unwrap_err();
        assert!(matches!(err, SessionError::Tracker(TrackerError::Provider(_))));
        assert_eq!(sink.errors().len(), 1);
        assert!(session.is_auto_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_still_schedules() {
        let (provider, sink, mut session) = session(3);
        provider.push(Err(ProviderError::Rpc("not found".into())));
        assert!(session.connect(ADDR).await.is_err());
        assert!(session.is_auto_refreshing());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(sink.nonces().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_address_rejected() {
        let (_, _, mut session) = session(3);
        assert_eq!(session.connect("   ").await, Err(SessionError::EmptyAddress));
        assert_eq!(session.address(), None);
    }

    #[tokio::test]
    async fn test_address_is_kept_verbatim() {
        let (_, _, mut session) = session(3);
        let mixed = "0x00000000000000000000000000000000000000Aa";
        session.connect(mixed).await.unwrap();
        assert_eq!(session.address(), Some(mixed));
        assert_eq!(session.tracker().state(mixed).last_seen_nonce, Some(3));
        assert_eq!(session.tracker().state(ADDR).last_seen_nonce, None);
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_failure_reaches_sink() {
        let store = PersistentStateStore::new(Arc::new(ReadOnlyStore));
        let tracker = Arc::new(
            NonceTracker::new(
                store.clone(),
                Arc::new(FixedDayClock::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())),
            )
            .with_provider(Arc::new(ScriptedProvider::new(3))),
        );
        let sink = Arc::new(RecordingSink::default());
        let mut session =
            WalletSession::new(tracker, store, sink.clone(), DEFAULT_REFRESH_INTERVAL);

        assert!(session.connect(ADDR).await.is_err());
        let err = session.refresh_now().await.unwrap_err();
        assert!(matches!(err, SessionError::Tracker(TrackerError::Store(_))));

        let errors = sink.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|message| message.contains("disk full")));
    }
}
