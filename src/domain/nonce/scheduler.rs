//! Periodic background refresh for the connected account

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::tracker::NonceTracker;
use crate::core::DisplaySink;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

struct Running {
    address: String,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs `NonceTracker::refresh` on a fixed interval.
///
/// At most one schedule is active. Failed ticks are logged and dropped; the
/// next tick tries again.
pub struct AutoRefreshScheduler {
    tracker: Arc<NonceTracker>,
    sink: Arc<dyn DisplaySink>,
    period: Duration,
    running: Option<Running>,
}

impl AutoRefreshScheduler {
    pub fn new(tracker: Arc<NonceTracker>, sink: Arc<dyn DisplaySink>, period: Duration) -> Self {
        Self {
            tracker,
            sink,
            period,
            running: None,
        }
    }

    /// Start ticking for `address`, replacing any running schedule.
    ///
    /// The first tick fires one period from now. Must be called from within
    /// a tokio runtime.
    pub fn start(&mut self, address: &str) {
        self.stop();

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let tracker = Arc::clone(&self.tracker);
        let sink = Arc::clone(&self.sink);
        let period = self.period;
        let owned = address.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let result = tracker.refresh(&owned).await;
                        // a stop issued mid-refresh lets the refresh land but
                        // keeps its result off the display
                        if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                            break;
                        }
                        match result {
                            Ok(refresh) => sink.show_nonce(&refresh),
                            Err(err) => {
                                debug!(address = %owned, error = %err, "scheduled refresh failed")
                            }
                        }
                    }
                }
            }
            debug!(address = %owned, "auto refresh stopped");
        });

        debug!(%address, period_secs = period.as_secs(), "auto refresh started");
        self.running = Some(Running {
            address: address.to_string(),
            stop: stop_tx,
            handle,
        });
    }

    /// Cancel future ticks. A refresh already awaiting the provider completes.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    pub fn active_address(&self) -> Option<&str> {
        self.running.as_ref().map(|running| running.address.as_str())
    }
}

impl Drop for AutoRefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordingSink;
    use crate::domain::nonce::{AccountNonceState, FixedDayClock};
    use crate::infrastructure::ethereum::{ProviderError, ScriptedProvider};
    use crate::store::{state_key, KeyValueStore, MemoryStore, PersistentStateStore};
    use chrono::NaiveDate;

    const ADDR: &str = "0x000000000000000000000000000000000000bEEF";

    fn setup(nonce: u64) -> (Arc<ScriptedProvider>, Arc<RecordingSink>, AutoRefreshScheduler) {
        let provider = Arc::new(ScriptedProvider::new(nonce));
        let tracker = Arc::new(
            NonceTracker::new(
                PersistentStateStore::new(Arc::new(MemoryStore::new())),
                Arc::new(FixedDayClock::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())),
            )
            .with_provider(provider.clone()),
        );
        let sink = Arc::new(RecordingSink::default());
        let scheduler = AutoRefreshScheduler::new(tracker, sink.clone(), DEFAULT_REFRESH_INTERVAL);
        (provider, sink, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let (provider, sink, mut scheduler) = setup(1);
        scheduler.start(ADDR);
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(provider.calls(), 0);

        tokio::time::sleep(Duration::from_secs(66)).await;
        assert_eq!(provider.calls(), 3);
        assert_eq!(sink.nonces().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_future_ticks() {
        let (provider, _sink, mut scheduler) = setup(1);
        scheduler.start(ADDR);
        tokio::time::sleep(Duration::from_secs(31)).await;
        scheduler.stop();
        assert_eq!(scheduler.active_address(), None);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_single_timer() {
        let (provider, _sink, mut scheduler) = setup(1);
        scheduler.start(ADDR);
        tokio::time::sleep(Duration::from_secs(10)).await;
        scheduler.start("0x0000000000000000000000000000000000000002");
        assert_eq!(
            scheduler.active_address(),
            Some("0x0000000000000000000000000000000000000002")
        );

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_keep_schedule_alive() {
        let (provider, sink, mut scheduler) = setup(4);
        provider.push(Err(ProviderError::Rpc("timeout".into())));
        scheduler.start(ADDR);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(provider.calls(), 2);
        assert!(scheduler.is_running());
        assert_eq!(sink.nonces().len(), 1);
        assert!(sink.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_refresh_persists_without_display() {
        let kv = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::new(7).with_latency(Duration::from_secs(5)));
        let tracker = Arc::new(
            NonceTracker::new(
                PersistentStateStore::new(kv.clone()),
                Arc::new(FixedDayClock::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())),
            )
            .with_provider(provider.clone()),
        );
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler =
            AutoRefreshScheduler::new(tracker, sink.clone(), DEFAULT_REFRESH_INTERVAL);

        scheduler.start(ADDR);
        // first tick at 30s; the provider answers at 35s
        tokio::time::sleep(Duration::from_secs(32)).await;
        assert_eq!(provider.calls(), 1);
        scheduler.stop();

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(provider.calls(), 1);
        assert!(sink.nonces().is_empty());

        let stored: AccountNonceState =
            serde_json::from_str(&kv.get(&state_key(ADDR)).unwrap().unwrap()).unwrap();
        assert_eq!(stored.last_seen_nonce, Some(7));
        assert_eq!(stored.count_for("2024-03-01"), 0);
    }
}
