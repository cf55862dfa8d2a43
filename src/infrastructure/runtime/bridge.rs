//! Runtime bridge - connects the sync TUI thread with the async Tokio runtime

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tokio::runtime::Runtime;

use crate::core::DisplaySink;
use crate::domain::nonce::Refresh;
use crate::domain::{Chain, FeeQuote};
use crate::infrastructure::runtime::worker::{run_async_worker, WorkerSetup};

/// Commands sent from the TUI to the async worker
#[derive(Debug, Clone)]
pub enum RuntimeCommand {
    /// Connect an account; `None` picks the configured, remembered or first node account
    Connect { address: Option<String> },
    /// Drop the active account
    Disconnect,
    /// Manual nonce refresh
    RefreshNonce,
    /// Fetch the active account's balance
    FetchBalance,
    /// Ask the wallet to sign `message` with the active account
    SignMessage { message: String },
    /// Fetch gas price and compute a fee estimate
    QuoteGas {
        chain: Chain,
        gas_limit: Option<u64>,
        amount: f64,
    },
    /// Switch to a different endpoint
    SwitchEndpoint { index: usize },
    /// Shutdown the worker
    Shutdown,
}

/// Events sent from the async worker to the TUI
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Provider is reachable
    ProviderConnected {
        endpoint: String,
        chain_id: Option<u64>,
    },
    /// An account became active
    AccountConnected { address: String },
    /// The active account was dropped
    AccountDisconnected,
    /// Nonce refresh completed
    NonceUpdated(Refresh),
    /// Nonce refresh failed (manual or on connect)
    NonceFailed {
        address: Option<String>,
        message: String,
    },
    /// Balance ready
    BalanceReady { address: String, balance: String },
    /// Message signed by the active account
    Signed {
        address: String,
        message: String,
        signature: String,
    },
    /// Fee estimate ready
    GasQuoteReady(FeeQuote),
    /// Error occurred
    Error { message: String },
}

/// [`DisplaySink`] that forwards to the TUI as runtime events
pub struct ChannelSink {
    tx: Sender<RuntimeEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<RuntimeEvent>) -> Self {
        Self { tx }
    }
}

impl DisplaySink for ChannelSink {
    fn show_connected(&self, address: &str) {
        let _ = self.tx.send(RuntimeEvent::AccountConnected {
            address: address.to_string(),
        });
    }

    fn show_disconnected(&self) {
        let _ = self.tx.send(RuntimeEvent::AccountDisconnected);
    }

    fn show_nonce(&self, refresh: &Refresh) {
        let _ = self.tx.send(RuntimeEvent::NonceUpdated(refresh.clone()));
    }

    fn show_error(&self, address: Option<&str>, message: &str) {
        let _ = self.tx.send(RuntimeEvent::NonceFailed {
            address: address.map(str::to_string),
            message: message.to_string(),
        });
    }
}

/// Bridge between sync TUI thread and async Tokio runtime
pub struct RuntimeBridge {
    cmd_tx: Sender<RuntimeCommand>,
    evt_rx: Receiver<RuntimeEvent>,
}

impl RuntimeBridge {
    /// Spawn the worker thread with its own Tokio runtime
    pub fn new(setup: WorkerSetup) -> anyhow::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<RuntimeCommand>();
        let (evt_tx, evt_rx) = mpsc::channel::<RuntimeEvent>();

        thread::Builder::new()
            .name("tally-runtime".to_string())
            .spawn(move || {
                let rt = match Runtime::new() {
                    Ok(rt) => rt,
                    Err(err) => {
                        let _ = evt_tx.send(RuntimeEvent::Error {
                            message: format!("Failed to create Tokio runtime: {err}"),
                        });
                        return;
                    }
                };
                rt.block_on(async {
                    if let Err(err) = run_async_worker(setup, cmd_rx, evt_tx.clone()).await {
                        tracing::error!(error = %format!("{err:#}"), "worker exited");
                        let _ = evt_tx.send(RuntimeEvent::Error {
                            message: format!("Worker exited: {:#}", err),
                        });
                    }
                });
            })?;

        Ok(Self { cmd_tx, evt_rx })
    }

    /// Send a command to the async worker
    pub fn send(&self, cmd: RuntimeCommand) -> anyhow::Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow::anyhow!("Worker channel closed"))
    }

    /// Poll for events (non-blocking)
    pub fn poll_events(&self) -> Vec<RuntimeEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.evt_rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

impl Drop for RuntimeBridge {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown);
    }
}
