//! Async worker - runs in Tokio runtime and owns the wallet session

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{interval, Instant};
use tracing::{info, warn};

use crate::core::DisplaySink;
use crate::domain::nonce::{DayClock, NonceTracker};
use crate::domain::units::format_eth;
use crate::domain::{FeeQuote, WalletSession};
use crate::infrastructure::ethereum::{
    create_provider, ProviderConfig, ScriptedProvider, WalletProvider,
};
use crate::infrastructure::runtime::bridge::{ChannelSink, RuntimeCommand, RuntimeEvent};
use crate::store::PersistentStateStore;

const RECONNECT_DELAY: Duration = Duration::from_millis(900);

/// Where the worker gets its provider from
#[derive(Debug, Clone)]
pub enum ProviderSource {
    /// JSON-RPC endpoints, tried in order
    Endpoints(Vec<ProviderConfig>),
    /// In-process demo provider
    Mock,
}

/// Everything the worker needs to build its session
pub struct WorkerSetup {
    pub source: ProviderSource,
    pub store: PersistentStateStore,
    pub clock: Arc<dyn DayClock>,
    /// Account to connect as soon as a provider is up
    pub address: Option<String>,
    pub refresh_interval: Duration,
    pub provider_timeout: Option<Duration>,
    pub history_days: usize,
}

/// Run the async worker loop
pub async fn run_async_worker(
    setup: WorkerSetup,
    cmd_rx: Receiver<RuntimeCommand>,
    evt_tx: Sender<RuntimeEvent>,
) -> Result<()> {
    let WorkerSetup {
        source,
        store,
        clock,
        address,
        refresh_interval,
        provider_timeout,
        history_days,
    } = setup;

    let endpoint_count = match &source {
        ProviderSource::Endpoints(endpoints) if endpoints.is_empty() => {
            anyhow::bail!("No endpoints configured")
        }
        ProviderSource::Endpoints(endpoints) => endpoints.len(),
        ProviderSource::Mock => 1,
    };

    let sink: Arc<dyn DisplaySink> = Arc::new(ChannelSink::new(evt_tx.clone()));
    let tracker = Arc::new(
        NonceTracker::new(store.clone(), clock)
            .with_timeout(provider_timeout)
            .with_history_days(history_days),
    );
    let mut session = WalletSession::new(Arc::clone(&tracker), store, sink, refresh_interval);

    let mut endpoint_index = 0usize;
    let mut provider: Option<Arc<dyn WalletProvider>> = None;
    let mut next_attempt = Instant::now();
    let mut auto_connect = address.clone().or_else(|| session.remembered_address());

    // Command polling interval
    let mut poll_interval = interval(Duration::from_millis(100));

    loop {
        if provider.is_none() && Instant::now() >= next_attempt {
            match connect_provider(&source, endpoint_index).await {
                Ok(p) => {
                    let chain_id = p.chain_id().await.ok();
                    let endpoint = p.endpoint_name();
                    info!(%endpoint, ?chain_id, "provider connected");
                    let _ = evt_tx.send(RuntimeEvent::ProviderConnected { endpoint, chain_id });
                    tracker.attach_provider(Arc::clone(&p));

                    if auto_connect.is_none() && matches!(source, ProviderSource::Mock) {
                        auto_connect = first_account(p.as_ref()).await;
                    }
                    provider = Some(p);

                    if let Some(addr) = auto_connect.take() {
                        let _ = session.connect(&addr).await;
                    }
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "provider connection failed");
                    let _ = evt_tx.send(RuntimeEvent::Error {
                        message: format!("Connection failed: {:#}", err),
                    });

                    // Try next endpoint if available
                    endpoint_index = (endpoint_index + 1) % endpoint_count;
                    next_attempt = Instant::now() + RECONNECT_DELAY;
                }
            }
        }

        // Process commands (non-blocking)
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                // the remembered address survives shutdown; only Disconnect forgets it
                RuntimeCommand::Shutdown => return Ok(()),

                RuntimeCommand::SwitchEndpoint { index } => {
                    if index >= endpoint_count {
                        let _ = evt_tx.send(RuntimeEvent::Error {
                            message: format!(
                                "Invalid endpoint index {} ({} total)",
                                index, endpoint_count
                            ),
                        });
                        continue;
                    }
                    endpoint_index = index;
                    tracker.detach_provider();
                    provider = None;
                    next_attempt = Instant::now();
                }

                RuntimeCommand::Connect { address: requested } => {
                    let candidate = match requested.or_else(|| address.clone()) {
                        Some(addr) => Some(addr),
                        None => match session.remembered_address() {
                            Some(addr) => Some(addr),
                            None => match provider.as_deref() {
                                Some(p) => first_account(p).await,
                                None => None,
                            },
                        },
                    };
                    match candidate {
                        Some(addr) => {
                            let _ = session.connect(&addr).await;
                        }
                        None => {
                            let _ = evt_tx.send(RuntimeEvent::Error {
                                message: "No account available; pass --address".to_string(),
                            });
                        }
                    }
                }

                RuntimeCommand::Disconnect => session.disconnect(),

                RuntimeCommand::RefreshNonce => {
                    let _ = session.refresh_now().await;
                }

                RuntimeCommand::FetchBalance => {
                    let event = match (session.address(), provider.as_deref()) {
                        (None, _) => RuntimeEvent::Error {
                            message: "Connect first.".to_string(),
                        },
                        (Some(_), None) => RuntimeEvent::Error {
                            message: "No provider connected".to_string(),
                        },
                        (Some(addr), Some(p)) => match p.balance(addr).await {
                            Ok(wei) => RuntimeEvent::BalanceReady {
                                address: addr.to_string(),
                                balance: format_eth(wei),
                            },
                            Err(err) => RuntimeEvent::Error {
                                message: format!("Balance fetch failed: {}", err),
                            },
                        },
                    };
                    let _ = evt_tx.send(event);
                }

                RuntimeCommand::SignMessage { message } => {
                    let event = match (session.address(), provider.as_deref()) {
                        (None, _) => RuntimeEvent::Error {
                            message: "Connect first.".to_string(),
                        },
                        (Some(_), None) => RuntimeEvent::Error {
                            message: "No provider connected".to_string(),
                        },
                        (Some(addr), Some(p)) => match p.sign_message(addr, &message).await {
                            Ok(signature) => {
                                info!(address = %addr, "message signed");
                                RuntimeEvent::Signed {
                                    address: addr.to_string(),
                                    message,
                                    signature,
                                }
                            }
                            Err(err) => {
                                warn!(address = %addr, error = %err, "signing failed");
                                RuntimeEvent::Error {
                                    message: format!("Signing error: {}", err),
                                }
                            }
                        },
                    };
                    let _ = evt_tx.send(event);
                }

                RuntimeCommand::QuoteGas {
                    chain,
                    gas_limit,
                    amount,
                } => {
                    let event = match provider.as_deref() {
                        None => RuntimeEvent::Error {
                            message: "No provider connected".to_string(),
                        },
                        Some(p) => match p.gas_price().await {
                            Ok(price) => RuntimeEvent::GasQuoteReady(FeeQuote::compute(
                                price, chain, gas_limit, amount,
                            )),
                            Err(err) => RuntimeEvent::Error {
                                message: format!("Could not fetch gas price: {}", err),
                            },
                        },
                    };
                    let _ = evt_tx.send(event);
                }
            }
        }

        poll_interval.tick().await;
    }
}

async fn connect_provider(
    source: &ProviderSource,
    index: usize,
) -> Result<Arc<dyn WalletProvider>> {
    match source {
        ProviderSource::Mock => Ok(Arc::new(ScriptedProvider::demo())),
        ProviderSource::Endpoints(endpoints) => {
            let config = endpoints[index % endpoints.len()].clone();
            let provider = create_provider(config).await?;
            // probe so an unreachable HTTP endpoint counts as a failed connect
            provider.chain_id().await?;
            Ok(provider)
        }
    }
}

async fn first_account(provider: &dyn WalletProvider) -> Option<String> {
    match provider.accounts().await {
        Ok(accounts) => accounts.into_iter().next(),
        Err(err) => {
            warn!(error = %err, "could not list node accounts");
            None
        }
    }
}
