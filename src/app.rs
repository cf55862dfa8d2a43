use std::time::{Duration, Instant};

use chrono::Local;

use crate::config::CalculatorConfig;
use crate::core::{Action, NotifyLevel};
use crate::domain::nonce::Refresh;
use crate::domain::{Chain, FeeQuote};
use crate::infrastructure::runtime::{RuntimeCommand, RuntimeEvent};
use crate::modules::export;
use crate::store::PersistentStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Mock,
    Rpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

impl From<NotifyLevel> for StatusLevel {
    fn from(level: NotifyLevel) -> Self {
        match level {
            NotifyLevel::Info => StatusLevel::Info,
            NotifyLevel::Warn => StatusLevel::Warn,
            NotifyLevel::Error => StatusLevel::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub since: Instant,
}

/// What the nonce panel currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonceDisplay {
    Unknown,
    Loaded(Refresh),
    Error(String),
}

/// Last message signed by the active account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub message: String,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct CalculatorState {
    pub chain: Chain,
    pub gas_limit: Option<u64>,
    pub amount: f64,
    pub quote: Option<FeeQuote>,
}

impl From<&CalculatorConfig> for CalculatorState {
    fn from(config: &CalculatorConfig) -> Self {
        Self {
            chain: config.chain,
            gas_limit: config.gas_limit,
            amount: config.amount,
            quote: None,
        }
    }
}

pub struct App {
    pub data_mode: DataMode,
    pub endpoint: String,
    pub endpoints: Vec<String>,
    pub endpoint_index: usize,
    pub chain_id: Option<u64>,
    pub provider_ready: bool,
    pub address: Option<String>,
    pub balance: Option<String>,
    pub signed: Option<SignedMessage>,
    pub nonce: NonceDisplay,
    pub last_refresh_at: Option<Instant>,
    pub refresh_interval: Duration,
    pub calculator: CalculatorState,
    pub status: Option<StatusMessage>,
    pub store: Option<PersistentStateStore>,
    pub help_open: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(data_mode: DataMode, refresh_interval: Duration, calculator: CalculatorState) -> Self {
        Self {
            data_mode,
            endpoint: "localhost:8545".to_string(),
            endpoints: Vec::new(),
            endpoint_index: 0,
            chain_id: None,
            provider_ready: false,
            address: None,
            balance: None,
            signed: None,
            nonce: NonceDisplay::Unknown,
            last_refresh_at: None,
            refresh_interval,
            calculator,
            status: None,
            store: None,
            help_open: false,
            should_quit: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    pub fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            since: Instant::now(),
        });
    }

    pub fn status_text(&self) -> Option<(&str, StatusLevel)> {
        self.status
            .as_ref()
            .map(|status| (status.text.as_str(), status.level))
    }

    pub fn on_tick(&mut self) {
        if let Some(status) = self.status.as_ref() {
            if status.since.elapsed() > Duration::from_secs(4) {
                self.status = None;
            }
        }
    }

    /// Seconds until the next scheduled refresh, if one is due
    pub fn next_refresh_in(&self) -> Option<Duration> {
        if !self.is_connected() {
            return None;
        }
        let last = self.last_refresh_at?;
        Some(self.refresh_interval.saturating_sub(last.elapsed()))
    }

    /// Daily counts of the current account for the sparkline
    pub fn history_counts(&self) -> Vec<u64> {
        match &self.nonce {
            NonceDisplay::Loaded(refresh) => refresh.history.iter().map(|(_, c)| *c).collect(),
            _ => Vec::new(),
        }
    }

    pub fn apply_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::ProviderConnected { endpoint, chain_id } => {
                self.endpoint = endpoint;
                self.chain_id = chain_id;
                self.provider_ready = true;
                self.set_status(format!("Connected to {}", self.endpoint), StatusLevel::Info);
            }
            RuntimeEvent::AccountConnected { address } => {
                if self.address.as_deref() != Some(address.as_str()) {
                    self.balance = None;
                    self.signed = None;
                    self.nonce = NonceDisplay::Unknown;
                }
                self.address = Some(address);
            }
            RuntimeEvent::AccountDisconnected => {
                self.address = None;
                self.balance = None;
                self.signed = None;
                self.nonce = NonceDisplay::Unknown;
                self.last_refresh_at = None;
                self.set_status("Disconnected", StatusLevel::Info);
            }
            RuntimeEvent::NonceUpdated(refresh) => {
                // a late scheduled result for a previous account is dropped
                if self.address.as_deref() != Some(refresh.address.as_str()) {
                    return;
                }
                if refresh.delta > 0 {
                    self.set_status(
                        format!("{} new transaction(s) observed", refresh.delta),
                        StatusLevel::Info,
                    );
                }
                self.last_refresh_at = Some(Instant::now());
                self.nonce = NonceDisplay::Loaded(refresh);
            }
            RuntimeEvent::NonceFailed { address, message } => {
                if address.is_some() && address == self.address {
                    self.nonce = NonceDisplay::Error(message.clone());
                }
                self.set_status(message, StatusLevel::Error);
            }
            RuntimeEvent::BalanceReady { address, balance } => {
                if self.address.as_deref() == Some(address.as_str()) {
                    self.balance = Some(balance);
                }
            }
            RuntimeEvent::Signed {
                address,
                message,
                signature,
            } => {
                if self.address.as_deref() == Some(address.as_str()) {
                    self.set_status("Message signed", StatusLevel::Info);
                    self.signed = Some(SignedMessage { message, signature });
                }
            }
            RuntimeEvent::GasQuoteReady(quote) => {
                self.calculator.quote = Some(quote);
            }
            RuntimeEvent::Error { message } => {
                self.set_status(message, StatusLevel::Error);
            }
        }
    }

    /// Apply a key action; returns the command to forward to the worker, if any
    pub fn apply_action(&mut self, action: Action) -> Option<RuntimeCommand> {
        match action {
            Action::None => None,
            Action::Connect => {
                self.set_status("Connecting account…", StatusLevel::Info);
                Some(RuntimeCommand::Connect { address: None })
            }
            Action::Disconnect => Some(RuntimeCommand::Disconnect),
            Action::RefreshNonce => {
                if !self.is_connected() {
                    self.set_status("Connect first.", StatusLevel::Warn);
                    return None;
                }
                Some(RuntimeCommand::RefreshNonce)
            }
            Action::FetchBalance => {
                if !self.is_connected() {
                    self.set_status("Connect first.", StatusLevel::Warn);
                    return None;
                }
                Some(RuntimeCommand::FetchBalance)
            }
            Action::SignMessage => {
                if !self.is_connected() {
                    self.set_status("Connect first.", StatusLevel::Warn);
                    return None;
                }
                Some(RuntimeCommand::SignMessage {
                    message: format!("tally sign, {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
                })
            }
            Action::QuoteGas => Some(self.quote_command()),
            Action::CycleChain => {
                self.calculator.chain = self.calculator.chain.next();
                self.calculator.quote = None;
                Some(self.quote_command())
            }
            Action::NextEndpoint => {
                if self.endpoints.len() < 2 {
                    self.set_status("No other endpoint configured", StatusLevel::Warn);
                    return None;
                }
                self.endpoint_index = (self.endpoint_index + 1) % self.endpoints.len();
                self.endpoint = self.endpoints[self.endpoint_index].clone();
                self.provider_ready = false;
                self.chain_id = None;
                self.set_status(format!("Switching to {}…", self.endpoint), StatusLevel::Info);
                Some(RuntimeCommand::SwitchEndpoint {
                    index: self.endpoint_index,
                })
            }
            Action::Export(format) => {
                let notify = match self.store.as_ref() {
                    Some(store) => export::export_account(store, self.address.as_deref(), format),
                    None => Action::Notify("State store unavailable".to_string(), NotifyLevel::Error),
                };
                self.apply_action(notify)
            }
            Action::ToggleHelp => {
                self.help_open = !self.help_open;
                None
            }
            Action::Notify(text, level) => {
                self.set_status(text, level.into());
                None
            }
            Action::Quit => {
                self.should_quit = true;
                Some(RuntimeCommand::Shutdown)
            }
        }
    }

    fn quote_command(&self) -> RuntimeCommand {
        RuntimeCommand::QuoteGas {
            chain: self.calculator.chain,
            gas_limit: self.calculator.gas_limit,
            amount: self.calculator.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(
            DataMode::Rpc,
            Duration::from_secs(30),
            CalculatorState::from(&CalculatorConfig::default()),
        )
    }

    fn refresh(address: &str, nonce: u64, delta: u64) -> Refresh {
        Refresh {
            address: address.to_string(),
            current_nonce: nonce,
            delta,
            day: "2024-03-01".to_string(),
            today_count: delta,
            history: vec![("2024-03-01".to_string(), delta)],
        }
    }

    #[test]
    fn test_refresh_requires_connection() {
        let mut app = app();
        assert!(app.apply_action(Action::RefreshNonce).is_none());
        assert_eq!(app.status_text().map(|(t, _)| t), Some("Connect first."));
    }

    #[test]
    fn test_nonce_events_follow_active_account() {
        let mut app = app();
        app.apply_event(RuntimeEvent::AccountConnected {
            address: "0xa".to_string(),
        });
        app.apply_event(RuntimeEvent::NonceUpdated(refresh("0xa", 9, 2)));
        assert!(matches!(app.nonce, NonceDisplay::Loaded(ref r) if r.current_nonce == 9));
        assert_eq!(app.history_counts(), vec![2]);

        // switching accounts clears the panel and ignores stale results
        app.apply_event(RuntimeEvent::AccountConnected {
            address: "0xb".to_string(),
        });
        assert_eq!(app.nonce, NonceDisplay::Unknown);
        app.apply_event(RuntimeEvent::NonceUpdated(refresh("0xa", 10, 1)));
        assert_eq!(app.nonce, NonceDisplay::Unknown);
    }

    #[test]
    fn test_nonce_failure_marks_panel() {
        let mut app = app();
        app.apply_event(RuntimeEvent::AccountConnected {
            address: "0xa".to_string(),
        });
        app.apply_event(RuntimeEvent::NonceFailed {
            address: Some("0xa".to_string()),
            message: "rpc request failed: boom".to_string(),
        });
        assert!(matches!(app.nonce, NonceDisplay::Error(_)));
        assert_eq!(app.status_text().map(|(_, l)| l), Some(StatusLevel::Error));
    }

    #[test]
    fn test_cycle_chain_requests_new_quote() {
        let mut app = app();
        let cmd = app.apply_action(Action::CycleChain);
        assert!(matches!(
            cmd,
            Some(RuntimeCommand::QuoteGas {
                chain: Chain::Polygon,
                ..
            })
        ));
    }

    #[test]
    fn test_next_endpoint_wraps() {
        let mut app = app();
        assert!(app.apply_action(Action::NextEndpoint).is_none());

        app.endpoints = vec!["http://a".to_string(), "http://b".to_string()];
        let cmd = app.apply_action(Action::NextEndpoint);
        assert!(matches!(cmd, Some(RuntimeCommand::SwitchEndpoint { index: 1 })));
        assert_eq!(app.endpoint, "http://b");
        let cmd = app.apply_action(Action::NextEndpoint);
        assert!(matches!(cmd, Some(RuntimeCommand::SwitchEndpoint { index: 0 })));
    }

    #[test]
    fn test_sign_requires_connection_and_keeps_result() {
        let mut app = app();
        assert!(app.apply_action(Action::SignMessage).is_none());
        assert_eq!(app.status_text().map(|(t, _)| t), Some("Connect first."));

        app.apply_event(RuntimeEvent::AccountConnected {
            address: "0xa".to_string(),
        });
        let Some(RuntimeCommand::SignMessage { message }) = app.apply_action(Action::SignMessage)
        else {
            panic!("expected a sign command");
        };
        assert!(message.starts_with("tally sign, "));

        app.apply_event(RuntimeEvent::Signed {
            address: "0xa".to_string(),
            message: message.clone(),
            signature: "0x1b".to_string(),
        });
        assert_eq!(
            app.signed,
            Some(SignedMessage {
                message,
                signature: "0x1b".to_string(),
            })
        );

        app.apply_event(RuntimeEvent::AccountDisconnected);
        assert_eq!(app.signed, None);
    }

    #[test]
    fn test_disconnect_clears_account() {
        let mut app = app();
        app.apply_event(RuntimeEvent::AccountConnected {
            address: "0xa".to_string(),
        });
        app.apply_event(RuntimeEvent::BalanceReady {
            address: "0xa".to_string(),
            balance: "1.000000 ETH".to_string(),
        });
        assert_eq!(app.balance.as_deref(), Some("1.000000 ETH"));
        app.apply_event(RuntimeEvent::AccountDisconnected);
        assert!(!app.is_connected());
        assert_eq!(app.balance, None);
    }
}
