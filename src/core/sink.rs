//! Display capability the session reports to

use std::sync::Mutex;

use crate::domain::nonce::Refresh;

/// Receives everything the wallet session wants shown.
///
/// Implementations decide how (or whether) to render; the session never
/// touches presentation directly.
pub trait DisplaySink: Send + Sync + 'static {
    fn show_connected(&self, address: &str);

    fn show_disconnected(&self);

    fn show_nonce(&self, refresh: &Refresh);

    fn show_error(&self, address: Option<&str>, message: &str);
}

/// What a [`RecordingSink`] has been shown, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Connected(String),
    Disconnected,
    Nonce(Refresh),
    Error(Option<String>, String),
}

/// Sink that keeps every call, for headless runs and tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn nonces(&self) -> Vec<Refresh> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Nonce(refresh) => Some(refresh),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Error(_, message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}

impl DisplaySink for RecordingSink {
    fn show_connected(&self, address: &str) {
        self.push(SinkEvent::Connected(address.to_string()));
    }

    fn show_disconnected(&self) {
        self.push(SinkEvent::Disconnected);
    }

    fn show_nonce(&self, refresh: &Refresh) {
        self.push(SinkEvent::Nonce(refresh.clone()));
    }

    fn show_error(&self, address: Option<&str>, message: &str) {
        self.push(SinkEvent::Error(
            address.map(str::to_string),
            message.to_string(),
        ));
    }
}
