//! Actions produced by key handling for the app to apply

use crate::modules::export::ExportFormat;

/// What a key press asks the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No action needed
    None,

    /// Connect the configured, remembered or first node account
    Connect,

    /// Drop the active account
    Disconnect,

    /// Refresh the nonce now
    RefreshNonce,

    /// Fetch the active account's balance
    FetchBalance,

    /// Sign a timestamped demo message with the active account
    SignMessage,

    /// Fetch the gas price and recompute the fee estimate
    QuoteGas,

    /// Switch the calculator to the next chain
    CycleChain,

    /// Reconnect through the next configured endpoint
    NextEndpoint,

    /// Write the account's daily counts to disk
    Export(ExportFormat),

    ToggleHelp,

    /// Show notification in status bar
    Notify(String, NotifyLevel),

    /// Request quit
    Quit,
}

/// Notification levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}
