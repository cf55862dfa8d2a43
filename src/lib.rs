//! Tally: per-account Ethereum nonce tracking with daily transaction counts
//!
//! Layers:
//! - domain: nonce bookkeeping, refresh scheduling, fee math
//! - store: persisted per-account state
//! - infrastructure: wallet providers and the Tokio runtime bridge
//! - app / ui: terminal front end

pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod modules;
pub mod store;
pub mod ui;
