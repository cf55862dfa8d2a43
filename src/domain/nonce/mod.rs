//! Nonce tracking: per-day transaction counts derived from the account nonce

mod day;
mod scheduler;
mod state;
mod tracker;

pub use day::{day_key, DayClock, FixedDayClock, LocalDayClock};
pub use scheduler::{AutoRefreshScheduler, DEFAULT_REFRESH_INTERVAL};
pub use state::AccountNonceState;
pub use tracker::{NonceTracker, Refresh, TrackerError, DEFAULT_HISTORY_DAYS};
