//! Domain layer - account nonce tracking, session lifecycle and fee math

pub mod gas;
pub mod nonce;
pub mod session;
pub mod units;

pub use gas::{Chain, FeeQuote};
pub use session::{SessionError, WalletSession};
