//! Feature modules that act on the app state outside the async worker
//!
//! Modules:
//! - export: daily counts to CSV / JSON files

pub mod export;
