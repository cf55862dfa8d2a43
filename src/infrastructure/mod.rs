//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Alloy-based wallet provider and an in-process mock provider
//! - Tokio runtime bridge for async operations

pub mod ethereum;
pub mod runtime;
