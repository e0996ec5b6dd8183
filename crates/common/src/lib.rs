//! Shared building blocks for the portal crates: the backend response
//! envelope, logging bootstrap and small runtime helpers.

pub mod types;
pub mod utils;
pub mod env;

pub use types::ApiEnvelope;
