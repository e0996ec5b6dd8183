//! Session and token lifecycle for the billing portal client.
//!
//! [`bootstrap::Portal`] wires the pieces together:
//! - [`token_store::TokenStore`] persists the token pair and auth envelope.
//! - [`gateway::ApiGateway`] attaches the access token, refreshes it when
//!   expired and retries once after a 401.
//! - [`initializer::SessionInitializer`] restores the session at startup.
//! - [`user::normalize`] turns backend user payloads into [`user::NormalizedUser`].

pub mod auth;
pub mod bootstrap;
pub mod context;
pub mod errors;
pub mod gateway;
pub mod initializer;
pub mod observability;
pub mod search_cache;
pub mod storage;
pub mod token_store;
pub mod user;

pub use auth::{AuthError, AuthService};
pub use context::{SessionContext, SessionStatus};
pub use gateway::{ApiGateway, ApiRequest};
pub use initializer::{InitOutcome, SessionInitializer};
pub use search_cache::SearchCache;
pub use token_store::TokenStore;
pub use user::NormalizedUser;
