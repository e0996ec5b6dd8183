//! Auth module: token claims, session domain types, errors and the auth
//! service (login, register, logout, profile).

pub mod claims;
pub mod domain;
pub mod errors;
pub mod service;

pub use errors::AuthError;
pub use service::AuthService;
