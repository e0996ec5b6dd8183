use thiserror::Error;

use crate::errors::StorageError;
use crate::gateway::transport::TransportError;

/// Errors surfaced by the session layer and the gateway wrapper.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("backend unavailable: {0}")]
    BackendUnreachable(String),
    #[error("session expired or unauthorized")]
    Unauthorized,
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("request rejected ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::BackendUnreachable(_) => 2001,
            AuthError::Unauthorized => 2002,
            AuthError::RefreshFailed(_) => 2003,
            AuthError::Api { .. } => 2100,
            AuthError::InvalidResponse(_) => 2101,
            AuthError::InvalidRequest(_) => 2102,
            AuthError::Storage(_) => 2200,
        }
    }

    /// Whether the gateway clears the stored session when this error occurs.
    pub fn terminates_session(&self) -> bool {
        matches!(
            self,
            AuthError::BackendUnreachable(_) | AuthError::Unauthorized | AuthError::RefreshFailed(_)
        )
    }

    /// HTTP status carried by a passed-through backend rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        AuthError::BackendUnreachable(e.to_string())
    }
}
