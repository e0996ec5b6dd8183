//! Explicitly owned in-memory session state.
//!
//! One `SessionContext` is created at bootstrap and shared by `Arc` with the
//! gateway, the initializer and the services. Updates swap the whole state
//! atomically; readers always see a consistent status/user pair.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::user::NormalizedUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup has not finished yet.
    Uninitialized,
    /// Backend reachable, nobody logged in.
    Anonymous,
    Authenticated,
    /// Backend unreachable or the session could not be recovered.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub user: Option<NormalizedUser>,
}

pub struct SessionContext {
    state: ArcSwap<SessionState>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(SessionState {
                status: SessionStatus::Uninitialized,
                user: None,
            }),
        }
    }

    pub fn set(&self, user: NormalizedUser) {
        debug!(event = "context_set", user = %user.display_name(), "session user set");
        self.state.store(Arc::new(SessionState {
            status: SessionStatus::Authenticated,
            user: Some(user),
        }));
    }

    /// Logged out but the backend is reachable.
    pub fn clear(&self) {
        self.state.store(Arc::new(SessionState {
            status: SessionStatus::Anonymous,
            user: None,
        }));
    }

    pub fn mark_unavailable(&self) {
        self.state.store(Arc::new(SessionState {
            status: SessionStatus::Unavailable,
            user: None,
        }));
    }

    pub fn snapshot(&self) -> Arc<SessionState> {
        self.state.load_full()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.load().status
    }

    pub fn current_user(&self) -> Option<NormalizedUser> {
        self.state.load().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }
}
