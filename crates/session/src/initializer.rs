//! Startup sequence: probe the backend, validate or refresh the stored
//! session, and publish the user to the [`SessionContext`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::errors::AuthError;
use crate::gateway::{ApiGateway, ApiRequest};
use crate::user::NormalizedUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    CheckingBackend,
    BackendUnavailable,
    TokenValid,
    TokenExpired,
    Ready,
}

#[derive(Debug)]
pub enum InitOutcome {
    /// Backend reachable; the user when a session was restored.
    Ready(Option<NormalizedUser>),
    Unavailable(AuthError),
}

impl InitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, InitOutcome::Ready(_))
    }
}

pub struct SessionInitializer {
    gateway: Arc<ApiGateway>,
    probe_path: String,
    probe_timeout: Duration,
    state: Mutex<InitState>,
}

impl SessionInitializer {
    pub fn new(
        gateway: Arc<ApiGateway>,
        probe_path: impl Into<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            probe_path: probe_path.into(),
            probe_timeout,
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    pub fn state(&self) -> InitState {
        self.state.lock().map(|s| *s).unwrap_or(InitState::Uninitialized)
    }

    fn transition(&self, next: InitState) {
        if let Ok(mut state) = self.state.lock() {
            debug!(event = "init_transition", from = ?*state, to = ?next);
            *state = next;
        }
    }

    /// Run the startup sequence. Safe to call again; every run starts from
    /// `Uninitialized`.
    pub async fn run(&self) -> InitOutcome {
        self.transition(InitState::Uninitialized);
        self.transition(InitState::CheckingBackend);
        if let Err(e) = self.probe().await {
            return self.unavailable(e).await;
        }

        let Some(session) = self.gateway.store().read().await else {
            self.transition(InitState::Ready);
            self.gateway.context().clear();
            info!(event = "session_ready", authenticated = false, "no stored session");
            return InitOutcome::Ready(None);
        };

        let user = if session.is_expired(self.gateway.config().expiry_leeway_secs) {
            self.transition(InitState::TokenExpired);
            match self.gateway.refresh().await {
                Ok(fresh) => fresh.user(),
                Err(e) => return self.unavailable(e).await,
            }
        } else {
            self.transition(InitState::TokenValid);
            session.user()
        };

        self.gateway.context().set(user.clone());
        self.transition(InitState::Ready);
        info!(
            event = "session_ready",
            authenticated = true,
            user = %user.display_name(),
            "session restored"
        );
        InitOutcome::Ready(Some(user))
    }

    async fn probe(&self) -> Result<(), AuthError> {
        let request = ApiRequest::get(self.probe_path.as_str())
            .public()
            .timeout(self.probe_timeout);
        match tokio::time::timeout(self.probe_timeout, self.gateway.send(request)).await {
            Ok(Ok(response)) => {
                debug!(event = "probe_ok", status = response.status);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AuthError::BackendUnreachable(format!(
                "probe timed out after {}ms",
                self.probe_timeout.as_millis()
            ))),
        }
    }

    async fn unavailable(&self, error: AuthError) -> InitOutcome {
        self.transition(InitState::BackendUnavailable);
        warn!(
            event = "session_unavailable",
            code = error.code(),
            error = %error,
            "startup could not establish a session"
        );
        if let Err(e) = self.gateway.store().clear().await {
            warn!(event = "session_clear_failed", error = %e);
        }
        self.gateway.context().mark_unavailable();
        InitOutcome::Unavailable(error)
    }
}
