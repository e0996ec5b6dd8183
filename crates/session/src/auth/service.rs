use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::domain::{derive_user, AuthResponse, AuthSession, LoginInput, RegisterInput, Session};
use super::errors::AuthError;
use crate::context::SessionContext;
use crate::gateway::client::unwrap_envelope;
use crate::gateway::{ApiGateway, ApiRequest};
use crate::user::{normalize, NormalizedUser};

/// Endpoints used by the auth service
#[derive(Debug, Clone)]
pub struct AuthPaths {
    pub login_path: String,
    pub register_path: String,
    pub profile_path: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            login_path: "/auth/authenticate".into(),
            register_path: "/auth/register".into(),
            profile_path: "/users/profile".into(),
        }
    }
}

impl From<&configs::AuthConfig> for AuthPaths {
    fn from(cfg: &configs::AuthConfig) -> Self {
        Self {
            login_path: cfg.login_path.clone(),
            register_path: cfg.register_path.clone(),
            profile_path: cfg.profile_path.clone(),
        }
    }
}

/// Something that holds per-user data and must forget it on logout.
pub trait LogoutHook: Send + Sync {
    fn on_logout(&self);
}

/// Login, registration and profile calls layered on the gateway.
pub struct AuthService {
    gateway: Arc<ApiGateway>,
    paths: AuthPaths,
    hooks: RwLock<Vec<Arc<dyn LogoutHook>>>,
}

impl AuthService {
    pub fn new(gateway: Arc<ApiGateway>, paths: AuthPaths) -> Self {
        Self {
            gateway,
            paths,
            hooks: RwLock::new(Vec::new()),
        }
    }

    fn context(&self) -> &SessionContext {
        self.gateway.context()
    }

    /// Run `hook` on every subsequent logout.
    pub fn on_logout(&self, hook: Arc<dyn LogoutHook>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(hook);
        }
    }

    /// Authenticate with email and password and establish the session.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use serde_json::json;
    /// use session::auth::{domain::LoginInput, service::{AuthPaths, AuthService}};
    /// use session::context::SessionContext;
    /// use session::gateway::{ApiGateway, ApiResponse, GatewayConfig};
    /// use session::gateway::transport::mock::MockTransport;
    /// use session::token_store::TokenStore;
    ///
    /// let transport = Arc::new(MockTransport::new(|_| {
    ///     Ok(ApiResponse::new(200, json!({
    ///         "success": true,
    ///         "data": {"token": "A", "refreshToken": "B", "user": {"email": "owner@example.com"}}
    ///     })))
    /// }));
    /// let gateway = Arc::new(ApiGateway::new(
    ///     transport,
    ///     TokenStore::in_memory(),
    ///     Arc::new(SessionContext::new()),
    ///     GatewayConfig::default(),
    /// ));
    /// let auth = AuthService::new(gateway, AuthPaths::default());
    /// let input = LoginInput {
    ///     email: "owner@example.com".into(),
    ///     password: "secret".into(),
    /// };
    /// let session = tokio_test::block_on(auth.login(input)).unwrap();
    /// assert_eq!(session.user.email.as_deref(), Some("owner@example.com"));
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let body = encode(&input)?;
        let data = self.public_post(&self.paths.login_path, body).await?;
        let auth = AuthResponse::from_value(data)?;
        let session = self.establish(auth).await?;
        info!(event = "login", user = %session.user.display_name(), "user_logged_in");
        Ok(session)
    }

    /// Create an account. Backends that log the new user in straight away
    /// return tokens, in which case the session is established too.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<Option<AuthSession>, AuthError> {
        let body = encode(&input)?;
        let data = self.public_post(&self.paths.register_path, body).await?;
        match AuthResponse::from_value(data) {
            Ok(auth) => {
                let session = self.establish(auth).await?;
                info!(
                    event = "register",
                    user = %session.user.display_name(),
                    "user_registered_and_logged_in"
                );
                Ok(Some(session))
            }
            Err(_) => {
                info!(event = "register", "user_registered");
                Ok(None)
            }
        }
    }

    /// Clear the stored session, reset the context and run the logout hooks.
    ///
    /// Unless `single_flight_refresh` is enabled, a refresh that is already
    /// in flight can still store its session after this returns.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        let cleared = self.gateway.sign_out().await;
        if let Ok(hooks) = self.hooks.read() {
            hooks.iter().for_each(|h| h.on_logout());
        }
        cleared?;
        info!(event = "logout", "user_logged_out");
        Ok(())
    }

    /// Load the profile and refresh the in-memory user.
    #[instrument(skip(self))]
    pub async fn fetch_profile(&self) -> Result<NormalizedUser, AuthError> {
        let profile: Value = self.gateway.get(&self.paths.profile_path).await?;
        Ok(self.apply_profile(&profile).await)
    }

    /// Send a partial profile update; the returned profile becomes the current user.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, patch: &Value) -> Result<NormalizedUser, AuthError> {
        let profile: Value = self.gateway.put(&self.paths.profile_path, patch).await?;
        Ok(self.apply_profile(&profile).await)
    }

    pub fn current_user(&self) -> Option<NormalizedUser> {
        self.context().current_user()
    }

    async fn public_post(&self, path: &str, body: Value) -> Result<Value, AuthError> {
        let request = ApiRequest::post(path).public().json(body);
        let response = self.gateway.send(request).await?;
        unwrap_envelope(response)
    }

    async fn establish(&self, auth: AuthResponse) -> Result<AuthSession, AuthError> {
        if auth.refresh_token.is_none() {
            warn!(
                event = "missing_refresh_token",
                "auth response has no refresh token; session cannot be renewed"
            );
        }
        let user = auth.user();
        let session = Session {
            access_token: auth.access_token,
            refresh_token: auth.refresh_token.unwrap_or_default(),
            auth_data: Some(auth.raw),
        };
        if let Err(e) = self.gateway.store().save(&session).await {
            warn!(event = "session_persist_failed", error = %e, "login not completed");
            // drop the pair from memory too; a failed clear only logs
            if let Err(e) = self.gateway.store().clear().await {
                debug!(event = "session_clear_failed", error = %e);
            }
            self.context().clear();
            return Err(e.into());
        }
        self.context().set(user.clone());
        Ok(AuthSession { user, session })
    }

    async fn apply_profile(&self, profile: &Value) -> NormalizedUser {
        let envelope = self.gateway.store().read().await.and_then(|s| s.auth_data);
        let user = match (profile.is_object(), envelope.as_ref()) {
            (true, envelope) => normalize(profile, envelope),
            (false, Some(envelope)) => derive_user(envelope),
            (false, None) => NormalizedUser::default(),
        };
        debug!(event = "profile_loaded", user = %user.display_name());
        self.context().set(user.clone());
        user
    }
}

fn encode<T: Serialize>(input: &T) -> Result<Value, AuthError> {
    serde_json::to_value(input).map_err(|e| AuthError::InvalidRequest(e.to_string()))
}
