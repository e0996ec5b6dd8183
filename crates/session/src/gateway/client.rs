use std::sync::Arc;

use common::ApiEnvelope;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::auth::domain::{AuthResponse, Session};
use crate::auth::errors::AuthError;
use crate::context::SessionContext;
use crate::errors::StorageError;
use crate::observability;
use crate::token_store::TokenStore;

const UNAUTHORIZED: u16 = 401;

/// Refresh/expiry settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub refresh_path: String,
    pub refresh_header: String,
    pub expiry_leeway_secs: i64,
    /// Serialize refreshes and let callers with a stale token reuse the
    /// session another caller just obtained.
    pub single_flight_refresh: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh-token".into(),
            refresh_header: "x-refresh-token".into(),
            expiry_leeway_secs: 0,
            single_flight_refresh: false,
        }
    }
}

impl From<&configs::AuthConfig> for GatewayConfig {
    fn from(cfg: &configs::AuthConfig) -> Self {
        Self {
            refresh_path: cfg.refresh_path.clone(),
            refresh_header: cfg.refresh_header.clone(),
            expiry_leeway_secs: cfg.expiry_leeway_secs,
            single_flight_refresh: cfg.single_flight_refresh,
        }
    }
}

/// Pass-through API client that keeps the access token fresh.
///
/// * Before sending, an expired access token is refreshed once and the new
///   token attached as `Authorization: Bearer`.
/// * A 401 triggers exactly one refresh-and-retry; a second 401 ends the
///   session.
/// * No HTTP response at all ends the session and reports
///   [`AuthError::BackendUnreachable`]. There is no backoff.
///
/// Concurrent callers may each refresh unless `single_flight_refresh` is set;
/// the token store is last-writer-wins.
pub struct ApiGateway {
    transport: Arc<dyn HttpTransport>,
    store: TokenStore,
    context: Arc<SessionContext>,
    cfg: GatewayConfig,
    refresh_lock: Mutex<()>,
}

impl ApiGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: TokenStore,
        context: Arc<SessionContext>,
        cfg: GatewayConfig,
    ) -> Self {
        Self {
            transport,
            store,
            context,
            cfg,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.cfg
    }

    /// Send a request and return the raw response for any status except an
    /// unrecoverable 401.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        if request.public {
            return self.dispatch(request).await;
        }

        let token = self.token_for_request().await?;
        let response = self.dispatch(with_bearer(request.clone(), token.as_deref())).await?;
        if response.status != UNAUTHORIZED {
            return Ok(response);
        }
        let Some(stale) = token else {
            debug!("401 without a session; nothing to refresh");
            return Err(AuthError::Unauthorized);
        };

        debug!(event = "unauthorized", "401 received; refreshing once before retry");
        let fresh = self.refresh_from(Some(&stale)).await?;
        observability::RETRIES_TOTAL.inc();
        let retried = self.dispatch(with_bearer(request, Some(&fresh.access_token))).await?;
        if retried.status == UNAUTHORIZED {
            warn!(event = "unauthorized_after_refresh", "retry rejected again; ending session");
            self.end_session().await;
            return Err(AuthError::Unauthorized);
        }
        Ok(retried)
    }

    /// Send and unwrap the `{ success, message, data }` envelope into `T`.
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, AuthError> {
        let response = self.send(request).await?;
        let data = unwrap_envelope(response)?;
        serde_json::from_value(data).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.call(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        self.call(ApiRequest::post(path).json(encode_body(body)?)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        self.call(ApiRequest::put(path).json(encode_body(body)?)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.call(ApiRequest::delete(path)).await
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// Both tokens are replaced in one store write. Any failure clears the
    /// session; a refresh is never retried.
    pub async fn refresh(&self) -> Result<Session, AuthError> {
        self.refresh_from(None).await
    }

    /// Forget the stored session and reset the context.
    ///
    /// With `single_flight_refresh` this waits for an in-flight refresh to
    /// finish first, so its result cannot land after the clear. Without it a
    /// concurrent refresh may still write its session afterwards.
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        let _guard = if self.cfg.single_flight_refresh {
            Some(self.refresh_lock.lock().await)
        } else {
            None
        };
        let cleared = self.store.clear().await;
        self.context.clear();
        cleared
    }

    async fn token_for_request(&self) -> Result<Option<String>, AuthError> {
        let Some(session) = self.store.read().await else {
            return Ok(None);
        };
        if !session.is_expired(self.cfg.expiry_leeway_secs) {
            return Ok(Some(session.access_token));
        }
        debug!(
            event = "token_expired",
            expires_at = ?session.expires_at(),
            "refreshing before request"
        );
        let fresh = self.refresh_from(Some(&session.access_token)).await?;
        Ok(Some(fresh.access_token))
    }

    async fn refresh_from(&self, stale: Option<&str>) -> Result<Session, AuthError> {
        if !self.cfg.single_flight_refresh {
            return self.perform_refresh().await;
        }

        let _guard = self.refresh_lock.lock().await;
        if let (Some(stale), Some(current)) = (stale, self.store.read().await) {
            let replaced = current.access_token != stale;
            if replaced && !current.is_expired(self.cfg.expiry_leeway_secs) {
                debug!(
                    event = "refresh_coalesced",
                    "token already replaced by a concurrent refresh"
                );
                return Ok(current);
            }
        }
        self.perform_refresh().await
    }

    async fn perform_refresh(&self) -> Result<Session, AuthError> {
        observability::REFRESH_TOTAL.inc();
        let current = match self.store.read().await {
            Some(s) if !s.refresh_token.trim().is_empty() => s,
            _ => return Err(self.refresh_failed("no refresh token stored".into()).await),
        };

        let request = ApiRequest::post(self.cfg.refresh_path.as_str())
            .public()
            .header(self.cfg.refresh_header.as_str(), current.refresh_token.as_str());
        let response = self.dispatch(request).await?;

        let auth = match unwrap_envelope(response).and_then(AuthResponse::from_value) {
            Ok(auth) => auth,
            Err(e) => return Err(self.refresh_failed(e.to_string()).await),
        };

        let auth_data = if auth.has_user() {
            Some(auth.raw.clone())
        } else {
            current.auth_data
        };
        let session = Session {
            access_token: auth.access_token,
            refresh_token: auth.refresh_token.unwrap_or(current.refresh_token),
            auth_data,
        };
        if let Err(e) = self.store.save(&session).await {
            // the in-memory map already holds the new pair
            warn!(
                event = "session_persist_failed",
                error = %e,
                "refreshed session not written to disk"
            );
        }
        self.context.set(session.user());
        info!(
            event = "token_refreshed",
            expires_at = ?session.expires_at(),
            "access token refreshed"
        );
        Ok(session)
    }

    async fn refresh_failed(&self, reason: String) -> AuthError {
        observability::REFRESH_FAILURES_TOTAL.inc();
        warn!(event = "refresh_failed", %reason, "ending session");
        self.end_session().await;
        AuthError::RefreshFailed(reason)
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        match self.transport.send(request).await {
            Ok(response) => {
                debug!(status = response.status, "response received");
                Ok(response)
            }
            Err(e) => {
                observability::BACKEND_UNAVAILABLE_TOTAL.inc();
                warn!(
                    event = "backend_unreachable",
                    error = %e,
                    "no response from backend; ending session"
                );
                self.clear_store().await;
                self.context.mark_unavailable();
                Err(e.into())
            }
        }
    }

    async fn end_session(&self) {
        self.clear_store().await;
        self.context.clear();
    }

    async fn clear_store(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(
                event = "session_clear_failed",
                error = %e,
                "could not clear stored session"
            );
        }
    }
}

fn with_bearer(mut request: ApiRequest, token: Option<&str>) -> ApiRequest {
    request.headers.retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
    if let Some(token) = token {
        request.headers.push(("Authorization".into(), format!("Bearer {token}")));
    }
    request
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, AuthError> {
    serde_json::to_value(body).map_err(|e| AuthError::InvalidRequest(e.to_string()))
}

/// Turn a response into its `data` payload, or the server's message as an
/// [`AuthError::Api`]. A successful envelope without `data` yields `Null`.
pub fn unwrap_envelope(response: ApiResponse) -> Result<Value, AuthError> {
    let status = response.status;
    let ok = response.is_success();
    match serde_json::from_value::<ApiEnvelope<Value>>(response.body) {
        Ok(env) if ok && env.success => Ok(env.data.unwrap_or(Value::Null)),
        Ok(env) => Err(AuthError::Api {
            status,
            message: env.message_or(&default_message(status)),
        }),
        Err(e) if ok => Err(AuthError::InvalidResponse(format!(
            "response is not an envelope: {e}"
        ))),
        Err(_) => Err(AuthError::Api {
            status,
            message: default_message(status),
        }),
    }
}

fn default_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {status}"))
}
