use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::claims;
use super::errors::AuthError;
use crate::user::rules::{self, ExtractionRule};
use crate::user::{normalize, NormalizedUser};

const ACCESS_TOKEN: ExtractionRule = ExtractionRule {
    field: "token",
    paths: &[
        "token",
        "accessToken",
        "access_token",
        "tokens.accessToken",
        "tokens.access_token",
        "jwt",
    ],
};

const REFRESH_TOKEN: ExtractionRule = ExtractionRule {
    field: "refreshToken",
    paths: &["refreshToken", "refresh_token", "tokens.refreshToken", "tokens.refresh_token"],
};

const USER_PAYLOAD: ExtractionRule = ExtractionRule {
    field: "user",
    paths: &["user", "userData", "user_data", "profile", "data.user"],
};

/// Login input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Token pair plus the raw auth envelope it came from.
///
/// This is the unit the token store persists; the three fields map onto the
/// `token`, `refreshToken` and `authData` keys.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_data: Option<Value>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at())
            .field("has_auth_data", &self.auth_data.is_some())
            .finish()
    }
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            auth_data: None,
        }
    }

    pub fn with_auth_data(mut self, auth_data: Value) -> Self {
        self.auth_data = Some(auth_data);
        self
    }

    /// Expiry derived from the access token's `exp` claim.
    pub fn expires_at(&self) -> Option<i64> {
        claims::expires_at(&self.access_token)
    }

    pub fn is_expired(&self, leeway_secs: i64) -> bool {
        claims::is_expired_now(&self.access_token, leeway_secs)
    }

    /// User derived from the stored envelope, or from the access-token
    /// claims when no envelope was stored.
    pub fn user(&self) -> NormalizedUser {
        match &self.auth_data {
            Some(auth_data) => derive_user(auth_data),
            None => claims::decode_claims(&self.access_token)
                .map(|claims| normalize(&claims, None))
                .unwrap_or_default(),
        }
    }
}

/// Normalize the user embedded in an auth envelope; the envelope itself is
/// the fallback source.
pub fn derive_user(auth_data: &Value) -> NormalizedUser {
    match rules::first_value(&[auth_data], &USER_PAYLOAD) {
        Some(user) if user.is_object() => normalize(user, Some(auth_data)),
        _ => normalize(auth_data, None),
    }
}

/// Backend auth envelope data: the token pair and an optional user payload.
/// Read-only; kept verbatim as `raw` for persistence.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub raw: Value,
}

impl AuthResponse {
    pub fn from_value(raw: Value) -> Result<Self, AuthError> {
        let access_token = rules::first_string(&[&raw], &ACCESS_TOKEN).ok_or_else(|| {
            AuthError::InvalidResponse("auth response carries no access token".into())
        })?;
        let refresh_token = rules::first_string(&[&raw], &REFRESH_TOKEN);
        Ok(Self {
            access_token,
            refresh_token,
            raw,
        })
    }

    pub fn has_user(&self) -> bool {
        rules::first_value(&[&self.raw], &USER_PAYLOAD).is_some_and(Value::is_object)
    }

    pub fn user(&self) -> NormalizedUser {
        derive_user(&self.raw)
    }
}

/// Result of a successful login or token-bearing registration.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: NormalizedUser,
    pub session: Session,
}
