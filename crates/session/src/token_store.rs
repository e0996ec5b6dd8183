//! Durable persistence of the current session under the `token`,
//! `refreshToken` and `authData` keys.

use std::{path::PathBuf, sync::Arc};

use serde_json::Value;
use tracing::debug;

use crate::auth::domain::Session;
use crate::errors::StorageError;
use crate::observability;
use crate::storage::json_map_store::JsonMapStore;

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const AUTH_DATA_KEY: &str = "authData";

/// Session persistence. Clones share the same underlying map.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<JsonMapStore<String, Value>>,
}

impl TokenStore {
    /// Open the store at `path`. An unusable path degrades to an in-memory
    /// store, which reads as empty after a restart.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            backend: JsonMapStore::open_or_memory(path).await,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: JsonMapStore::in_memory(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_persistent()
    }

    /// Overwrite all three keys in a single mutation.
    pub async fn save(&self, session: &Session) -> Result<(), StorageError> {
        self.backend
            .update_map(|map| {
                map.insert(
                    TOKEN_KEY.to_string(),
                    Value::String(session.access_token.clone()),
                );
                map.insert(
                    REFRESH_TOKEN_KEY.to_string(),
                    Value::String(session.refresh_token.clone()),
                );
                match &session.auth_data {
                    Some(data) => {
                        map.insert(AUTH_DATA_KEY.to_string(), data.clone());
                    }
                    None => {
                        map.remove(AUTH_DATA_KEY);
                    }
                }
            })
            .await?;
        debug!(event = "session_saved", expires_at = ?session.expires_at(), "session persisted");
        Ok(())
    }

    /// The stored session, or `None` when either token is absent.
    pub async fn read(&self) -> Option<Session> {
        self.backend
            .read_map(|map| {
                let access = map.get(TOKEN_KEY)?.as_str()?.to_string();
                let refresh = map.get(REFRESH_TOKEN_KEY)?.as_str()?.to_string();
                Some(Session {
                    access_token: access,
                    refresh_token: refresh,
                    auth_data: map.get(AUTH_DATA_KEY).filter(|v| !v.is_null()).cloned(),
                })
            })
            .await
    }

    pub async fn access_token(&self) -> Option<String> {
        self.read().await.map(|s| s.access_token)
    }

    /// Remove all session keys.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.backend
            .update_map(|map| {
                map.remove(TOKEN_KEY);
                map.remove(REFRESH_TOKEN_KEY);
                map.remove(AUTH_DATA_KEY);
            })
            .await?;
        observability::SESSIONS_CLEARED_TOTAL.inc();
        debug!(event = "session_cleared", "session removed from store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("token_store_{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn save_then_read_returns_same_pair() -> anyhow::Result<()> {
        let store = TokenStore::in_memory();
        store.save(&Session::new("A", "B")).await?;
        assert_eq!(store.read().await, Some(Session::new("A", "B")));
        Ok(())
    }

    #[tokio::test]
    async fn clear_then_read_is_empty() -> anyhow::Result<()> {
        let store = TokenStore::in_memory();
        store.save(&Session::new("A", "B").with_auth_data(json!({"user": {"id": 1}}))).await?;
        store.clear().await?;
        assert_eq!(store.read().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn never_saved_reads_empty() {
        assert_eq!(TokenStore::in_memory().read().await, None);
    }

    #[tokio::test]
    async fn save_without_auth_data_drops_old_envelope() -> anyhow::Result<()> {
        let store = TokenStore::in_memory();
        store.save(&Session::new("A", "B").with_auth_data(json!({"token": "A"}))).await?;
        store.save(&Session::new("C", "D")).await?;
        let read = store.read().await.unwrap();
        assert_eq!(read.access_token, "C");
        assert_eq!(read.auth_data, None);
        Ok(())
    }

    #[tokio::test]
    async fn session_survives_reopen() -> anyhow::Result<()> {
        let path = tmp_path();
        let store = TokenStore::open(&path).await;
        assert!(store.is_persistent());
        let session = Session::new("A", "B")
            .with_auth_data(json!({"token": "A", "user": {"email": "a@b.in"}}));
        store.save(&session).await?;

        let reopened = TokenStore::open(&path).await;
        assert_eq!(reopened.read().await, Some(session));

        // the file uses the documented key names
        let raw: serde_json::Value = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
        assert_eq!(raw[TOKEN_KEY], "A");
        assert_eq!(raw[REFRESH_TOKEN_KEY], "B");
        assert!(raw[AUTH_DATA_KEY].is_object());

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn half_written_file_reads_empty() -> anyhow::Result<()> {
        let path = tmp_path();
        tokio::fs::write(&path, br#"{"token": "A"}"#).await?;
        let store = TokenStore::open(&path).await;
        assert_eq!(store.read().await, None);
        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }
}
