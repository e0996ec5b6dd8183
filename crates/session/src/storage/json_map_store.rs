use std::{collections::HashMap, hash::Hash, path::PathBuf, sync::Arc};
use tokio::{fs, sync::RwLock};
use tracing::warn;

use crate::errors::StorageError;

/// Generic JSON file-backed key-value map store.
///
/// Persists a `HashMap<K, V>` to a JSON file. Every mutation goes through
/// [`JsonMapStore::update_map`], which holds the write lock for the whole
/// mutation, so readers observe either the old map or the new one.
///
/// A store without a file path keeps the map in memory only.
pub struct JsonMapStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
    file_path: Option<PathBuf>,
}

impl<K, V> JsonMapStore<K, V>
where
    K: Eq + Hash + serde::Serialize + serde::de::DeserializeOwned + Clone,
    V: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    /// Initialize the store from a path. Creates the file with an empty map if missing.
    /// An unparsable file is treated as empty and overwritten on the next save.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, StorageError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let map: HashMap<K, V> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(
                    path = %file_path.display(),
                    error = %e,
                    "corrupt store file; starting empty"
                );
                HashMap::new()
            }),
            Err(_) => {
                let empty: HashMap<K, V> = HashMap::new();
                fs::write(&file_path, serde_json::to_vec(&empty)?).await?;
                empty
            }
        };

        Ok(Arc::new(Self {
            inner: RwLock::new(map),
            file_path: Some(file_path),
        }))
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(HashMap::new()),
            file_path: None,
        })
    }

    /// Open `path`, falling back to an in-memory store when the file cannot be used.
    pub async fn open_or_memory<P: Into<PathBuf>>(path: P) -> Arc<Self> {
        let path = path.into();
        match Self::new(&path).await {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "store unavailable; keeping state in memory"
                );
                Self::in_memory()
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.file_path.is_some()
    }

    async fn save(&self, map: &HashMap<K, V>) -> Result<(), StorageError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let data = serde_json::to_vec(map)?;
        fs::write(path, data).await?;
        Ok(())
    }

    /// Get value by key.
    pub async fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().await;
        map.get(key).cloned()
    }

    /// Run `f` against a consistent snapshot of the map.
    pub async fn read_map<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&HashMap<K, V>) -> R,
    {
        let map = self.inner.read().await;
        f(&map)
    }

    /// Apply a mutation to the underlying map and persist atomically.
    ///
    /// The write lock is held until the file is written, so concurrent
    /// mutations are serialized and the last writer wins. The in-memory map
    /// keeps the mutation even when the file write fails.
    pub async fn update_map<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut HashMap<K, V>),
    {
        let mut map = self.inner.write().await;
        f(&mut map);
        self.save(&map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_map_store_update_persists() -> Result<(), anyhow::Error> {
        let tmp =
            std::env::temp_dir().join(format!("json_map_store_{}.json", uuid::Uuid::new_v4()));
        let store = JsonMapStore::<String, String>::new(&tmp).await?;
        assert!(store.is_persistent());

        // initially empty
        assert_eq!(store.read_map(|m| m.len()).await, 0);

        store
            .update_map(|m| {
                m.insert("a".into(), "1".into());
                m.insert("b".into(), "2".into());
            })
            .await?;
        assert_eq!(store.get(&"a".into()).await.as_deref(), Some("1"));

        store
            .update_map(|m| {
                m.remove("b");
            })
            .await?;

        // reload persistence
        let reloaded = JsonMapStore::<String, String>::new(&tmp).await?;
        assert_eq!(reloaded.read_map(|m| m.len()).await, 1);
        assert_eq!(reloaded.get(&"a".into()).await.as_deref(), Some("1"));

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir()
            .join(format!("json_map_store_bad_{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, b"{not json").await?;
        let store = JsonMapStore::<String, String>::new(&tmp).await?;
        assert_eq!(store.read_map(|m| m.len()).await, 0);
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn unusable_path_falls_back_to_memory() -> Result<(), anyhow::Error> {
        // a regular file cannot act as a parent directory
        let blocker = std::env::temp_dir()
            .join(format!("json_map_store_blocker_{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&blocker, b"x").await?;
        let store =
            JsonMapStore::<String, String>::open_or_memory(blocker.join("session.json")).await;
        assert!(!store.is_persistent());

        store
            .update_map(|m| {
                m.insert("k".into(), "v".into());
            })
            .await?;
        assert_eq!(store.get(&"k".into()).await.as_deref(), Some("v"));

        let _ = tokio::fs::remove_file(&blocker).await;
        Ok(())
    }
}
