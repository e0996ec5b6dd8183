//! TTL cache for autocomplete lookups (client names, GSTINs, ...).

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::auth::service::LogoutHook;
use crate::observability;

#[derive(Debug, Clone)]
pub struct SearchCacheConfig {
    pub ttl: Duration,
    pub max_capacity: u64,
    /// Shorter queries are never cached.
    pub min_query_len: usize,
}

impl Default for SearchCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_capacity: 1000,
            min_query_len: 2,
        }
    }
}

impl From<&configs::CacheConfig> for SearchCacheConfig {
    fn from(cfg: &configs::CacheConfig) -> Self {
        Self {
            ttl: cfg.search_ttl(),
            max_capacity: cfg.search_max_capacity,
            min_query_len: cfg.search_min_query_len,
        }
    }
}

/// Search results keyed by `(scope, query)`; the query is trimmed and
/// lowercased. Clones share entries.
#[derive(Clone)]
pub struct SearchCache<V> {
    inner: Cache<(String, String), V>,
    min_query_len: usize,
}

impl<V> SearchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(cfg: &SearchCacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(cfg.max_capacity)
            .time_to_live(cfg.ttl)
            .build();
        Self {
            inner,
            min_query_len: cfg.min_query_len,
        }
    }

    /// Return the cached result for `query` or await `fetch` and cache its
    /// `Ok` value. `fetch` receives the trimmed query.
    pub async fn get_or_fetch<F, Fut, E>(&self, scope: &str, query: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let trimmed = query.trim();
        if trimmed.chars().count() < self.min_query_len {
            return fetch(trimmed.to_string()).await;
        }

        let key = (scope.to_string(), trimmed.to_lowercase());
        if let Some(hit) = self.inner.get(&key).await {
            observability::SEARCH_CACHE_HITS_TOTAL.inc();
            debug!(event = "search_cache_hit", scope, "served from cache");
            return Ok(hit);
        }

        observability::SEARCH_CACHE_MISSES_TOTAL.inc();
        let value = fetch(trimmed.to_string()).await?;
        self.inner.insert(key, value.clone()).await;
        Ok(value)
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    #[cfg(test)]
    async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl<V> LogoutHook for SearchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn on_logout(&self) {
        debug!(event = "search_cache_cleared", "dropping cached searches");
        self.invalidate_all();
    }
}
