//! CacheStore: backend seam for the analytics cache, plus the cache-aside helper.
//!
//! `AppState` holds a `SharedCache`: an `Arc<dyn CacheStore>` chosen at startup
//! via `CACHE_BACKEND`, plus the set of keys currently being revalidated.
//! Backend failures never reach callers: they surface as misses.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::strategy::{should_serve_stale_at, CacheStrategy};
use crate::cache::{AnalyticsCache, CacheEntry};

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored entry while it is fresh or within `grace_seconds`
    /// of expiring. `None` on miss or backend failure.
    async fn fetch(&self, key: &str, grace_seconds: u64) -> Option<CacheEntry<Value>>;

    /// `retain_seconds` is how long the backend may keep the entry around
    /// for stale serving; it is at least the entry's TTL.
    async fn store(&self, key: &str, entry: CacheEntry<Value>, retain_seconds: u64);

    async fn invalidate(&self, pattern: &str) -> usize;

    async fn invalidate_tag(&self, tag: &str) -> usize;

    async fn clear(&self);

    fn backend(&self) -> &'static str;
}

#[async_trait]
impl CacheStore for AnalyticsCache {
    async fn fetch(&self, key: &str, grace_seconds: u64) -> Option<CacheEntry<Value>> {
        self.fetch_within(key, grace_seconds)
    }

    async fn store(&self, key: &str, entry: CacheEntry<Value>, _retain_seconds: u64) {
        self.insert_entry(key, entry);
    }

    async fn invalidate(&self, pattern: &str) -> usize {
        AnalyticsCache::invalidate(self, pattern)
    }

    async fn invalidate_tag(&self, tag: &str) -> usize {
        AnalyticsCache::invalidate_tag(self, tag)
    }

    async fn clear(&self) {
        AnalyticsCache::clear(self)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// A cache backend shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct SharedCache {
    store: Arc<dyn CacheStore>,
    /// Keys with a background refresh running.
    refreshing: Arc<DashMap<String, ()>>,
}

/// Clears a key's in-flight marker when its refresh task ends, even on panic.
struct RefreshGuard {
    refreshing: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.refreshing.remove(&self.key);
    }
}

impl SharedCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            refreshing: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    /// Cache-aside lookup with stale-while-revalidate.
    ///
    /// - fresh entry → returned as is
    /// - expired but inside the strategy's grace window → returned, and `compute`
    ///   runs on a background task to replace it (at most one task per key)
    /// - otherwise → `compute` runs inline and the result is stored
    pub async fn cached<T, F>(&self, key: &str, strategy: CacheStrategy, compute: F) -> T
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if let Some(entry) = self.store.fetch(key, strategy.grace_seconds()).await {
            let now = Utc::now();
            if !entry.is_expired_at(now) {
                match T::deserialize(&entry.data) {
                    Ok(value) => {
                        debug!(key, "cache hit");
                        return value;
                    }
                    Err(e) => warn!(key, error = %e, "discarding undecodable cache entry"),
                }
            } else if should_serve_stale_at(entry.timestamp, strategy, now) {
                if let Ok(stale) = T::deserialize(&entry.data) {
                    self.revalidate(key, strategy, compute);
                    return stale;
                }
            }
        }

        debug!(key, "cache miss");
        let value = compute();
        if let Some(entry) = encode(key, &value, strategy) {
            self.store
                .store(key, entry, strategy.retention_seconds())
                .await;
        }
        value
    }

    fn revalidate<T, F>(&self, key: &str, strategy: CacheStrategy, compute: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.refreshing.insert(key.to_string(), ()).is_some() {
            debug!(key, "serving stale entry, revalidation already running");
            return;
        }
        debug!(key, "serving stale entry while revalidating");

        let guard = RefreshGuard {
            refreshing: Arc::clone(&self.refreshing),
            key: key.to_string(),
        };
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let key = guard.key.clone();
            let fresh = encode(&key, &compute(), strategy);
            if let Some(entry) = fresh {
                store
                    .store(&key, entry, strategy.retention_seconds())
                    .await;
                debug!(key = %key, "background revalidation complete");
            }
            drop(guard);
        });
    }
}

fn encode<T: Serialize>(key: &str, value: &T, strategy: CacheStrategy) -> Option<CacheEntry<Value>> {
    serde_json::to_value(value)
        .map(|data| CacheEntry::for_strategy(data, strategy))
        .map_err(|e| warn!(key, error = %e, "result is not cacheable"))
        .ok()
}
