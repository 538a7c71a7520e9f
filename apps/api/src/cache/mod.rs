// Analytics cache: TTL entries, lazy expiry, substring/tag invalidation.
// `AnalyticsCache` is the in-process store; `RedisCache` is the shared one.
// Both sit behind `CacheStore`; handlers reach it through `SharedCache::cached`.

pub mod key;
pub mod redis_store;
pub mod store;
pub mod strategy;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub use key::CacheKey;
pub use redis_store::RedisCache;
pub use store::{CacheStore, SharedCache};
pub use strategy::{should_serve_stale, CacheStrategy};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub ttl_seconds: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl_seconds: u64) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
            ttl_seconds,
            tags: vec![],
        }
    }

    pub fn for_strategy(data: T, strategy: CacheStrategy) -> Self {
        let policy = strategy.policy();
        Self {
            tags: policy.tags.iter().map(|t| t.to_string()).collect(),
            ..Self::new(data, policy.ttl_seconds)
        }
    }

    /// Expired once strictly more than `ttl_seconds` have elapsed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.timestamp).num_milliseconds() > self.ttl_seconds as i64 * 1000
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// In-process cache. Values are held as JSON so one instance can serve every
/// result type; a value that no longer decodes as the requested type is a miss.
///
/// Per-key operations are serialised by the map's shard locks.
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    entries: DashMap<String, CacheEntry<Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the value if present and fresh. Expired entries are removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            debug!(key, "cache entry expired");
            self.record(false);
            return None;
        }

        let value = self.entries.get(key).and_then(|entry| {
            T::deserialize(&entry.data)
                .map_err(|e| warn!(key, error = %e, "cached value has unexpected shape"))
                .ok()
        });
        self.record(value.is_some());
        value
    }

    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl_seconds: u64) {
        self.put(key, data, |value| CacheEntry::new(value, ttl_seconds));
    }

    pub fn set_with_strategy<T: Serialize>(&self, key: &str, data: &T, strategy: CacheStrategy) {
        self.put(key, data, |value| CacheEntry::for_strategy(value, strategy));
    }

    fn put<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        entry: impl FnOnce(Value) -> CacheEntry<Value>,
    ) {
        match serde_json::to_value(data) {
            Ok(value) => self.insert_entry(key, entry(value)),
            Err(e) => warn!(key, error = %e, "value is not cacheable"),
        }
    }

    pub fn insert_entry(&self, key: &str, entry: CacheEntry<Value>) {
        self.entries.insert(key.to_string(), entry);
    }

    /// Returns the entry even when expired, without evicting it. Callers use
    /// this together with `should_serve_stale` to serve during revalidation.
    pub fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.get(key)?;
        let data = T::deserialize(&entry.data).ok()?;
        Some(CacheEntry {
            data,
            timestamp: entry.timestamp,
            ttl_seconds: entry.ttl_seconds,
            tags: entry.tags.clone(),
        })
    }

    /// Deletes every key containing `pattern`. Returns how many were removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        self.remove_where(|key, _| key.contains(pattern))
    }

    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.remove_where(|_, entry| entry.tags.iter().any(|t| t == tag))
    }

    fn remove_where(&self, mut predicate: impl FnMut(&str, &CacheEntry<Value>) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, entry| {
            let remove = predicate(key, entry);
            if remove {
                removed += 1;
            }
            !remove
        });
        removed
    }

    /// Returns the raw entry while it is fresh or inside `grace_seconds` of
    /// its expiry. Anything older is removed on the spot.
    pub fn fetch_within(&self, key: &str, grace_seconds: u64) -> Option<CacheEntry<Value>> {
        let now = Utc::now();
        let removed = self.entries.remove_if(key, |_, entry| {
            let retained_ms = (entry.ttl_seconds + grace_seconds) as i64 * 1000;
            (now - entry.timestamp).num_milliseconds() > retained_ms
        });
        if removed.is_some() {
            debug!(key, "cache entry past grace evicted");
            self.record(false);
            return None;
        }
        let entry = self.entries.get(key).map(|e| e.value().clone());
        self.record(entry.as_ref().is_some_and(|e| !e.is_expired_at(now)));
        entry
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        metric: String,
        value: f64,
    }

    #[test]
    fn test_round_trip_returns_exact_value() {
        let cache = AnalyticsCache::new();
        let sample = Sample {
            metric: "codeQuality".to_string(),
            value: 0.1 + 0.2,
        };
        cache.set("k", &sample, 60);
        assert_eq!(cache.get::<Sample>("k"), Some(sample));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = AnalyticsCache::new();
        cache.set("k", &42u32, 1);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(cache.get::<u32>("k"), None);
        assert!(cache.is_empty(), "expired entry should be evicted on access");
    }

    #[test]
    fn test_missing_key_and_wrong_type_are_misses() {
        let cache = AnalyticsCache::new();
        assert_eq!(cache.get::<u32>("nope"), None);
        cache.set("k", &"text", 60);
        assert_eq!(cache.get::<u32>("k"), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_invalidate_by_substring() {
        let cache = AnalyticsCache::new();
        cache.set("growth:alice:commits", &1, 60);
        cache.set("growth:bob:commits", &2, 60);
        cache.set("trajectory:alice", &3, 60);
        assert_eq!(cache.invalidate("alice"), 2);
        assert_eq!(cache.get::<i32>("growth:bob:commits"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_by_tag() {
        let cache = AnalyticsCache::new();
        cache.set_with_strategy("a", &1, CacheStrategy::Profile);
        cache.set_with_strategy("b", &2, CacheStrategy::GithubStats);
        cache.set_with_strategy("c", &3, CacheStrategy::Profile);
        assert_eq!(cache.invalidate_tag("profile"), 2);
        assert_eq!(cache.get::<i32>("b"), Some(2));
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = AnalyticsCache::new();
        cache.set("a", &1, 60);
        cache.set("b", &2, 60);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_peek_keeps_expired_entries() {
        let cache = AnalyticsCache::new();
        let mut entry = CacheEntry::new(serde_json::json!(7), 60);
        entry.timestamp = Utc::now() - Duration::seconds(120);
        cache.insert_entry("old", entry);

        let peeked = cache.peek::<i32>("old").unwrap();
        assert_eq!(peeked.data, 7);
        assert!(peeked.is_expired());
        assert_eq!(cache.len(), 1);
        // get evicts
        assert_eq!(cache.get::<i32>("old"), None);
        assert!(cache.peek::<i32>("old").is_none());
    }

    #[test]
    fn test_strategy_entries_carry_tags_and_ttl() {
        let entry = CacheEntry::for_strategy(1, CacheStrategy::SearchResults);
        assert_eq!(entry.ttl_seconds, 180);
        assert_eq!(entry.tags, vec!["search".to_string()]);
    }

    #[test]
    fn test_fetch_evicts_entries_past_grace() {
        let cache = AnalyticsCache::new();
        let now = Utc::now();
        let mut gone = CacheEntry::new(serde_json::json!(1), 60);
        gone.timestamp = now - Duration::seconds(200);
        let mut grace = CacheEntry::new(serde_json::json!(2), 60);
        grace.timestamp = now - Duration::seconds(100);
        cache.insert_entry("gone", gone);
        cache.insert_entry("grace", grace);

        assert!(cache.fetch_within("gone", 120).is_none());
        assert!(cache.peek::<i32>("gone").is_none(), "evicted on access");

        let stale = cache.fetch_within("grace", 120).unwrap();
        assert_eq!(stale.data, serde_json::json!(2));
        assert!(stale.is_expired());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_keys() {
        let cache = Arc::new(AnalyticsCache::new());
        std::thread::scope(|scope| {
            for t in 0..8 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for i in 0..100 {
                        cache.set(&format!("k:{t}:{i}"), &(t * 1000 + i), 60);
                        cache.set("shared", &i, 60);
                        let _ = cache.get::<i32>("shared");
                    }
                });
            }
        });
        assert_eq!(cache.len(), 8 * 100 + 1);
        assert_eq!(cache.get::<i32>("k:3:42"), Some(3042));
        assert!(cache.get::<i32>("shared").is_some());
    }
}
