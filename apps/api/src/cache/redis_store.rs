//! Redis-backed `CacheStore` for deployments running more than one API instance.
//!
//! Entries are JSON-encoded `CacheEntry<Value>` under `<prefix>:<key>`, with a
//! Redis expiry of TTL + grace so stale entries remain readable for revalidation.
//! Tag membership is tracked in one Redis set per tag.

use anyhow::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::store::CacheStore;
use crate::cache::CacheEntry;

pub struct RedisCache {
    client: redis::Client,
    prefix: String,
}

/// Escapes Redis glob metacharacters so a pattern matches literally.
fn escape_glob(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl RedisCache {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn tag_set(&self, tag: &str) -> String {
        format!("{}#tag#{}", self.prefix, tag)
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn try_fetch(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(self.namespaced(key)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn try_store(&self, key: &str, entry: &CacheEntry<Value>, retain_seconds: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(entry)?;
        let full_key = self.namespaced(key);
        let retain = retain_seconds.max(entry.ttl_seconds).max(1);

        let _: () = redis::cmd("SET")
            .arg(&full_key)
            .arg(payload)
            .arg("EX")
            .arg(retain)
            .query_async(&mut conn)
            .await?;

        for tag in &entry.tags {
            let set_key = self.tag_set(tag);
            let _: () = redis::cmd("SADD")
                .arg(&set_key)
                .arg(&full_key)
                .query_async(&mut conn)
                .await?;
            let _: () = redis::cmd("EXPIRE")
                .arg(&set_key)
                .arg(retain)
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, conn: &mut MultiplexedConnection, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: usize = redis::cmd("DEL").arg(keys).query_async(conn).await?;
        Ok(removed)
    }

    /// Cursor-based SCAN so a large keyspace never blocks the server.
    async fn scan_keys(&self, conn: &mut MultiplexedConnection, glob: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut iter = conn.scan_match::<_, String>(glob).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn try_invalidate(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.connection().await?;
        let glob = format!("{}:*{}*", escape_glob(&self.prefix), escape_glob(pattern));
        let keys = self.scan_keys(&mut conn, &glob).await?;
        self.delete(&mut conn, &keys).await
    }

    async fn try_invalidate_tag(&self, tag: &str) -> Result<usize> {
        let mut conn = self.connection().await?;
        let set_key = self.tag_set(tag);
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(&set_key)
            .query_async(&mut conn)
            .await?;
        let removed = self.delete(&mut conn, &members).await?;
        self.delete(&mut conn, &[set_key]).await?;
        Ok(removed)
    }

    async fn try_clear(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let prefix = escape_glob(&self.prefix);
        let mut keys = self.scan_keys(&mut conn, &format!("{prefix}:*")).await?;
        keys.extend(self.scan_keys(&mut conn, &format!("{prefix}#tag#*")).await?);
        self.delete(&mut conn, &keys).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    /// Redis drops entries itself once TTL + grace has passed.
    async fn fetch(&self, key: &str, _grace_seconds: u64) -> Option<CacheEntry<Value>> {
        match self.try_fetch(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "redis cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, key: &str, entry: CacheEntry<Value>, retain_seconds: u64) {
        if let Err(e) = self.try_store(key, &entry, retain_seconds).await {
            warn!(key, error = %e, "redis cache write failed");
        }
    }

    async fn invalidate(&self, pattern: &str) -> usize {
        match self.try_invalidate(pattern).await {
            Ok(removed) => {
                debug!(pattern, removed, "redis cache invalidated");
                removed
            }
            Err(e) => {
                warn!(pattern, error = %e, "redis cache invalidation failed");
                0
            }
        }
    }

    async fn invalidate_tag(&self, tag: &str) -> usize {
        match self.try_invalidate_tag(tag).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(tag, error = %e, "redis tag invalidation failed");
                0
            }
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!(error = %e, "redis cache clear failed");
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_cache() -> RedisCache {
        // nothing listens on port 1
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        RedisCache::new(client, "analytics")
    }

    #[test]
    fn test_glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
        assert_eq!(escape_glob("growth:alice"), "growth:alice");
    }

    #[test]
    fn test_key_layout() {
        let cache = unreachable_cache();
        assert_eq!(cache.namespaced("growth:alice"), "analytics:growth:alice");
        assert_eq!(cache.tag_set("profile"), "analytics#tag#profile");
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades_to_miss() {
        let cache = unreachable_cache();
        assert!(cache.fetch("growth:alice", 30).await.is_none());
        cache
            .store("growth:alice", CacheEntry::new(serde_json::json!(1), 60), 60)
            .await;
        assert_eq!(cache.invalidate("alice").await, 0);
        assert_eq!(cache.invalidate_tag("profile").await, 0);
        cache.clear().await;
        assert_eq!(cache.backend(), "redis");
    }
}
