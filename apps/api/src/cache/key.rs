use std::fmt::Display;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

pub const KEY_DELIMITER: char = ':';
/// Leading bytes of the SHA-256 kept in a key (32 hex chars).
const DIGEST_BYTES: usize = 16;

/// Deterministic cache key: namespace followed by ordered parameters.
///
/// ```text
/// CacheKey::new("growth").param(user).param("commits,stars").build()
///   == "growth:<user>:commits,stars"
/// ```
#[derive(Debug, Clone)]
pub struct CacheKey {
    parts: Vec<String>,
}

impl CacheKey {
    pub fn new(namespace: &str) -> Self {
        Self {
            parts: vec![namespace.to_string()],
        }
    }

    /// Delimiters inside a parameter are escaped so distinct parameter lists
    /// can never collide.
    pub fn param(mut self, value: impl Display) -> Self {
        let raw = value.to_string();
        self.parts
            .push(raw.replace('%', "%25").replace(KEY_DELIMITER, "%3A"));
        self
    }

    /// Appends a SHA-256 fingerprint of `value`'s JSON form, so two payloads
    /// share a key only when their content is identical. Maps are hashed with
    /// sorted keys. A value that cannot be encoded gets a random fingerprint
    /// and therefore never hits.
    pub fn digest<T: Serialize + ?Sized>(self, value: &T) -> Self {
        let canonical = serde_json::to_value(value).and_then(|v| serde_json::to_vec(&v));
        let fingerprint = match canonical {
            Ok(bytes) => hex::encode(&Sha256::digest(&bytes)[..DIGEST_BYTES]),
            Err(e) => {
                warn!(error = %e, "cache key payload is not serialisable");
                Uuid::new_v4().simple().to_string()
            }
        };
        self.param(fingerprint)
    }

    pub fn build(self) -> String {
        self.parts.join(&KEY_DELIMITER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_params_same_key() {
        let a = CacheKey::new("growth").param("alice").param(12).build();
        let b = CacheKey::new("growth").param("alice").param(12).build();
        assert_eq!(a, b);
        assert_eq!(a, "growth:alice:12");
    }

    #[test]
    fn test_order_matters() {
        let a = CacheKey::new("m").param("x").param("y").build();
        let b = CacheKey::new("m").param("y").param("x").build();
        assert_ne!(a, b);
    }

    #[test]
    fn test_delimiter_is_escaped() {
        let a = CacheKey::new("m").param("a:b").build();
        let b = CacheKey::new("m").param("a").param("b").build();
        assert_ne!(a, b);
        assert_eq!(a, "m:a%3Ab");
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = CacheKey::new("growth").digest(&vec![1.0, 2.0, 3.0]).build();
        let b = CacheKey::new("growth").digest(&vec![1.0, 2.0, 3.0]).build();
        let c = CacheKey::new("growth").digest(&vec![30.0, 20.0, 10.0]).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), "growth:".len() + 2 * DIGEST_BYTES);
    }

    #[test]
    fn test_digest_ignores_map_iteration_order() {
        let mut first = std::collections::HashMap::new();
        let mut second = std::collections::HashMap::new();
        for (k, v) in [("commits", 1.0), ("stars", 2.0), ("reviews", 3.0)] {
            first.insert(k, v);
        }
        for (k, v) in [("reviews", 3.0), ("stars", 2.0), ("commits", 1.0)] {
            second.insert(k, v);
        }
        assert_eq!(
            CacheKey::new("m").digest(&first).build(),
            CacheKey::new("m").digest(&second).build()
        );
    }
}
