use std::str::FromStr;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => bail!("CACHE_BACKEND must be 'memory' or 'redis', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if a value is present but invalid.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub cache_backend: CacheBackend,
    pub redis_url: Option<String>,
    pub cache_key_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cache_backend = lookup("CACHE_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .parse::<CacheBackend>()?;

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        if cache_backend == CacheBackend::Redis && redis_url.is_none() {
            bail!("Required environment variable 'REDIS_URL' is not set (CACHE_BACKEND=redis)");
        }

        Ok(Config {
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            cache_backend,
            redis_url,
            cache_key_prefix: lookup("CACHE_KEY_PREFIX").unwrap_or_else(|| "analytics".to_string()),
        })
    }
}
