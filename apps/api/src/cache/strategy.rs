//! Named cache presets: TTL, stale-while-revalidate grace and invalidation tags.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CacheStrategy {
    Realtime,
    Standard,
    Static,
    Permanent,
    Profile,
    GithubStats,
    SearchResults,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl_seconds: u64,
    pub stale_while_revalidate_seconds: Option<u64>,
    pub tags: &'static [&'static str],
}

impl CacheStrategy {
    pub const ALL: [CacheStrategy; 8] = [
        CacheStrategy::Realtime,
        CacheStrategy::Standard,
        CacheStrategy::Static,
        CacheStrategy::Permanent,
        CacheStrategy::Profile,
        CacheStrategy::GithubStats,
        CacheStrategy::SearchResults,
        CacheStrategy::Session,
    ];

    pub fn policy(self) -> CachePolicy {
        let (ttl_seconds, stale_while_revalidate_seconds, tags): (u64, Option<u64>, &'static [&'static str]) =
            match self {
                CacheStrategy::Realtime => (60, Some(30), &[]),
                CacheStrategy::Standard => (300, Some(60), &[]),
                CacheStrategy::Static => (3600, Some(300), &[]),
                CacheStrategy::Permanent => (86_400, Some(3600), &[]),
                CacheStrategy::Profile => (600, Some(120), &["profile"]),
                CacheStrategy::GithubStats => (1800, Some(300), &["github"]),
                CacheStrategy::SearchResults => (180, Some(60), &["search"]),
                CacheStrategy::Session => (3600, None, &[]),
            };
        CachePolicy {
            ttl_seconds,
            stale_while_revalidate_seconds,
            tags,
        }
    }

    pub fn ttl_seconds(self) -> u64 {
        self.policy().ttl_seconds
    }

    /// Stale-while-revalidate window; 0 when the strategy never serves stale.
    pub fn grace_seconds(self) -> u64 {
        self.policy().stale_while_revalidate_seconds.unwrap_or(0)
    }

    /// How long a backend should physically keep an entry: TTL plus grace.
    pub fn retention_seconds(self) -> u64 {
        self.ttl_seconds() + self.grace_seconds()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheStrategy::Realtime => "realtime",
            CacheStrategy::Standard => "standard",
            CacheStrategy::Static => "static",
            CacheStrategy::Permanent => "permanent",
            CacheStrategy::Profile => "profile",
            CacheStrategy::GithubStats => "githubStats",
            CacheStrategy::SearchResults => "searchResults",
            CacheStrategy::Session => "session",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown cache strategy '{s}'"))
    }
}

/// True when an entry written at `timestamp` is past its TTL but still inside
/// the strategy's stale-while-revalidate grace window.
pub fn should_serve_stale(timestamp: DateTime<Utc>, strategy: CacheStrategy) -> bool {
    should_serve_stale_at(timestamp, strategy, Utc::now())
}

pub fn should_serve_stale_at(
    timestamp: DateTime<Utc>,
    strategy: CacheStrategy,
    now: DateTime<Utc>,
) -> bool {
    let policy = strategy.policy();
    let Some(grace) = policy.stale_while_revalidate_seconds else {
        return false;
    };
    let age_ms = (now - timestamp).num_milliseconds();
    let ttl_ms = policy.ttl_seconds as i64 * 1000;
    age_ms > ttl_ms && age_ms <= ttl_ms + grace as i64 * 1000
}
