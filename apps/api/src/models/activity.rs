use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One snapshot of a user's activity metrics, as delivered by the GitHub sync
/// job or the stats table. Metric names are free-form ("commits", "stars", ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryPoint {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl HistoryPoint {
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            date,
            metrics: HashMap::new(),
        }
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub merged: bool,
    /// Number of reviews the pull request went through.
    #[serde(default)]
    pub review_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryRoleKind {
    Contributor,
    Maintainer,
    Owner,
}

impl RepositoryRoleKind {
    /// Leadership weight of holding this role on one repository.
    pub fn weight(self) -> f64 {
        match self {
            RepositoryRoleKind::Contributor => 0.25,
            RepositoryRoleKind::Maintainer => 1.0,
            RepositoryRoleKind::Owner => 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRole {
    pub repository: String,
    pub role: RepositoryRoleKind,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTimelineEntry {
    pub skill: String,
    pub acquired_at: DateTime<Utc>,
    /// 0 – 100
    #[serde(default)]
    pub proficiency: f64,
}
