use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    /// Years of professional experience.
    #[serde(default)]
    pub experience: f64,
    /// Talent Protocol builder score, 0 – 100.
    #[serde(default)]
    pub talent_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobPosting {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
}

/// Conjunctive candidate filter. Absent criteria impose no constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateSearch {
    /// Candidate must have at least one of these skills (when non-empty).
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub min_experience: Option<f64>,
    #[serde(default)]
    pub max_experience: Option<f64>,
    #[serde(default)]
    pub min_talent_score: Option<f64>,
}
