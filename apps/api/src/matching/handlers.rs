use axum::{extract::State, Json};
use serde::Deserialize;

use crate::cache::{CacheKey, CacheStrategy};
use crate::errors::AppError;
use crate::matching::scorer::{rank_candidates, score_match, MatchBreakdown, RankedCandidate};
use crate::models::candidate::{Candidate, CandidateSearch, JobPosting};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub candidate: Candidate,
    pub job: JobPosting,
}

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub job: JobPosting,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub search: CandidateSearch,
}

/// POST /api/v1/match/score
pub async fn handle_score(Json(req): Json<ScoreRequest>) -> Json<MatchBreakdown> {
    Json(score_match(&req.candidate, &req.job))
}

/// POST /api/v1/match/candidates
/// Returns candidates passing `search`, best match first.
pub async fn handle_rank(
    State(state): State<AppState>,
    Json(req): Json<RankRequest>,
) -> Result<Json<Vec<RankedCandidate>>, AppError> {
    validate_search(&req.search)?;

    let key = ranking_key(&req);
    let ranked = state.cache.cached(&key, CacheStrategy::SearchResults, move || {
        rank_candidates(&req.job, &req.candidates, &req.search)
    })
    .await;

    Ok(Json(ranked))
}

fn validate_search(search: &CandidateSearch) -> Result<(), AppError> {
    if let (Some(min), Some(max)) = (search.min_experience, search.max_experience) {
        if min > max {
            return Err(AppError::Validation(format!(
                "min_experience ({min}) exceeds max_experience ({max})"
            )));
        }
    }
    Ok(())
}

/// The job id stays readable for pattern invalidation; everything the ranking
/// reads is fingerprinted.
fn ranking_key(req: &RankRequest) -> String {
    CacheKey::new("candidates")
        .param(&req.job.id)
        .digest(&(&req.job, &req.candidates, &req.search))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn set(skills: &[&str]) -> BTreeSet<String> {
        skills.iter().map(|s| s.to_string()).collect()
    }

    fn request(job_skills: &[&str], candidate_skills: &[&[&str]]) -> RankRequest {
        RankRequest {
            job: JobPosting {
                id: "job-1".to_string(),
                title: "Backend".to_string(),
                skills: set(job_skills),
            },
            candidates: candidate_skills
                .iter()
                .enumerate()
                .map(|(i, skills)| Candidate {
                    id: format!("c{i}"),
                    name: None,
                    skills: set(skills),
                    experience: 2.0,
                    talent_score: None,
                })
                .collect(),
            search: CandidateSearch::default(),
        }
    }

    #[test]
    fn test_inverted_experience_range_rejected() {
        let search = CandidateSearch {
            min_experience: Some(8.0),
            max_experience: Some(2.0),
            ..Default::default()
        };
        assert!(validate_search(&search).is_err());
        assert!(validate_search(&CandidateSearch::default()).is_ok());
    }

    #[test]
    fn test_ranking_key_tracks_job_requirements() {
        let rust = ranking_key(&request(&["rust"], &[&["rust"], &["python"]]));
        let python = ranking_key(&request(&["python"], &[&["rust"], &["python"]]));
        assert!(rust.starts_with("candidates:job-1:"));
        assert_ne!(rust, python);
    }

    #[test]
    fn test_ranking_key_tracks_candidate_profiles() {
        let before = ranking_key(&request(&["rust"], &[&["go"]]));
        let after = ranking_key(&request(&["rust"], &[&["go", "rust"]]));
        assert_ne!(before, after);
        assert_eq!(before, ranking_key(&request(&["rust"], &[&["go"]])));
    }
}
