//! Match Scorer: bounded 0–100 compatibility between a candidate and a job posting.
//!
//! Algorithm:
//! 1. skill_score      = |candidate ∩ job| / |job| × 50   (0 when the job lists no skills)
//! 2. experience_score = 30 − 5 × |years − 3|, floored at 0
//! 3. talent_score     = talentScore / 100 × 20            (0 when absent)
//! 4. score            = round(Σ), clamped to 0–100
//!
//! Each component is clamped to its own weight before summation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::candidate::{Candidate, CandidateSearch, JobPosting};

pub const SKILL_WEIGHT: f64 = 50.0;
pub const EXPERIENCE_WEIGHT: f64 = 30.0;
pub const TALENT_WEIGHT: f64 = 20.0;
/// Reference experience level every candidate is measured against.
pub const IDEAL_EXPERIENCE_YEARS: f64 = 3.0;
pub const EXPERIENCE_PENALTY_PER_YEAR: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub score: u32, // 0 – 100
    pub skill_score: f64,
    pub experience_score: f64,
    pub talent_score: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub breakdown: MatchBreakdown,
}

fn normalize(skill: &str) -> String {
    skill.trim().to_lowercase()
}

fn normalized_set(skills: &BTreeSet<String>) -> BTreeSet<String> {
    skills
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

pub fn match_candidate_to_job(candidate: &Candidate, job: &JobPosting) -> u32 {
    score_match(candidate, job).score
}

pub fn score_match(candidate: &Candidate, job: &JobPosting) -> MatchBreakdown {
    let candidate_skills = normalized_set(&candidate.skills);
    let job_skills = normalized_set(&job.skills);

    let (matched_skills, missing_skills): (Vec<String>, Vec<String>) = job_skills
        .iter()
        .cloned()
        .partition(|s| candidate_skills.contains(s));

    let skill_score = if job_skills.is_empty() {
        0.0
    } else {
        (matched_skills.len() as f64 / job_skills.len() as f64 * SKILL_WEIGHT)
            .clamp(0.0, SKILL_WEIGHT)
    };

    let deviation = (finite_or_zero(candidate.experience) - IDEAL_EXPERIENCE_YEARS).abs();
    let experience_score = (EXPERIENCE_WEIGHT - deviation * EXPERIENCE_PENALTY_PER_YEAR)
        .clamp(0.0, EXPERIENCE_WEIGHT);

    let talent_score = candidate
        .talent_score
        .map(|t| (finite_or_zero(t).clamp(0.0, 100.0) / 100.0 * TALENT_WEIGHT))
        .unwrap_or(0.0);

    let total = skill_score + experience_score + talent_score;
    let score = total.round().clamp(0.0, 100.0) as u32;

    MatchBreakdown {
        score,
        skill_score,
        experience_score,
        talent_score,
        matched_skills,
        missing_skills,
    }
}

/// True when the candidate passes every supplied criterion.
pub fn matches_search(candidate: &Candidate, search: &CandidateSearch) -> bool {
    let wanted: Vec<String> = search
        .skills
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect();
    if !wanted.is_empty() {
        let has = normalized_set(&candidate.skills);
        if !wanted.iter().any(|s| has.contains(s)) {
            return false;
        }
    }

    if let Some(min) = search.min_experience {
        if candidate.experience < min {
            return false;
        }
    }
    if let Some(max) = search.max_experience {
        if candidate.experience > max {
            return false;
        }
    }
    if let Some(min) = search.min_talent_score {
        match candidate.talent_score {
            Some(score) if score >= min => {}
            _ => return false,
        }
    }
    true
}

pub fn filter_candidates(candidates: &[Candidate], search: &CandidateSearch) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| matches_search(c, search))
        .cloned()
        .collect()
}

/// Filters, scores and sorts candidates best-first (ties broken by id).
pub fn rank_candidates(
    job: &JobPosting,
    candidates: &[Candidate],
    search: &CandidateSearch,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = filter_candidates(candidates, search)
        .into_iter()
        .map(|candidate| RankedCandidate {
            breakdown: score_match(&candidate, job),
            candidate,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.breakdown
            .score
            .cmp(&a.breakdown.score)
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(skills: &[&str]) -> BTreeSet<String> {
        skills.iter().map(|s| s.to_string()).collect()
    }

    fn candidate(id: &str, skills: &[&str], experience: f64, talent: Option<f64>) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: None,
            skills: set(skills),
            experience,
            talent_score: talent,
        }
    }

    fn job(skills: &[&str]) -> JobPosting {
        JobPosting {
            id: "job-1".to_string(),
            title: "Rust Engineer".to_string(),
            skills: set(skills),
        }
    }

    #[test]
    fn test_perfect_match_scores_100() {
        let c = candidate("a", &["rust", "postgres"], 3.0, Some(100.0));
        let j = job(&["rust", "postgres"]);
        assert_eq!(match_candidate_to_job(&c, &j), 100);
    }

    #[test]
    fn test_posting_experience_does_not_move_the_ideal() {
        let c = candidate("a", &["rust"], 3.0, Some(100.0));
        let j: JobPosting =
            serde_json::from_str(r#"{"id":"job-2","skills":["rust"],"experience":5}"#).unwrap();
        assert_eq!(match_candidate_to_job(&c, &j), 100);
        let senior = candidate("b", &["rust"], 5.0, Some(100.0));
        assert_eq!(score_match(&senior, &j).experience_score, 20.0);
    }

    #[test]
    fn test_empty_skills_score_from_other_terms() {
        let c = candidate("a", &[], 3.0, Some(50.0));
        let j = job(&[]);
        let breakdown = score_match(&c, &j);
        assert_eq!(breakdown.skill_score, 0.0);
        assert_eq!(breakdown.score, 40);
    }

    #[test]
    fn test_partial_overlap_is_case_insensitive() {
        let c = candidate("a", &["Rust", " Go "], 3.0, None);
        let j = job(&["rust", "go", "kafka", "sql"]);
        let breakdown = score_match(&c, &j);
        assert_eq!(breakdown.skill_score, 25.0);
        assert_eq!(breakdown.matched_skills, vec!["go", "rust"]);
        assert_eq!(breakdown.missing_skills, vec!["kafka", "sql"]);
        assert_eq!(breakdown.score, 55);
    }

    #[test]
    fn test_experience_penalty_floors_at_zero() {
        let j = job(&[]);
        assert_eq!(score_match(&candidate("a", &[], 5.0, None), &j).experience_score, 20.0);
        assert_eq!(score_match(&candidate("a", &[], 1.0, None), &j).experience_score, 20.0);
        assert_eq!(score_match(&candidate("a", &[], 30.0, None), &j).experience_score, 0.0);
    }

    #[test]
    fn test_score_always_bounded() {
        let inputs = [
            candidate("a", &["x"], f64::NAN, Some(f64::INFINITY)),
            candidate("b", &[], -10.0, Some(-50.0)),
            candidate("c", &["x", "y"], 1e12, Some(1e9)),
        ];
        let jobs = [job(&["x"]), job(&[]), job(&["x", "y", "z"])];
        for c in &inputs {
            for j in &jobs {
                let score = match_candidate_to_job(c, j);
                assert!(score <= 100, "score {score} for {c:?} / {j:?}");
            }
        }
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let c = candidate("a", &["rust", "go"], 4.5, Some(72.0));
        let j = job(&["rust", "typescript"]);
        assert_eq!(match_candidate_to_job(&c, &j), match_candidate_to_job(&c, &j));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let pool = vec![
            candidate("a", &["rust"], 2.0, Some(80.0)),
            candidate("b", &["go"], 5.0, Some(90.0)),
            candidate("c", &["rust", "go"], 6.0, None),
            candidate("d", &["python"], 4.0, Some(95.0)),
        ];
        let search = CandidateSearch {
            skills: vec!["RUST".to_string(), "go".to_string()],
            min_experience: Some(2.0),
            max_experience: Some(5.0),
            min_talent_score: Some(80.0),
        };
        let ids: Vec<String> = filter_candidates(&pool, &search)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_search_keeps_everyone() {
        let pool = vec![
            candidate("a", &[], 0.0, None),
            candidate("b", &["go"], 10.0, Some(1.0)),
        ];
        assert_eq!(filter_candidates(&pool, &CandidateSearch::default()).len(), 2);
    }

    #[test]
    fn test_rank_orders_best_first() {
        let j = job(&["rust", "sql"]);
        let pool = vec![
            candidate("weak", &["java"], 10.0, None),
            candidate("strong", &["rust", "sql"], 3.0, Some(90.0)),
            candidate("mid", &["rust"], 4.0, Some(50.0)),
        ];
        let ranked = rank_candidates(&j, &pool, &CandidateSearch::default());
        let ids: Vec<&str> = ranked.iter().map(|r| r.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["strong", "mid", "weak"]);
        assert_eq!(ranked[0].breakdown.score, 98);
    }
}
