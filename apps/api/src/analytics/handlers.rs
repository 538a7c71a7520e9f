use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::analytics::anomaly::{
    analyze_anomalies, AnomalyReport, DEFAULT_CHANGE_THRESHOLD, DEFAULT_OUTLIER_THRESHOLD,
};
use crate::analytics::career::{analyze_progression, CareerTrajectory, ProgressionData, Stage};
use crate::analytics::forecast::{
    predict_career_milestones, predict_growth, GrowthPrediction, MilestoneProjection,
};
use crate::analytics::series::MetricSeries;
use crate::cache::{CacheKey, CacheStrategy};
use crate::errors::AppError;
use crate::models::activity::HistoryPoint;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnomalyRequest {
    pub subject: String,
    pub metric: String,
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
    pub threshold: Option<f64>,
    pub change_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct GrowthRequest {
    pub subject: String,
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
    pub metrics: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneRequest {
    #[serde(default)]
    pub current_metrics: HashMap<String, f64>,
    pub growth_rate_percent: f64,
    pub current_stage: Stage,
}

#[derive(Debug, Deserialize)]
pub struct TrajectoryRequest {
    pub subject: String,
    #[serde(default)]
    pub data: ProgressionData,
}

/// POST /api/v1/analytics/anomalies
pub async fn handle_anomalies(
    State(state): State<AppState>,
    Json(req): Json<AnomalyRequest>,
) -> Result<Json<AnomalyReport>, AppError> {
    require_subject(&req.subject)?;
    let threshold = positive_or_default("threshold", req.threshold, DEFAULT_OUTLIER_THRESHOLD)?;
    let change_threshold = positive_or_default(
        "change_threshold",
        req.change_threshold,
        DEFAULT_CHANGE_THRESHOLD,
    )?;

    let key = history_key("anomalies", &req.subject, &[req.metric.as_str()], &req.history)
        .param(threshold)
        .param(change_threshold)
        .build();

    let report = state.cache.cached(&key, CacheStrategy::Realtime, move || {
        let series = MetricSeries::from_history(&req.history, &req.metric);
        analyze_anomalies(&series, threshold, change_threshold)
    })
    .await;

    Ok(Json(report))
}

/// POST /api/v1/analytics/growth
pub async fn handle_growth(
    State(state): State<AppState>,
    Json(req): Json<GrowthRequest>,
) -> Result<Json<Vec<GrowthPrediction>>, AppError> {
    require_subject(&req.subject)?;
    if req.metrics.is_empty() {
        return Ok(Json(vec![]));
    }

    let metrics: Vec<&str> = req.metrics.iter().map(String::as_str).collect();
    let key = history_key("growth", &req.subject, &metrics, &req.history).build();

    let predictions = state.cache.cached(&key, CacheStrategy::GithubStats, move || {
        predict_growth(&req.history, &req.metrics)
    })
    .await;

    Ok(Json(predictions))
}

/// POST /api/v1/analytics/milestones
/// Cheap closed-form projection; not cached.
pub async fn handle_milestones(
    Json(req): Json<MilestoneRequest>,
) -> Result<Json<MilestoneProjection>, AppError> {
    if !req.growth_rate_percent.is_finite() {
        return Err(AppError::Validation(
            "growth_rate_percent must be a finite number".to_string(),
        ));
    }
    Ok(Json(predict_career_milestones(
        &req.current_metrics,
        req.growth_rate_percent,
        req.current_stage,
    )))
}

/// POST /api/v1/analytics/trajectory
pub async fn handle_trajectory(
    State(state): State<AppState>,
    Json(req): Json<TrajectoryRequest>,
) -> Result<Json<CareerTrajectory>, AppError> {
    require_subject(&req.subject)?;

    let key = progression_key(&req.subject, &req.data);
    let trajectory = state.cache.cached(&key, CacheStrategy::Profile, move || {
        analyze_progression(&req.data)
    })
    .await;

    Ok(Json(trajectory))
}

// ────────────────────────────────────────────────────────────────────────────
// Validation & cache keys
// ────────────────────────────────────────────────────────────────────────────

fn require_subject(subject: &str) -> Result<(), AppError> {
    if subject.trim().is_empty() {
        return Err(AppError::Validation("subject must not be empty".to_string()));
    }
    Ok(())
}

fn positive_or_default(name: &str, value: Option<f64>, default: f64) -> Result<f64, AppError> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(AppError::Validation(format!(
            "{name} must be a positive number, got {v}"
        ))),
    }
}

/// Subject and metric names stay readable so `DELETE /api/v1/cache?pattern=`
/// can target them; the history itself is fingerprinted.
fn history_key(
    namespace: &str,
    subject: &str,
    metrics: &[&str],
    history: &[HistoryPoint],
) -> CacheKey {
    CacheKey::new(namespace)
        .param(subject.trim())
        .param(metrics.join(","))
        .digest(history)
}

/// Milestone ids are left out: they are generated server-side when a client
/// omits them, so they differ between otherwise identical requests.
fn progression_key(subject: &str, data: &ProgressionData) -> String {
    let milestones: Vec<_> = data
        .milestones
        .iter()
        .map(|m| (m.kind, &m.title, m.date, m.impact))
        .collect();
    CacheKey::new("trajectory")
        .param(subject.trim())
        .digest(&(
            &data.commits,
            &data.pull_requests,
            &data.repository_roles,
            &data.skills,
            milestones,
        ))
        .build()
}
