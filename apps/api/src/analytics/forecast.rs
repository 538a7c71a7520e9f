//! Trend Forecaster: OLS trend fits over metric histories and milestone ETAs.
//!
//! `predict_growth` fits value-vs-index per metric and projects one period ahead.
//! `predict_career_milestones` extrapolates a compound monthly growth rate against
//! the metric requirements of the next career stage.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::career::Stage;
use crate::analytics::series::MetricSeries;
use crate::models::activity::HistoryPoint;

/// |slope| at or below this fraction of |mean| per period is classified stable.
const STABLE_SLOPE_RATIO: f64 = 0.01;
/// Samples needed for the sample-size factor to reach ~63%.
const CONFIDENCE_SAMPLE_SCALE: f64 = 4.0;
/// Penalty applied to the residual coefficient of variation.
const NOISE_PENALTY: f64 = 3.0;
/// Projections further out than this are reported as "no date".
pub const MAX_PROJECTION_MONTHS: f64 = 240.0;
const SECONDS_PER_MONTH: f64 = 30.4375 * 86_400.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthPrediction {
    pub metric: String,
    pub current_value: f64,
    pub predicted_value: f64,
    pub confidence: f64, // 0.0 – 1.0
    pub trend: Trend,
    pub samples: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Linear trend
// ────────────────────────────────────────────────────────────────────────────

/// Ordinary least squares fit of value against sample index (0, 1, 2, ...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    pub mean: f64,
    /// Standard deviation of residuals (n − 2 degrees of freedom).
    pub residual_std: f64,
    pub samples: usize,
}

impl LinearTrend {
    /// Returns `None` for fewer than two samples or any non-finite value.
    pub fn fit(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n < 2 || values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let nf = n as f64;
        let x_mean = (nf - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / nf;

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxy += dx * (y - y_mean);
            sxx += dx * dx;
        }
        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let residual_std = if n > 2 {
            let sse: f64 = values
                .iter()
                .enumerate()
                .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
                .sum();
            (sse / (nf - 2.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            slope,
            intercept,
            mean: y_mean,
            residual_std,
            samples: n,
        })
    }

    pub fn project(&self, index: f64) -> f64 {
        self.intercept + self.slope * index
    }

    pub fn trend(&self) -> Trend {
        let band = STABLE_SLOPE_RATIO * self.mean.abs().max(1.0);
        if self.slope > band {
            Trend::Increasing
        } else if self.slope < -band {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    /// Saturating in sample count, decreasing in residual noise.
    pub fn confidence(&self) -> f64 {
        let sample_factor = 1.0 - (-((self.samples as f64 - 1.0) / CONFIDENCE_SAMPLE_SCALE)).exp();
        let noise_factor = if self.residual_std <= 0.0 {
            1.0
        } else {
            let scale = self.mean.abs();
            if scale <= f64::EPSILON {
                0.0
            } else {
                1.0 / (1.0 + NOISE_PENALTY * self.residual_std / scale)
            }
        };
        (sample_factor * noise_factor).clamp(0.0, 1.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Growth prediction
// ────────────────────────────────────────────────────────────────────────────

/// Predicts the next-period value of each requested metric.
pub fn predict_growth<S: AsRef<str>>(
    history: &[HistoryPoint],
    metric_names: &[S],
) -> Vec<GrowthPrediction> {
    metric_names
        .iter()
        .map(|name| predict_series(&MetricSeries::from_history(history, name.as_ref())))
        .collect()
}

pub fn predict_series(series: &MetricSeries) -> GrowthPrediction {
    let values = series.values();
    let current_value = values.last().copied().unwrap_or(0.0);

    let Some(fit) = LinearTrend::fit(&values) else {
        return GrowthPrediction {
            metric: series.metric.clone(),
            current_value,
            predicted_value: current_value,
            confidence: 0.0,
            trend: Trend::Stable,
            samples: values.len(),
        };
    };

    let mut predicted_value = fit.project(values.len() as f64);
    if values.iter().all(|v| *v >= 0.0) {
        predicted_value = predicted_value.max(0.0);
    }

    GrowthPrediction {
        metric: series.metric.clone(),
        current_value,
        predicted_value,
        confidence: fit.confidence(),
        trend: fit.trend(),
        samples: fit.samples,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Career milestone projection
// ────────────────────────────────────────────────────────────────────────────

/// Activity totals required to enter a stage.
pub fn stage_metric_requirements(stage: Stage) -> &'static [(&'static str, f64)] {
    match stage {
        Stage::Junior => &[],
        Stage::Mid => &[
            ("commits", 500.0),
            ("pullRequests", 50.0),
            ("codeReviews", 20.0),
            ("repositories", 5.0),
        ],
        Stage::Senior => &[
            ("commits", 2000.0),
            ("pullRequests", 250.0),
            ("codeReviews", 150.0),
            ("repositories", 15.0),
        ],
        Stage::Lead => &[
            ("commits", 4000.0),
            ("pullRequests", 600.0),
            ("codeReviews", 500.0),
            ("stars", 100.0),
        ],
        Stage::Principal => &[
            ("commits", 8000.0),
            ("pullRequests", 1200.0),
            ("codeReviews", 1200.0),
            ("stars", 1000.0),
        ],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneProjection {
    pub current_stage: Stage,
    pub next_stage: Option<Stage>,
    pub estimated_date: Option<DateTime<Utc>>,
    pub months_to_next: Option<f64>,
    /// Unmet requirements, e.g. "commits: 320 of 500".
    pub requirements: Vec<String>,
    pub progress: f64, // 0.0 – 1.0
}

pub fn predict_career_milestones(
    current_metrics: &HashMap<String, f64>,
    growth_rate_percent: f64,
    current_stage: Stage,
) -> MilestoneProjection {
    predict_career_milestones_at(current_metrics, growth_rate_percent, current_stage, Utc::now())
}

/// `growth_rate_percent` is compound growth per month. Zero, negative or
/// non-finite rates never produce a date.
pub fn predict_career_milestones_at(
    current_metrics: &HashMap<String, f64>,
    growth_rate_percent: f64,
    current_stage: Stage,
    now: DateTime<Utc>,
) -> MilestoneProjection {
    let Some(next_stage) = current_stage.next() else {
        return MilestoneProjection {
            current_stage,
            next_stage: None,
            estimated_date: None,
            months_to_next: None,
            requirements: vec![],
            progress: 1.0,
        };
    };

    let growth = growth_rate_percent / 100.0;
    let growing = growth.is_finite() && growth > 0.0;

    let requirements = stage_metric_requirements(next_stage);
    let mut unmet = Vec::new();
    let mut progress_sum = 0.0;
    // Some(months) while every unmet requirement is reachable
    let mut months_needed: Option<f64> = Some(0.0);

    for &(metric, threshold) in requirements {
        let current = current_metrics
            .get(metric)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
            .max(0.0);
        progress_sum += (current / threshold).min(1.0);

        if current >= threshold {
            continue;
        }
        unmet.push(format!("{metric}: {current:.0} of {threshold:.0}"));

        let months = if growing && current > 0.0 {
            Some((threshold / current).ln() / (1.0 + growth).ln())
        } else {
            None
        };
        months_needed = match (months_needed, months) {
            (Some(acc), Some(m)) if m.is_finite() => Some(acc.max(m)),
            _ => None,
        };
    }

    let months_to_next = months_needed.filter(|m| *m <= MAX_PROJECTION_MONTHS);
    let estimated_date =
        months_to_next.map(|m| now + Duration::seconds((m * SECONDS_PER_MONTH).round() as i64));
    let progress = if requirements.is_empty() {
        1.0
    } else {
        progress_sum / requirements.len() as f64
    };

    MilestoneProjection {
        current_stage,
        next_stage: Some(next_stage),
        estimated_date,
        months_to_next,
        requirements: unmet,
        progress,
    }
}
