//! Anomaly Detector: flags statistical outliers and sudden step changes in a metric series.
//!
//! Pure functions over `&[f64]`. Degenerate inputs (empty, constant, non-finite)
//! produce empty results, never NaN scores.

use serde::{Deserialize, Serialize};

use crate::analytics::series::MetricSeries;

pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 2.5;
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.5;

/// Relative floor below which a standard deviation is treated as zero.
const ZERO_SPREAD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outlier {
    pub index: usize,
    pub value: f64,
    /// Absolute leave-one-out z-score: distance of `value` from the mean of
    /// the other samples, in units of their population standard deviation.
    /// Falls back to full-series statistics when the others are all equal.
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuddenChange {
    pub index: usize,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub metric: String,
    pub outliers: Vec<Outlier>,
    pub sudden_changes: Vec<SuddenChange>,
}

/// Population mean and sum of squared deviations (M2).
struct Moments {
    n: f64,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn of(series: &[f64]) -> Self {
        let n = series.len() as f64;
        let mean = series.iter().sum::<f64>() / n;
        let m2 = series.iter().map(|x| (x - mean).powi(2)).sum();
        Self { n, mean, m2 }
    }

    fn std_dev(&self) -> f64 {
        (self.m2 / self.n).max(0.0).sqrt()
    }

    /// Mean and population standard deviation of the series with `x` removed.
    fn without(&self, x: f64) -> (f64, f64) {
        let rest = self.n - 1.0;
        let mean = (self.n * self.mean - x) / rest;
        let m2 = (self.m2 - (x - self.mean) * (x - mean)).max(0.0);
        (mean, (m2 / rest).sqrt())
    }
}

fn has_spread(std_dev: f64, mean: f64) -> bool {
    std_dev.is_finite() && std_dev > ZERO_SPREAD_EPSILON * mean.abs().max(1.0)
}

/// Absolute z-score of every sample.
///
/// Each sample is scored against the mean and standard deviation of the rest
/// of the series, so a single spike cannot inflate the spread it is measured
/// against. When the rest of the series has no spread, the whole-series
/// statistics are used instead; a constant series scores 0 everywhere.
pub fn z_scores(series: &[f64]) -> Vec<f64> {
    if series.is_empty() || series.iter().any(|x| !x.is_finite()) {
        return vec![0.0; series.len()];
    }

    let moments = Moments::of(series);
    let full_std = moments.std_dev();
    if !has_spread(full_std, moments.mean) {
        return vec![0.0; series.len()];
    }

    series
        .iter()
        .map(|&x| {
            let (mean, std_dev) = if series.len() > 2 {
                moments.without(x)
            } else {
                (moments.mean, full_std)
            };
            let (mean, std_dev) = if has_spread(std_dev, mean) {
                (mean, std_dev)
            } else {
                (moments.mean, full_std)
            };
            let score = (x - mean).abs() / std_dev;
            if score.is_finite() {
                score
            } else {
                0.0
            }
        })
        .collect()
}

/// Emits an `Outlier` for every sample whose z-score exceeds `threshold`.
pub fn detect_outliers(series: &[f64], threshold: f64) -> Vec<Outlier> {
    z_scores(series)
        .into_iter()
        .enumerate()
        .filter(|(_, score)| *score > threshold)
        .map(|(index, score)| Outlier {
            index,
            value: series[index],
            score,
        })
        .collect()
}

/// Emits a `SuddenChange` wherever the relative change from the previous sample
/// exceeds `change_threshold`. Samples following a zero are skipped.
pub fn detect_sudden_changes(series: &[f64], change_threshold: f64) -> Vec<SuddenChange> {
    series
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let (prev, curr) = (pair[0], pair[1]);
            if prev == 0.0 || !prev.is_finite() || !curr.is_finite() {
                return None;
            }
            let change_percent = (curr - prev).abs() / prev.abs();
            (change_percent > change_threshold).then_some(SuddenChange {
                index: i + 1,
                change_percent,
            })
        })
        .collect()
}

/// Runs both detectors over one metric series.
pub fn analyze_anomalies(
    series: &MetricSeries,
    outlier_threshold: f64,
    change_threshold: f64,
) -> AnomalyReport {
    let values = series.values();
    AnomalyReport {
        metric: series.metric.clone(),
        outliers: detect_outliers(&values, outlier_threshold),
        sudden_changes: detect_sudden_changes(&values, change_threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::HistoryPoint;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_spike_is_flagged_above_default_threshold() {
        let series = [10.0, 12.0, 11.0, 13.0, 100.0, 14.0, 11.0];
        let outliers = detect_outliers(&series, DEFAULT_OUTLIER_THRESHOLD);
        assert_eq!(outliers.len(), 1, "got {outliers:?}");
        assert_eq!(outliers[0].index, 4);
        assert_eq!(outliers[0].value, 100.0);
        assert!(outliers[0].score > 2.5, "score was {}", outliers[0].score);
    }

    #[test]
    fn test_score_is_measured_against_the_other_samples() {
        let series = [10.0, 12.0, 11.0, 13.0, 100.0, 14.0, 11.0];
        let rest = [10.0, 12.0, 11.0, 13.0, 14.0, 11.0];
        let mean = rest.iter().sum::<f64>() / 6.0;
        let std = (rest.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 6.0).sqrt();
        let expected = (100.0 - mean) / std;
        let score = z_scores(&series)[4];
        assert!((score - expected).abs() < 1e-6, "{score} vs {expected}");
    }

    #[test]
    fn test_constant_series_has_no_outliers() {
        for series in [vec![5.0; 10], vec![0.1; 3], vec![0.0; 4], vec![42.0]] {
            assert!(detect_outliers(&series, 0.0).is_empty());
            assert!(z_scores(&series).iter().all(|s| *s == 0.0));
        }
    }

    #[test]
    fn test_empty_and_non_finite_series() {
        assert!(detect_outliers(&[], DEFAULT_OUTLIER_THRESHOLD).is_empty());
        assert!(detect_outliers(&[1.0, f64::NAN, 100.0], 0.1).is_empty());
        assert!(detect_sudden_changes(&[], 0.5).is_empty());
    }

    #[test]
    fn test_outlier_count_non_increasing_in_threshold() {
        let series = [3.0, 8.0, 1.0, 25.0, 4.0, 4.5, -12.0, 7.0, 60.0, 5.0];
        let mut previous = usize::MAX;
        for step in 0..40 {
            let threshold = step as f64 * 0.25;
            let count = detect_outliers(&series, threshold).len();
            assert!(count <= previous, "count rose at threshold {threshold}");
            previous = count;
        }
    }

    #[test]
    fn test_scores_are_finite_for_two_point_series() {
        let scores = z_scores(&[1.0, 3.0]);
        assert!(scores.iter().all(|s| s.is_finite()));
        assert!((scores[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sudden_change_flags_jump() {
        let changes = detect_sudden_changes(&[10.0, 11.0, 12.0, 50.0, 12.0, 11.0], 0.5);
        assert_eq!(changes[0].index, 3);
        assert!((changes[0].change_percent - 38.0 / 12.0).abs() < 1e-9);
        assert!(changes.iter().all(|c| c.index >= 3));
        // the drop back from 50 is also a step change
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].index, 4);
    }

    #[test]
    fn test_sudden_change_skips_zero_baseline() {
        let changes = detect_sudden_changes(&[0.0, 100.0, 100.0, 0.0], 0.5);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].index, 3);
        assert_eq!(changes[0].change_percent, 1.0);
    }

    #[test]
    fn test_negative_baseline_uses_magnitude() {
        let changes = detect_sudden_changes(&[-10.0, -4.0], 0.5);
        assert_eq!(changes.len(), 1);
        assert!((changes[0].change_percent - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_analyze_anomalies_uses_metric_name() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let history: Vec<HistoryPoint> = [10.0, 12.0, 11.0, 13.0, 100.0, 14.0, 11.0]
            .iter()
            .enumerate()
            .map(|(i, v)| HistoryPoint::new(start + Duration::weeks(i as i64)).with_metric("commits", *v))
            .collect();
        let series = MetricSeries::from_history(&history, "commits");
        let report = analyze_anomalies(&series, DEFAULT_OUTLIER_THRESHOLD, DEFAULT_CHANGE_THRESHOLD);
        assert_eq!(report.metric, "commits");
        assert_eq!(report.outliers.len(), 1);
        assert_eq!(report.sudden_changes[0].index, 4);
    }
}
