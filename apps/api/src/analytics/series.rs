//! MetricSeries: ordered, append-only samples of one named metric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::activity::HistoryPoint;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("sample at {timestamp} is older than the last sample at {last}")]
    OutOfOrder {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("a sample at {0} already exists")]
    DuplicateTimestamp(DateTime<Utc>),

    #[error("sample value must be finite")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSeries {
    pub metric: String,
    samples: Vec<MetricSample>,
}

impl MetricSeries {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            samples: Vec::new(),
        }
    }

    /// Strict append. Timestamps must be strictly increasing.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) -> Result<(), SeriesError> {
        if !value.is_finite() {
            return Err(SeriesError::NonFinite);
        }
        if let Some(last) = self.samples.last() {
            if timestamp == last.timestamp {
                return Err(SeriesError::DuplicateTimestamp(timestamp));
            }
            if timestamp < last.timestamp {
                return Err(SeriesError::OutOfOrder {
                    timestamp,
                    last: last.timestamp,
                });
            }
        }
        self.samples.push(MetricSample { timestamp, value });
        Ok(())
    }

    /// Lenient builder over a raw activity history.
    ///
    /// Sorts by date, skips points without the metric or with a non-finite
    /// value, and keeps the latest reading when two points share a timestamp.
    pub fn from_history(history: &[HistoryPoint], metric: &str) -> Self {
        let mut points: Vec<MetricSample> = history
            .iter()
            .filter_map(|p| {
                p.metrics
                    .get(metric)
                    .copied()
                    .filter(|v| v.is_finite())
                    .map(|value| MetricSample {
                        timestamp: p.date,
                        value,
                    })
            })
            .collect();

        // stable sort keeps input order among equal timestamps
        points.sort_by_key(|s| s.timestamp);

        let mut samples: Vec<MetricSample> = Vec::with_capacity(points.len());
        for sample in points {
            match samples.last_mut() {
                Some(last) if last.timestamp == sample.timestamp => *last = sample,
                _ => samples.push(sample),
            }
        }

        Self {
            metric: metric.to_string(),
            samples,
        }
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn last(&self) -> Option<&MetricSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_push_accepts_increasing_timestamps() {
        let mut series = MetricSeries::new("commits");
        series.push(day(0), 1.0).unwrap();
        series.push(day(1), 2.0).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.values(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_push_rejects_duplicate_and_out_of_order() {
        let mut series = MetricSeries::new("commits");
        series.push(day(5), 1.0).unwrap();
        assert_eq!(
            series.push(day(5), 2.0),
            Err(SeriesError::DuplicateTimestamp(day(5)))
        );
        assert!(matches!(
            series.push(day(1), 2.0),
            Err(SeriesError::OutOfOrder { .. })
        ));
        assert_eq!(series.push(day(6), f64::NAN), Err(SeriesError::NonFinite));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_from_history_sorts_and_dedups() {
        let history = vec![
            HistoryPoint::new(day(2)).with_metric("stars", 30.0),
            HistoryPoint::new(day(0)).with_metric("stars", 10.0),
            HistoryPoint::new(day(1)).with_metric("commits", 99.0),
            HistoryPoint::new(day(2)).with_metric("stars", 31.0),
            HistoryPoint::new(day(3)).with_metric("stars", f64::INFINITY),
        ];
        let series = MetricSeries::from_history(&history, "stars");
        assert_eq!(series.values(), vec![10.0, 31.0]);
        assert_eq!(series.last().unwrap().timestamp, day(2));
    }

    #[test]
    fn test_from_history_missing_metric_is_empty() {
        let history = vec![HistoryPoint::new(day(0)).with_metric("stars", 1.0)];
        assert!(MetricSeries::from_history(&history, "commits").is_empty());
    }
}
