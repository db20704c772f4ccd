//! Time-indexed scalar series (e.g. hourly wind speed).

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Policy for handling missing values (NaN/Inf).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Drop observations with missing values.
    Drop,
    /// Fill with a specific value.
    Fill(f64),
    /// Forward fill (use previous valid value). Leading gaps take the first
    /// valid value.
    #[default]
    ForwardFill,
    /// Linear interpolation between neighbouring valid values.
    Interpolate,
    /// Return error if missing values found.
    Error,
}

/// A univariate series of observations with optional UTC timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSeries {
    timestamps: Option<Vec<DateTime<Utc>>>,
    values: Vec<f64>,
    label: String,
}

#[inline]
fn is_missing(v: f64) -> bool {
    !v.is_finite()
}

impl WindSeries {
    /// Create a series with timestamps.
    ///
    /// Timestamps must be strictly increasing and match the value count.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }
        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }
        Ok(Self {
            timestamps: Some(timestamps),
            values,
            label: "value".to_string(),
        })
    }

    /// Create a series indexed only by position.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            timestamps: None,
            values,
            label: "value".to_string(),
        }
    }

    /// Attach a label (usually the source column name).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> Option<&[DateTime<Utc>]> {
        self.timestamps.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Extract the observations in `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<WindSeries> {
        if start > end {
            return Err(ForecastError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(ForecastError::IndexOutOfBounds {
                index: end,
                size: self.len(),
            });
        }

        Ok(WindSeries {
            timestamps: self.timestamps.as_ref().map(|ts| ts[start..end].to_vec()),
            values: self.values[start..end].to_vec(),
            label: self.label.clone(),
        })
    }

    /// Check if series has missing values (NaN or Inf).
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|&v| is_missing(v))
    }

    /// Return a sanitized copy with missing values handled.
    ///
    /// Every policy except `Error` yields an all-finite series; a series with
    /// no valid observation at all is rejected.
    pub fn sanitized(&self, policy: MissingValuePolicy) -> Result<WindSeries> {
        if !self.has_missing_values() {
            return Ok(self.clone());
        }

        let first_valid = self.values.iter().copied().find(|v| v.is_finite());
        let Some(first_valid) = first_valid else {
            if let MissingValuePolicy::Fill(fill) = policy {
                return Ok(self.with_values(vec![fill; self.len()]));
            }
            return Err(ForecastError::MissingValues);
        };

        match policy {
            MissingValuePolicy::Error => Err(ForecastError::MissingValues),
            MissingValuePolicy::Drop => {
                let keep: Vec<usize> = (0..self.len())
                    .filter(|&i| !is_missing(self.values[i]))
                    .collect();
                Ok(WindSeries {
                    timestamps: self
                        .timestamps
                        .as_ref()
                        .map(|ts| keep.iter().map(|&i| ts[i]).collect()),
                    values: keep.iter().map(|&i| self.values[i]).collect(),
                    label: self.label.clone(),
                })
            }
            MissingValuePolicy::Fill(fill) => Ok(self.with_values(
                self.values
                    .iter()
                    .map(|&v| if is_missing(v) { fill } else { v })
                    .collect(),
            )),
            MissingValuePolicy::ForwardFill => {
                let mut last = first_valid;
                let values = self
                    .values
                    .iter()
                    .map(|&v| {
                        if !is_missing(v) {
                            last = v;
                        }
                        last
                    })
                    .collect();
                Ok(self.with_values(values))
            }
            MissingValuePolicy::Interpolate => {
                Ok(self.with_values(interpolate_series(&self.values)))
            }
        }
    }

    /// Chronological split points `(train_end, validation_end)`.
    ///
    /// The training segment is `0..train_end`, validation is
    /// `train_end..validation_end` and the test segment is the remainder.
    pub fn split_points(
        &self,
        train_fraction: f64,
        validation_fraction: f64,
    ) -> Result<(usize, usize)> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "train fraction must lie in (0, 1), got {train_fraction}"
            )));
        }
        if !(0.0..1.0).contains(&validation_fraction)
            || train_fraction + validation_fraction >= 1.0
        {
            return Err(ForecastError::InvalidParameter(format!(
                "validation fraction {validation_fraction} leaves no test data"
            )));
        }
        let n = self.len();
        let train_end = (n as f64 * train_fraction).round() as usize;
        let validation_end = (n as f64 * (train_fraction + validation_fraction)).round() as usize;
        if train_end == 0 || validation_end >= n {
            return Err(ForecastError::InsufficientData {
                needed: 3,
                got: n,
            });
        }
        Ok((train_end, validation_end.max(train_end)))
    }

    fn with_values(&self, values: Vec<f64>) -> WindSeries {
        WindSeries {
            timestamps: self.timestamps.clone(),
            values,
            label: self.label.clone(),
        }
    }
}

/// Linear interpolation over missing values; edges take the nearest valid value.
fn interpolate_series(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut result = values.to_vec();
    let valid: Vec<usize> = (0..n).filter(|&i| !is_missing(values[i])).collect();
    if valid.is_empty() {
        return result;
    }

    for i in 0..n {
        if !is_missing(values[i]) {
            continue;
        }
        let next = valid.partition_point(|&j| j < i);
        result[i] = match (next.checked_sub(1).map(|p| valid[p]), valid.get(next)) {
            (Some(lo), Some(&hi)) => {
                let frac = (i - lo) as f64 / (hi - lo) as f64;
                values[lo] + frac * (values[hi] - values[lo])
            }
            (Some(lo), None) => values[lo],
            (None, Some(&hi)) => values[hi],
            (None, None) => unreachable!("valid is non-empty"),
        };
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn hourly(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = WindSeries::new(hourly(3), vec![1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            ForecastError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn new_rejects_unordered_timestamps() {
        let mut ts = hourly(3);
        ts.swap(1, 2);
        assert!(matches!(
            WindSeries::new(ts, vec![1.0, 2.0, 3.0]),
            Err(ForecastError::TimestampError(_))
        ));
    }

    #[test]
    fn slice_keeps_timestamps_aligned() {
        let series = WindSeries::new(hourly(5), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let part = series.slice(1, 4).unwrap();
        assert_eq!(part.values(), &[2.0, 3.0, 4.0]);
        assert_eq!(part.timestamps().unwrap()[0], hourly(5)[1]);
        assert!(series.slice(3, 6).is_err());
        assert!(series.slice(4, 2).is_err());
    }

    #[test]
    fn sanitize_forward_fill_backfills_leading_gap() {
        let series = WindSeries::from_values(vec![f64::NAN, 2.0, f64::NAN, 4.0]);
        let clean = series.sanitized(MissingValuePolicy::ForwardFill).unwrap();
        assert_eq!(clean.values(), &[2.0, 2.0, 2.0, 4.0]);
        assert!(!clean.has_missing_values());
    }

    #[test]
    fn sanitize_interpolates_linearly() {
        let series = WindSeries::from_values(vec![1.0, f64::NAN, f64::NAN, 4.0, f64::INFINITY]);
        let clean = series.sanitized(MissingValuePolicy::Interpolate).unwrap();
        assert_relative_eq!(clean.values()[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(clean.values()[2], 3.0, epsilon = 1e-12);
        assert_relative_eq!(clean.values()[4], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn sanitize_drop_removes_timestamps_too() {
        let series = WindSeries::new(hourly(3), vec![1.0, f64::NAN, 3.0]).unwrap();
        let clean = series.sanitized(MissingValuePolicy::Drop).unwrap();
        assert_eq!(clean.values(), &[1.0, 3.0]);
        assert_eq!(clean.timestamps().unwrap().len(), 2);
    }

    #[test]
    fn sanitize_error_policy_and_all_missing() {
        let series = WindSeries::from_values(vec![1.0, f64::NAN]);
        assert_eq!(
            series.sanitized(MissingValuePolicy::Error),
            Err(ForecastError::MissingValues)
        );

        let empty = WindSeries::from_values(vec![f64::NAN, f64::NAN]);
        assert!(empty.sanitized(MissingValuePolicy::ForwardFill).is_err());
        let filled = empty.sanitized(MissingValuePolicy::Fill(0.0)).unwrap();
        assert_eq!(filled.values(), &[0.0, 0.0]);
    }

    #[test]
    fn split_points_are_chronological() {
        let series = WindSeries::from_values((0..100).map(|i| i as f64).collect());
        let (train_end, val_end) = series.split_points(0.7, 0.15).unwrap();
        assert_eq!(train_end, 70);
        assert_eq!(val_end, 85);

        assert!(series.split_points(0.0, 0.1).is_err());
        assert!(series.split_points(0.8, 0.2).is_err());
    }
}
