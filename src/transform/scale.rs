//! Scaling and normalization transforms for time series.
//!
//! Scalers are fitted on the training segment and then applied unchanged to
//! validation and test data, so no information leaks backwards in time.

use crate::utils::stats;
use serde::{Deserialize, Serialize};

/// Fitted affine scaling `x_scaled = (x - center) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleResult {
    /// Transformed training data
    #[serde(skip)]
    pub data: Vec<f64>,
    /// Center value used (mean, min or median)
    pub center: f64,
    /// Scale value used (std dev, range or IQR); always positive
    pub scale: f64,
}

impl ScaleResult {
    /// Scaling that leaves values unchanged.
    pub fn identity(series: &[f64]) -> Self {
        Self {
            data: series.to_vec(),
            center: 0.0,
            scale: 1.0,
        }
    }

    /// Inverse transform to recover original scale.
    pub fn inverse(&self) -> Vec<f64> {
        self.data.iter().map(|&x| self.inverse_value(x)).collect()
    }

    /// Inverse transform of a single value.
    #[inline]
    pub fn inverse_value(&self, x: f64) -> f64 {
        x * self.scale + self.center
    }

    /// Transform new data using the same parameters.
    pub fn transform(&self, data: &[f64]) -> Vec<f64> {
        data.iter()
            .map(|&x| (x - self.center) / self.scale)
            .collect()
    }
}

/// Normalization applied before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    /// Zero mean, unit variance.
    Standard,
    /// Map the training range onto [0, 1].
    #[default]
    MinMax,
    /// Median / IQR.
    Robust,
    /// Leave values untouched.
    None,
}

impl ScalingMethod {
    /// Fit the scaler on `series`.
    pub fn fit(&self, series: &[f64]) -> ScaleResult {
        match self {
            ScalingMethod::Standard => standardize(series),
            ScalingMethod::MinMax => normalize(series),
            ScalingMethod::Robust => robust_scale(series),
            ScalingMethod::None => ScaleResult::identity(series),
        }
    }
}

/// Standardize data to zero mean and unit variance (z-score normalization).
///
/// x_scaled = (x - mean) / std
pub fn standardize(series: &[f64]) -> ScaleResult {
    if series.is_empty() {
        return ScaleResult::identity(series);
    }

    let mean = stats::mean(series);
    // a single observation has no spread
    let std = if series.len() > 1 { stats::std_dev(series) } else { 0.0 };

    let scale = if std < 1e-10 { 1.0 } else { std };
    let data = series.iter().map(|&x| (x - mean) / scale).collect();

    ScaleResult {
        data,
        center: mean,
        scale,
    }
}

/// Normalize data to [0, 1] range (min-max normalization).
///
/// x_scaled = (x - min) / (max - min)
pub fn normalize(series: &[f64]) -> ScaleResult {
    if series.is_empty() {
        return ScaleResult::identity(series);
    }

    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let scale = if range < 1e-10 { 1.0 } else { range };
    let data = series.iter().map(|&x| (x - min) / scale).collect();

    ScaleResult {
        data,
        center: min,
        scale,
    }
}

/// Robust scaling using median and IQR.
///
/// More robust to gust outliers than standardization.
pub fn robust_scale(series: &[f64]) -> ScaleResult {
    if series.is_empty() {
        return ScaleResult::identity(series);
    }

    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = quantile_sorted(&sorted, 0.5);
    let iqr = quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25);

    let scale = if iqr < 1e-10 { 1.0 } else { iqr };
    let data = series.iter().map(|&x| (x - median) / scale).collect();

    ScaleResult {
        data,
        center: median,
        scale,
    }
}

/// Linear-interpolated quantile of already sorted values.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let pos = q * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;

    if lower == upper || upper >= n {
        sorted[lower.min(n - 1)]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standardize_basic() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = standardize(&series);

        assert_relative_eq!(result.center, 3.0, epsilon = 1e-10);
        assert_relative_eq!(result.scale, 2.5_f64.sqrt(), epsilon = 1e-10);

        let mean: f64 = result.data.iter().sum::<f64>() / result.data.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn standardize_constant_uses_unit_scale() {
        let result = standardize(&[5.0; 10]);
        assert_relative_eq!(result.center, 5.0, epsilon = 1e-10);
        assert_relative_eq!(result.scale, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn normalize_maps_training_range_to_unit_interval() {
        let result = normalize(&[0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_relative_eq!(result.data[0], 0.0, epsilon = 1e-10);
        assert_relative_eq!(result.data[2], 0.5, epsilon = 1e-10);
        assert_relative_eq!(result.data[4], 1.0, epsilon = 1e-10);

        // Unseen test values may fall outside [0, 1].
        let test = result.transform(&[125.0, -25.0]);
        assert_relative_eq!(test[0], 1.25, epsilon = 1e-10);
        assert_relative_eq!(test[1], -0.25, epsilon = 1e-10);
    }

    #[test]
    fn normalize_inverse() {
        let series = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let result = normalize(&series);
        for (orig, rec) in series.iter().zip(result.inverse().iter()) {
            assert_relative_eq!(orig, rec, epsilon = 1e-10);
        }
    }

    #[test]
    fn robust_scale_uses_median_and_iqr() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let result = robust_scale(&series);
        assert_relative_eq!(result.center, 5.0, epsilon = 1e-10);
        assert_relative_eq!(result.scale, 4.0, epsilon = 1e-10);
    }

    #[test]
    fn scaling_method_dispatch() {
        let series = vec![2.0, 4.0, 6.0];
        assert_eq!(ScalingMethod::None.fit(&series).data, series);
        assert_relative_eq!(ScalingMethod::MinMax.fit(&series).scale, 4.0);
        assert_relative_eq!(ScalingMethod::Standard.fit(&series).center, 4.0);
        assert_eq!(ScalingMethod::default(), ScalingMethod::MinMax);
    }

    #[test]
    fn empty_series_gets_identity() {
        let result = normalize(&[]);
        assert!(result.data.is_empty());
        assert_relative_eq!(result.scale, 1.0);
    }
}
