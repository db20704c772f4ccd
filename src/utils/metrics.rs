//! Interval and point accuracy metrics.
//!
//! PICP and MPIW are the headline scores for prediction intervals; the
//! Winkler score and CWC combine both into a single number.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Penalty steepness used by the coverage width criterion.
const CWC_ETA: f64 = 50.0;

fn check_lengths(expected: usize, got: usize) -> Result<()> {
    if expected == 0 {
        return Err(ForecastError::EmptyData);
    }
    if expected != got {
        return Err(ForecastError::DimensionMismatch { expected, got });
    }
    Ok(())
}

/// Prediction Interval Coverage Probability.
///
/// Fraction of observations with `lower <= actual <= upper`. Always in
/// `[0, 1]`; NaN observations are never covered.
pub fn picp(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    check_lengths(actual.len(), lower.len())?;
    check_lengths(actual.len(), upper.len())?;

    let covered = actual
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .filter(|(&y, (&lo, &hi))| lo <= y && y <= hi)
        .count();

    Ok(covered as f64 / actual.len() as f64)
}

/// Mean Prediction Interval Width.
///
/// Crossed bounds count with their absolute width, so the result is never
/// negative.
pub fn mpiw(lower: &[f64], upper: &[f64]) -> Result<f64> {
    check_lengths(lower.len(), upper.len())?;
    let total: f64 = lower
        .iter()
        .zip(upper.iter())
        .map(|(lo, hi)| (hi - lo).abs())
        .sum();
    Ok(total / lower.len() as f64)
}

/// Interval score at miscoverage `alpha`; lower is better.
///
/// Width plus `2/alpha` times the distance by which the observation misses
/// the interval.
pub fn winkler_score(actual: &[f64], lower: &[f64], upper: &[f64], alpha: f64) -> Result<f64> {
    check_lengths(actual.len(), lower.len())?;
    check_lengths(actual.len(), upper.len())?;
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "alpha must lie in (0, 1), got {alpha}"
        )));
    }

    let mut total = 0.0;
    for i in 0..actual.len() {
        let (lo, hi, y) = (lower[i], upper[i], actual[i]);
        let width = (hi - lo).abs();
        total += if y < lo {
            width + (2.0 / alpha) * (lo - y)
        } else if y > hi {
            width + (2.0 / alpha) * (y - hi)
        } else {
            width
        };
    }
    Ok(total / actual.len() as f64)
}

/// Summary of interval quality against a nominal coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalMetrics {
    /// Prediction Interval Coverage Probability
    pub picp: f64,
    /// Mean Prediction Interval Width
    pub mpiw: f64,
    /// MPIW normalized by the range of the actuals (None for a flat series)
    pub nmpiw: Option<f64>,
    /// Winkler interval score at alpha = 1 - target
    pub winkler: f64,
    /// Coverage width criterion (uses NMPIW, falls back to MPIW)
    pub cwc: f64,
    /// `picp - target_coverage`
    pub coverage_gap: f64,
    /// Nominal coverage the intervals were built for
    pub target_coverage: f64,
    /// Number of evaluated points
    pub n: usize,
}

impl IntervalMetrics {
    /// Whether coverage reaches the target within `tolerance`.
    pub fn meets_target(&self, tolerance: f64) -> bool {
        self.picp >= self.target_coverage - tolerance
    }
}

/// Compute every interval metric in one pass over the data.
pub fn calculate_interval_metrics(
    actual: &[f64],
    lower: &[f64],
    upper: &[f64],
    target_coverage: f64,
) -> Result<IntervalMetrics> {
    if !(target_coverage > 0.0 && target_coverage < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "target coverage must lie in (0, 1), got {target_coverage}"
        )));
    }

    let picp = picp(actual, lower, upper)?;
    let mpiw = mpiw(lower, upper)?;
    let winkler = winkler_score(actual, lower, upper, 1.0 - target_coverage)?;

    let (min, max) = actual
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    let nmpiw = if range.is_finite() && range > 0.0 {
        Some(mpiw / range)
    } else {
        None
    };

    let width_term = nmpiw.unwrap_or(mpiw);
    let cwc = if picp < target_coverage {
        width_term * (1.0 + (-CWC_ETA * (picp - target_coverage)).exp())
    } else {
        width_term
    };

    Ok(IntervalMetrics {
        picp,
        mpiw,
        nmpiw,
        winkler,
        cwc,
        coverage_gap: picp - target_coverage,
        target_coverage,
        n: actual.len(),
    })
}

/// Accuracy metrics for the point estimate inside each interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (None if zeros in actual)
    pub mape: Option<f64>,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
    /// R-squared (coefficient of determination)
    pub r_squared: f64,
}

/// Calculate accuracy metrics between actual and predicted values.
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    check_lengths(actual.len(), predicted.len())?;

    let n = actual.len() as f64;
    let pairs = || actual.iter().zip(predicted.iter());

    let mae = pairs().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    let ss_res: f64 = pairs().map(|(a, p)| (a - p).powi(2)).sum();
    let mse = ss_res / n;

    // Wind speed is frequently exactly zero during calms.
    let mape = if actual.contains(&0.0) {
        None
    } else {
        let sum: f64 = pairs().map(|(a, p)| ((a - p) / a).abs()).sum();
        Some(100.0 * sum / n)
    };

    let smape = pairs()
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - p).abs() / denom
            }
        })
        .sum::<f64>()
        * 100.0
        / n;

    let mean_actual = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(AccuracyMetrics {
        mae,
        mse,
        rmse: mse.sqrt(),
        mape,
        smape,
        r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn picp_counts_closed_interval() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let lower = [0.5, 2.0, 3.5, 0.0];
        let upper = [1.5, 2.5, 4.0, 3.9];
        // covered: 1.0 yes, 2.0 yes (on bound), 3.0 no, 4.0 no
        assert_relative_eq!(picp(&actual, &lower, &upper).unwrap(), 0.5);
    }

    #[test]
    fn picp_unbounded_interval_covers_everything() {
        let actual = [-1e300, 0.0, 42.0];
        let lower = [f64::NEG_INFINITY; 3];
        let upper = [f64::INFINITY; 3];
        assert_relative_eq!(picp(&actual, &lower, &upper).unwrap(), 1.0);
    }

    #[test]
    fn picp_never_covers_nan() {
        let v = picp(&[f64::NAN], &[f64::NEG_INFINITY], &[f64::INFINITY]).unwrap();
        assert_relative_eq!(v, 0.0);
    }

    #[test]
    fn picp_rejects_bad_shapes() {
        assert_eq!(picp(&[], &[], &[]), Err(ForecastError::EmptyData));
        assert_eq!(
            picp(&[1.0, 2.0], &[0.0], &[3.0, 3.0]),
            Err(ForecastError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn mpiw_is_mean_width() {
        assert_relative_eq!(mpiw(&[0.0, 1.0], &[2.0, 5.0]).unwrap(), 3.0);
        assert_relative_eq!(mpiw(&[1.0, 2.0], &[1.0, 2.0]).unwrap(), 0.0);
        // crossed bound counted by magnitude
        assert_relative_eq!(mpiw(&[2.0], &[1.0]).unwrap(), 1.0);
    }

    #[test]
    fn winkler_penalizes_misses() {
        let inside = winkler_score(&[1.0], &[0.0], &[2.0], 0.1).unwrap();
        assert_relative_eq!(inside, 2.0);
        let above = winkler_score(&[3.0], &[0.0], &[2.0], 0.1).unwrap();
        assert_relative_eq!(above, 2.0 + 20.0);
        assert!(winkler_score(&[1.0], &[0.0], &[2.0], 0.0).is_err());
    }

    #[test]
    fn interval_metrics_summary() {
        let actual = [0.0, 1.0, 2.0, 3.0, 4.0];
        let lower = [-0.5, 0.5, 1.5, 2.5, 4.5];
        let upper = [0.5, 1.5, 2.5, 3.5, 5.5];

        let m = calculate_interval_metrics(&actual, &lower, &upper, 0.9).unwrap();
        assert_relative_eq!(m.picp, 0.8);
        assert_relative_eq!(m.mpiw, 1.0);
        assert_relative_eq!(m.nmpiw.unwrap(), 0.25);
        assert_relative_eq!(m.coverage_gap, -0.1, epsilon = 1e-12);
        assert_eq!(m.n, 5);
        assert!(!m.meets_target(0.05));
        assert!(m.meets_target(0.1 + 1e-9));
        // under-coverage inflates CWC above NMPIW
        assert!(m.cwc > 0.25);
    }

    #[test]
    fn interval_metrics_flat_actuals_have_no_nmpiw() {
        let m = calculate_interval_metrics(&[1.0, 1.0], &[0.0, 0.0], &[2.0, 2.0], 0.9).unwrap();
        assert!(m.nmpiw.is_none());
        assert_relative_eq!(m.cwc, 2.0);
        assert!(calculate_interval_metrics(&[1.0], &[0.0], &[2.0], 1.0).is_err());
    }

    #[test]
    fn calculate_metrics_perfect_prediction() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let metrics = calculate_metrics(&actual, &actual).unwrap();

        assert_relative_eq!(metrics.mae, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.rmse, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.smape, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.r_squared, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn calculate_metrics_known_values() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let predicted = vec![1.5, 2.5, 2.5, 4.5, 4.5];

        let metrics = calculate_metrics(&actual, &predicted).unwrap();
        assert_relative_eq!(metrics.mae, 0.5, epsilon = 1e-10);
        assert_relative_eq!(metrics.mse, 0.25, epsilon = 1e-10);
        assert_relative_eq!(metrics.rmse, 0.5, epsilon = 1e-10);
    }

    #[test]
    fn calculate_metrics_calm_periods_disable_mape() {
        let metrics = calculate_metrics(&[0.0, 1.0, 2.0], &[0.1, 1.1, 2.1]).unwrap();
        assert!(metrics.mape.is_none());
        assert!(metrics.smape.is_finite());
    }
}
