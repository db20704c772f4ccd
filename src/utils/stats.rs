//! Statistical utility functions.

use crate::error::{ForecastError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided standard-normal critical value for a central coverage level.
///
/// # Example
/// ```
/// use tubecast::utils::z_for_coverage;
///
/// // 95% central interval -> z ≈ 1.96
/// let z = z_for_coverage(0.95).unwrap();
/// assert!((z - 1.959964).abs() < 1e-5);
/// ```
pub fn z_for_coverage(coverage: f64) -> Result<f64> {
    if !(coverage > 0.0 && coverage < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "coverage must lie in (0, 1), got {coverage}"
        )));
    }
    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::ComputationError(e.to_string()))?;
    Ok(standard.inverse_cdf(0.5 + coverage / 2.0))
}

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the standard deviation of a slice (n-1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn z_values_match_tables() {
        assert_relative_eq!(z_for_coverage(0.90).unwrap(), 1.644854, epsilon = 1e-5);
        assert_relative_eq!(z_for_coverage(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(z_for_coverage(0.99).unwrap(), 2.575829, epsilon = 1e-5);
    }

    #[test]
    fn z_rejects_degenerate_coverage() {
        assert!(z_for_coverage(0.0).is_err());
        assert!(z_for_coverage(1.0).is_err());
        assert!(z_for_coverage(f64::NAN).is_err());
    }

    #[test]
    fn mean_and_std() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_relative_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.13809, epsilon = 1e-4);
        assert!(mean(&[]).is_nan());
        assert!(std_dev(&[1.0]).is_nan());
    }
}
