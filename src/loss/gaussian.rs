//! Gaussian negative log-likelihood head (DeepAR-style).
//!
//! The first output is the mean, the second is an unconstrained value mapped to
//! a standard deviation through softplus.

use super::IntervalObjective;
use crate::core::{IntervalForecast, PredictionInterval};
use crate::error::{ForecastError, Result};
use crate::utils::z_for_coverage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

const MIN_SIGMA: f64 = 1e-6;
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;

/// Numerically stable `ln(1 + e^x)`.
#[inline]
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Gaussian likelihood objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianNll {
    /// Central coverage of the decoded interval.
    pub coverage: f64,
}

impl Default for GaussianNll {
    fn default() -> Self {
        Self { coverage: 0.95 }
    }
}

impl GaussianNll {
    pub fn new(coverage: f64) -> Result<Self> {
        let nll = Self { coverage };
        nll.validate()?;
        Ok(nll)
    }

    /// Standard deviation encoded by the raw second output.
    #[inline]
    pub fn sigma(raw: f64) -> f64 {
        softplus(raw) + MIN_SIGMA
    }
}

impl IntervalObjective for GaussianNll {
    fn name(&self) -> &'static str {
        "GaussianNLL"
    }

    fn target_coverage(&self) -> f64 {
        self.coverage
    }

    fn validate(&self) -> Result<()> {
        if !(self.coverage > 0.0 && self.coverage < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "gaussian coverage must lie in (0, 1), got {}",
                self.coverage
            )));
        }
        Ok(())
    }

    fn sample(&self, target: f64, mu: f64, raw_sigma: f64) -> (f64, [f64; 2]) {
        let sigma = Self::sigma(raw_sigma);
        let resid = target - mu;
        let var = sigma * sigma;
        let loss = HALF_LN_2PI + sigma.ln() + resid * resid / (2.0 * var);

        let d_mu = -resid / var;
        let d_sigma = 1.0 / sigma - resid * resid / (var * sigma);
        (loss, [d_mu, d_sigma * sigmoid(raw_sigma)])
    }

    fn decode(&self, outputs: &Array2<f64>) -> Result<IntervalForecast> {
        super::check_output_shape(outputs)?;
        let z = z_for_coverage(self.coverage)?;
        Ok(IntervalForecast::from_intervals(outputs.rows().into_iter().map(
            |row| {
                let mu = row[0];
                let half = z * Self::sigma(row[1]);
                PredictionInterval::new(mu - half, mu, mu + half)
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn softplus_is_stable() {
        assert_relative_eq!(softplus(0.0), 2.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(softplus(800.0), 800.0, epsilon = 1e-9);
        assert!(softplus(-800.0) >= 0.0);
    }

    #[test]
    fn loss_is_standard_normal_nll_at_unit_sigma() {
        let nll = GaussianNll::default();
        // softplus(raw) = 1  <=>  raw = ln(e - 1)
        let raw = (std::f64::consts::E - 1.0).ln();
        let (loss, _) = nll.sample(1.0, 0.0, raw);
        assert_relative_eq!(loss, HALF_LN_2PI + 0.5, epsilon = 1e-5);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let nll = GaussianNll::default();
        let eps = 1e-6;
        for &(y, mu, s) in &[(1.0, 0.2, -0.3), (-2.0, 0.5, 1.2), (0.0, 0.0, 0.0)] {
            let (_, g) = nll.sample(y, mu, s);
            let fd_mu = (nll.sample(y, mu + eps, s).0 - nll.sample(y, mu - eps, s).0) / (2.0 * eps);
            let fd_s = (nll.sample(y, mu, s + eps).0 - nll.sample(y, mu, s - eps).0) / (2.0 * eps);
            assert_relative_eq!(g[0], fd_mu, epsilon = 1e-5);
            assert_relative_eq!(g[1], fd_s, epsilon = 1e-5);
        }
    }

    #[test]
    fn decode_builds_symmetric_interval() {
        let nll = GaussianNll::new(0.95).unwrap();
        let raw = (std::f64::consts::E - 1.0).ln();
        let forecast = nll.decode(&array![[10.0, raw]]).unwrap();
        let interval = forecast.get(0).unwrap();
        assert_relative_eq!(interval.point, 10.0);
        assert_relative_eq!(interval.upper - 10.0, 1.959964, epsilon = 1e-4);
        assert_relative_eq!(10.0 - interval.lower, 1.959964, epsilon = 1e-4);
    }

    #[test]
    fn invalid_coverage_rejected() {
        assert!(GaussianNll::new(1.0).is_err());
        assert!(GaussianNll::new(-0.1).is_err());
    }
}
