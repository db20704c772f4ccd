//! Quantile-regression baseline: two pinball losses at the interval edges.

use super::IntervalObjective;
use crate::core::{IntervalForecast, PredictionInterval};
use crate::error::{ForecastError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Pinball (quantile) loss of `prediction` at level `tau`.
#[inline]
pub fn pinball(target: f64, prediction: f64, tau: f64) -> f64 {
    let diff = target - prediction;
    if diff >= 0.0 {
        tau * diff
    } else {
        (tau - 1.0) * diff
    }
}

#[inline]
fn pinball_grad(target: f64, prediction: f64, tau: f64) -> f64 {
    if target > prediction {
        -tau
    } else {
        1.0 - tau
    }
}

/// Lower and upper quantile heads at `(1 - c) / 2` and `(1 + c) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinballPair {
    pub coverage: f64,
}

impl Default for PinballPair {
    fn default() -> Self {
        Self { coverage: 0.95 }
    }
}

impl PinballPair {
    pub fn new(coverage: f64) -> Result<Self> {
        let pair = Self { coverage };
        pair.validate()?;
        Ok(pair)
    }

    /// Quantile levels of the two heads.
    pub fn levels(&self) -> (f64, f64) {
        let lo = (1.0 - self.coverage) / 2.0;
        (lo, 1.0 - lo)
    }
}

impl IntervalObjective for PinballPair {
    fn name(&self) -> &'static str {
        "Pinball"
    }

    fn target_coverage(&self) -> f64 {
        self.coverage
    }

    fn validate(&self) -> Result<()> {
        if !(self.coverage > 0.0 && self.coverage < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "pinball coverage must lie in (0, 1), got {}",
                self.coverage
            )));
        }
        Ok(())
    }

    fn sample(&self, target: f64, q_lo: f64, q_hi: f64) -> (f64, [f64; 2]) {
        let (tau_lo, tau_hi) = self.levels();
        let loss = pinball(target, q_lo, tau_lo) + pinball(target, q_hi, tau_hi);
        (
            loss,
            [
                pinball_grad(target, q_lo, tau_lo),
                pinball_grad(target, q_hi, tau_hi),
            ],
        )
    }

    fn decode(&self, outputs: &Array2<f64>) -> Result<IntervalForecast> {
        super::check_output_shape(outputs)?;
        Ok(IntervalForecast::from_intervals(outputs.rows().into_iter().map(
            |row| {
                let (lo, hi) = if row[0] <= row[1] {
                    (row[0], row[1])
                } else {
                    (row[1], row[0])
                };
                PredictionInterval::new(lo, 0.5 * (lo + hi), hi)
            },
        )))
    }
}
