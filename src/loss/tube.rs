//! Tube loss: distribution-free training objective for prediction intervals.
//!
//! The network emits two values per window, read as the lower and upper edge
//! of a "tube". Points outside the tube are penalized with weight `t` (the
//! target coverage) and points inside with weight `1 - t`, measured from the
//! edge nearer to them as decided by the split line
//! `m = r * upper + (1 - r) * lower`. At the optimum roughly a fraction `t` of
//! the training targets falls inside the tube.
//!
//! ```text
//! rho(y, l, u) = t * (y - u)          y > u
//!              = (1 - t) * (u - y)    m <= y <= u
//!              = (1 - t) * (y - l)    l <= y <  m
//!              = t * (l - y)          y < l
//! loss         = rho + delta * |u - l|
//! ```
//!
//! `delta` adds a width penalty; it is the knob adjusted by
//! [`DeltaTuner`](crate::tuning::DeltaTuner).

use super::IntervalObjective;
use crate::core::{IntervalForecast, PredictionInterval};
use crate::error::{ForecastError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Tube loss parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TubeLoss {
    /// Target coverage `t` in (0, 1).
    pub coverage: f64,
    /// Split position `r` in [0, 1]; 0.5 makes the penalty symmetric.
    pub recentering: f64,
    /// Width penalty `delta >= 0`.
    pub delta: f64,
}

impl Default for TubeLoss {
    fn default() -> Self {
        Self {
            coverage: 0.95,
            recentering: 0.5,
            delta: 0.0,
        }
    }
}

impl TubeLoss {
    /// Create a validated Tube loss.
    pub fn new(coverage: f64, recentering: f64, delta: f64) -> Result<Self> {
        let loss = Self {
            coverage,
            recentering,
            delta,
        };
        loss.check()?;
        Ok(loss)
    }

    /// Symmetric tube (`r = 0.5`) without width penalty.
    pub fn symmetric(coverage: f64) -> Result<Self> {
        Self::new(coverage, 0.5, 0.0)
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_recentering(mut self, recentering: f64) -> Self {
        self.recentering = recentering;
        self
    }

    fn check(&self) -> Result<()> {
        if !(self.coverage > 0.0 && self.coverage < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "tube coverage must lie in (0, 1), got {}",
                self.coverage
            )));
        }
        if !(0.0..=1.0).contains(&self.recentering) {
            return Err(ForecastError::InvalidParameter(format!(
                "tube recentering must lie in [0, 1], got {}",
                self.recentering
            )));
        }
        if !(self.delta >= 0.0 && self.delta.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "tube delta must be finite and non-negative, got {}",
                self.delta
            )));
        }
        Ok(())
    }

    /// Split line between the two bounds.
    #[inline]
    pub fn point(&self, lower: f64, upper: f64) -> f64 {
        self.recentering * upper + (1.0 - self.recentering) * lower
    }

    /// Loss for a single observation. Crossed bounds are re-ordered first.
    pub fn value(&self, y: f64, lower: f64, upper: f64) -> f64 {
        let (lo, hi) = ordered(lower, upper);
        let t = self.coverage;
        let rho = if y > hi {
            t * (y - hi)
        } else if y < lo {
            t * (lo - y)
        } else if y >= self.point(lo, hi) {
            (1.0 - t) * (hi - y)
        } else {
            (1.0 - t) * (y - lo)
        };
        rho + self.delta * (hi - lo)
    }

    /// Sub-gradient `(d/d lower, d/d upper)` for a single observation.
    ///
    /// With crossed bounds the gradient is routed back to the head that
    /// actually played each role.
    pub fn gradient(&self, y: f64, lower: f64, upper: f64) -> (f64, f64) {
        let (lo, hi) = ordered(lower, upper);
        let t = self.coverage;
        let (mut g_lo, mut g_hi) = if y > hi {
            (0.0, -t)
        } else if y < lo {
            (t, 0.0)
        } else if y >= self.point(lo, hi) {
            (0.0, 1.0 - t)
        } else {
            (t - 1.0, 0.0)
        };
        g_lo -= self.delta;
        g_hi += self.delta;

        if lower <= upper {
            (g_lo, g_hi)
        } else {
            (g_hi, g_lo)
        }
    }
}

#[inline]
fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl IntervalObjective for TubeLoss {
    fn name(&self) -> &'static str {
        "Tube"
    }

    fn target_coverage(&self) -> f64 {
        self.coverage
    }

    fn validate(&self) -> Result<()> {
        self.check()
    }

    fn sample(&self, target: f64, first: f64, second: f64) -> (f64, [f64; 2]) {
        let (g_lo, g_hi) = self.gradient(target, first, second);
        (self.value(target, first, second), [g_lo, g_hi])
    }

    fn decode(&self, outputs: &Array2<f64>) -> Result<IntervalForecast> {
        super::check_output_shape(outputs)?;
        Ok(IntervalForecast::from_intervals(outputs.rows().into_iter().map(
            |row| {
                let (lo, hi) = ordered(row[0], row[1]);
                PredictionInterval::new(lo, self.point(lo, hi), hi)
            },
        )))
    }
}
