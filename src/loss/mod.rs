//! Interval training objectives.
//!
//! Every network in this crate has a two-unit output head. An objective
//! decides what the two units mean (interval edges, mean and spread, or two
//! quantiles), how they are penalized, and how they are decoded into
//! [`PredictionInterval`](crate::core::PredictionInterval)s.

mod gaussian;
mod pinball;
mod tube;

pub use gaussian::{softplus, GaussianNll};
pub use pinball::{pinball, PinballPair};
pub use tube::TubeLoss;

use crate::core::IntervalForecast;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Common interface of the interval objectives.
pub trait IntervalObjective {
    /// Short display name.
    fn name(&self) -> &'static str;

    /// Nominal coverage of the decoded intervals.
    fn target_coverage(&self) -> f64;

    /// Check parameter ranges.
    fn validate(&self) -> Result<()>;

    /// Loss and gradient with respect to the two raw outputs for one target.
    fn sample(&self, target: f64, first: f64, second: f64) -> (f64, [f64; 2]);

    /// Turn raw network outputs of shape `(n, 2)` into intervals.
    fn decode(&self, outputs: &Array2<f64>) -> Result<IntervalForecast>;

    /// Mean loss over a batch and its gradient with respect to `outputs`.
    fn loss_and_grad(
        &self,
        outputs: &Array2<f64>,
        targets: &Array1<f64>,
    ) -> Result<(f64, Array2<f64>)> {
        let n = check_batch(outputs, targets)?;
        let scale = 1.0 / n as f64;
        let mut grad = Array2::zeros((n, 2));
        let mut total = 0.0;

        for (i, &y) in targets.iter().enumerate() {
            let (loss, g) = self.sample(y, outputs[[i, 0]], outputs[[i, 1]]);
            total += loss;
            grad[[i, 0]] = g[0] * scale;
            grad[[i, 1]] = g[1] * scale;
        }
        Ok((total * scale, grad))
    }

    /// Mean loss over a batch.
    fn loss(&self, outputs: &Array2<f64>, targets: &Array1<f64>) -> Result<f64> {
        let n = check_batch(outputs, targets)?;
        let total: f64 = targets
            .iter()
            .enumerate()
            .map(|(i, &y)| self.sample(y, outputs[[i, 0]], outputs[[i, 1]]).0)
            .sum();
        Ok(total / n as f64)
    }
}

pub(crate) fn check_output_shape(outputs: &Array2<f64>) -> Result<()> {
    if outputs.ncols() != 2 {
        return Err(ForecastError::DimensionMismatch {
            expected: 2,
            got: outputs.ncols(),
        });
    }
    Ok(())
}

fn check_batch(outputs: &Array2<f64>, targets: &Array1<f64>) -> Result<usize> {
    check_output_shape(outputs)?;
    if targets.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if outputs.nrows() != targets.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: targets.len(),
            got: outputs.nrows(),
        });
    }
    Ok(targets.len())
}

/// Serializable choice of objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Objective {
    Tube(TubeLoss),
    Gaussian(GaussianNll),
    Pinball(PinballPair),
}

impl Default for Objective {
    fn default() -> Self {
        Objective::Tube(TubeLoss::default())
    }
}

impl Objective {
    /// Current Tube width penalty, if this is a Tube objective.
    pub fn delta(&self) -> Option<f64> {
        match self {
            Objective::Tube(tube) => Some(tube.delta),
            _ => None,
        }
    }

    /// Copy with a new Tube width penalty.
    pub fn with_delta(&self, delta: f64) -> Result<Objective> {
        match self {
            Objective::Tube(tube) => {
                let tuned = tube.with_delta(delta);
                tuned.validate()?;
                Ok(Objective::Tube(tuned))
            }
            other => Err(ForecastError::InvalidParameter(format!(
                "delta applies only to the Tube objective, not {}",
                other.name()
            ))),
        }
    }

    fn inner(&self) -> &dyn IntervalObjective {
        match self {
            Objective::Tube(o) => o,
            Objective::Gaussian(o) => o,
            Objective::Pinball(o) => o,
        }
    }
}

impl IntervalObjective for Objective {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn target_coverage(&self) -> f64 {
        self.inner().target_coverage()
    }

    fn validate(&self) -> Result<()> {
        self.inner().validate()
    }

    fn sample(&self, target: f64, first: f64, second: f64) -> (f64, [f64; 2]) {
        self.inner().sample(target, first, second)
    }

    fn decode(&self, outputs: &Array2<f64>) -> Result<IntervalForecast> {
        self.inner().decode(outputs)
    }
}
