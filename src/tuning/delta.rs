//! Width-penalty (δ) tuning for the Tube loss.
//!
//! A larger δ narrows the learned tube at the cost of coverage. The tuner
//! trains once per candidate δ (through a caller-supplied closure), reads the
//! validation PICP / MPIW and keeps the narrowest tube that still reaches the
//! target coverage.

use crate::error::{ForecastError, Result};
use crate::utils::IntervalMetrics;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, warn};

/// How candidate δ values are generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaSearch {
    /// Evaluate every listed value.
    Grid(Vec<f64>),
    /// `start, start + step, ...` for at most `max_steps` values, stopping
    /// after the first δ whose coverage falls below the target.
    Ascending {
        start: f64,
        step: f64,
        max_steps: usize,
    },
}

impl Default for DeltaSearch {
    fn default() -> Self {
        DeltaSearch::Ascending {
            start: 0.0,
            step: 0.01,
            max_steps: 10,
        }
    }
}

impl DeltaSearch {
    fn validate(&self) -> Result<()> {
        match self {
            DeltaSearch::Grid(values) => {
                if values.is_empty() {
                    return Err(ForecastError::InvalidParameter(
                        "delta grid is empty".to_string(),
                    ));
                }
                for &delta in values {
                    check_delta(delta)?;
                }
            }
            DeltaSearch::Ascending {
                start,
                step,
                max_steps,
            } => {
                check_delta(*start)?;
                if !(step.is_finite() && *step > 0.0) {
                    return Err(ForecastError::InvalidParameter(format!(
                        "delta step must be positive, got {step}"
                    )));
                }
                if *max_steps == 0 {
                    return Err(ForecastError::InvalidParameter(
                        "max_steps must be positive".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Candidate values in evaluation order.
    pub fn candidates(&self) -> Vec<f64> {
        match self {
            DeltaSearch::Grid(values) => values.clone(),
            DeltaSearch::Ascending {
                start,
                step,
                max_steps,
            } => (0..*max_steps).map(|k| start + k as f64 * step).collect(),
        }
    }

    fn stops_early(&self) -> bool {
        matches!(self, DeltaSearch::Ascending { .. })
    }
}

fn check_delta(delta: f64) -> Result<()> {
    if !(delta.is_finite() && delta >= 0.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "delta must be finite and non-negative, got {delta}"
        )));
    }
    Ok(())
}

/// One evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaTrial {
    pub delta: f64,
    pub metrics: IntervalMetrics,
}

/// Outcome of [`DeltaTuner::tune`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaTuningResult {
    pub best_delta: f64,
    pub best_metrics: IntervalMetrics,
    /// Whether the selected trial reaches the target within tolerance
    pub met_target: bool,
    /// Every evaluated candidate, in evaluation order
    pub trials: Vec<DeltaTrial>,
}

/// Searches δ for the narrowest tube that keeps the target coverage.
///
/// # Example
///
/// ```
/// use tubecast::tuning::{DeltaSearch, DeltaTuner};
/// use tubecast::utils::calculate_interval_metrics;
///
/// let actual = [1.0, 2.0, 3.0, 4.0];
/// let tuner = DeltaTuner::new(DeltaSearch::Grid(vec![0.0, 0.5, 1.0]), 0.75, 0.0).unwrap();
///
/// // wider penalty -> narrower intervals
/// let result = tuner
///     .tune(|delta| {
///         let half = 1.5 - delta;
///         let lower: Vec<f64> = actual.iter().map(|y| y - half).collect();
///         let upper: Vec<f64> = actual.iter().map(|y| y + half).collect();
///         calculate_interval_metrics(&actual, &lower, &upper, 0.75)
///     })
///     .unwrap();
/// assert_eq!(result.best_delta, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaTuner {
    pub search: DeltaSearch,
    pub target_coverage: f64,
    /// Coverage shortfall accepted as meeting the target
    pub tolerance: f64,
}

impl DeltaTuner {
    pub fn new(search: DeltaSearch, target_coverage: f64, tolerance: f64) -> Result<Self> {
        let tuner = Self {
            search,
            target_coverage,
            tolerance,
        };
        tuner.validate()?;
        Ok(tuner)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.target_coverage > 0.0 && self.target_coverage < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "target coverage must lie in (0, 1), got {}",
                self.target_coverage
            )));
        }
        if !(0.0..1.0).contains(&self.tolerance) {
            return Err(ForecastError::InvalidParameter(format!(
                "tolerance must lie in [0, 1), got {}",
                self.tolerance
            )));
        }
        self.search.validate()
    }

    fn qualifies(&self, metrics: &IntervalMetrics) -> bool {
        metrics.picp >= self.target_coverage - self.tolerance
    }

    /// Evaluate candidates with `evaluate` (train at δ, return validation
    /// metrics) and select the best.
    pub fn tune<F>(&self, mut evaluate: F) -> Result<DeltaTuningResult>
    where
        F: FnMut(f64) -> Result<IntervalMetrics>,
    {
        self.validate()?;

        let mut trials = Vec::new();
        for delta in self.search.candidates() {
            let metrics = evaluate(delta)?;
            info!(
                delta,
                picp = metrics.picp,
                mpiw = metrics.mpiw,
                "delta trial"
            );
            let qualifies = self.qualifies(&metrics);
            trials.push(DeltaTrial { delta, metrics });
            if self.search.stops_early() && !qualifies {
                break;
            }
        }

        let best = self.select(&trials).ok_or(ForecastError::EmptyData)?;
        let met_target = self.qualifies(&best.metrics);
        if !met_target {
            warn!(
                target = self.target_coverage,
                best_picp = best.metrics.picp,
                "no delta reached the target coverage"
            );
        }

        Ok(DeltaTuningResult {
            best_delta: best.delta,
            best_metrics: best.metrics.clone(),
            met_target,
            trials: trials.clone(),
        })
    }

    fn select<'a>(&self, trials: &'a [DeltaTrial]) -> Option<&'a DeltaTrial> {
        let narrowest = trials
            .iter()
            .filter(|t| self.qualifies(&t.metrics))
            .min_by(|a, b| a.metrics.mpiw.total_cmp(&b.metrics.mpiw));
        narrowest.or_else(|| {
            trials.iter().max_by(|a, b| {
                match a.metrics.picp.total_cmp(&b.metrics.picp) {
                    // narrower wins a coverage tie
                    Ordering::Equal => b.metrics.mpiw.total_cmp(&a.metrics.mpiw),
                    other => other,
                }
            })
        })
    }
}
