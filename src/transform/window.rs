//! Sliding-window datasets for sequence models.
//!
//! Each window holds `lookback` consecutive observations and is paired with the
//! observation `horizon` steps after its last element.

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Window geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindows {
    /// Number of past observations fed to the network.
    pub lookback: usize,
    /// Steps ahead of the window end that the target sits (1 = next step).
    pub horizon: usize,
}

impl Default for SlidingWindows {
    fn default() -> Self {
        Self {
            lookback: 24,
            horizon: 1,
        }
    }
}

impl SlidingWindows {
    pub fn new(lookback: usize, horizon: usize) -> Self {
        Self { lookback, horizon }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            return Err(ForecastError::InvalidParameter(
                "lookback must be positive".to_string(),
            ));
        }
        if self.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Index of the first observation that can serve as a target.
    pub fn first_target(&self) -> usize {
        self.lookback + self.horizon - 1
    }

    /// Slide over `values`, producing every complete window.
    pub fn build(&self, values: &[f64]) -> Result<WindowSet> {
        self.validate()?;
        let needed = self.lookback + self.horizon;
        if values.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: values.len(),
            });
        }

        let first = self.first_target();
        let count = values.len() - first;
        let mut inputs = Array3::zeros((count, self.lookback, 1));
        let mut targets = Array1::zeros(count);
        let mut target_index = Vec::with_capacity(count);

        for (w, target) in (first..values.len()).enumerate() {
            let start = target + 1 - self.horizon - self.lookback;
            for (t, &v) in values[start..start + self.lookback].iter().enumerate() {
                inputs[[w, t, 0]] = v;
            }
            targets[w] = values[target];
            target_index.push(target);
        }

        Ok(WindowSet {
            inputs,
            targets,
            target_index,
        })
    }
}

/// A batch of windows with their targets.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    /// Shape `(windows, lookback, features)`.
    pub inputs: Array3<f64>,
    pub targets: Array1<f64>,
    /// Position of each target in the source series.
    pub target_index: Vec<usize>,
}

impl WindowSet {
    /// A set with no windows.
    pub fn empty(lookback: usize) -> Self {
        WindowSet {
            inputs: Array3::zeros((0, lookback, 1)),
            targets: Array1::zeros(0),
            target_index: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn lookback(&self) -> usize {
        self.inputs.shape()[1]
    }

    /// Windows whose target falls inside `targets` (series positions).
    ///
    /// Inputs may reach back before `targets.start`; only the targets are
    /// confined to the range.
    pub fn select(&self, targets: Range<usize>) -> WindowSet {
        let rows: Vec<usize> = self
            .target_index
            .iter()
            .enumerate()
            .filter(|(_, t)| targets.contains(t))
            .map(|(i, _)| i)
            .collect();
        self.rows(&rows)
    }

    /// Subset by row positions.
    pub fn rows(&self, rows: &[usize]) -> WindowSet {
        if rows.is_empty() {
            let shape = self.inputs.shape();
            return WindowSet {
                inputs: Array3::zeros((0, shape[1], shape[2])),
                targets: Array1::zeros(0),
                target_index: Vec::new(),
            };
        }
        WindowSet {
            inputs: self.inputs.select(Axis(0), rows),
            targets: self.targets.select(Axis(0), rows),
            target_index: rows.iter().map(|&r| self.target_index[r]).collect(),
        }
    }

    pub fn targets_vec(&self) -> Vec<f64> {
        self.targets.to_vec()
    }
}
