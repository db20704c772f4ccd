//! Prediction interval triples and collections of them.

use crate::error::{ForecastError, Result};
use crate::transform::ScaleResult;
use serde::{Deserialize, Serialize};

/// A single prediction interval: lower bound, point estimate, upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInterval {
    pub lower: f64,
    pub point: f64,
    pub upper: f64,
}

impl PredictionInterval {
    pub fn new(lower: f64, point: f64, upper: f64) -> Self {
        Self {
            lower,
            point,
            upper,
        }
    }

    /// Interval width (`upper - lower`).
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    /// Whether `value` lies inside the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Interval predictions for a batch of windows, stored column-wise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalForecast {
    lower: Vec<f64>,
    point: Vec<f64>,
    upper: Vec<f64>,
}

impl IntervalForecast {
    /// Create an empty forecast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel bound vectors.
    pub fn from_bounds(lower: Vec<f64>, point: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if point.len() != lower.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: lower.len(),
                got: point.len(),
            });
        }
        if upper.len() != lower.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: lower.len(),
                got: upper.len(),
            });
        }
        Ok(Self {
            lower,
            point,
            upper,
        })
    }

    pub fn from_intervals<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = PredictionInterval>,
    {
        let mut forecast = Self::new();
        for interval in intervals {
            forecast.push(interval);
        }
        forecast
    }

    pub fn push(&mut self, interval: PredictionInterval) {
        self.lower.push(interval.lower);
        self.point.push(interval.point);
        self.upper.push(interval.upper);
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<PredictionInterval> {
        if index >= self.len() {
            return Err(ForecastError::IndexOutOfBounds {
                index,
                size: self.len(),
            });
        }
        Ok(PredictionInterval::new(
            self.lower[index],
            self.point[index],
            self.upper[index],
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = PredictionInterval> + '_ {
        (0..self.len()).map(move |i| {
            PredictionInterval::new(self.lower[i], self.point[i], self.upper[i])
        })
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn widths(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(l, u)| u - l)
            .collect()
    }

    /// Map every bound back to the original units of `scale`.
    ///
    /// Scales are strictly positive, so bound ordering is preserved.
    pub fn inverse_scaled(&self, scale: &ScaleResult) -> IntervalForecast {
        IntervalForecast {
            lower: self.lower.iter().map(|&v| scale.inverse_value(v)).collect(),
            point: self.point.iter().map(|&v| scale.inverse_value(v)).collect(),
            upper: self.upper.iter().map(|&v| scale.inverse_value(v)).collect(),
        }
    }
}
