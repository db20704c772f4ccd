//! # tubecast
//!
//! Probabilistic wind-speed forecasting with neural prediction intervals.
//!
//! Recurrent (LSTM, GRU) and temporal-convolutional networks map a window of
//! past observations to an interval for the next one. Intervals are learned
//! directly with the Tube loss, or derived from a Gaussian head or a pair of
//! quantile heads, and scored with PICP / MPIW.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod data;
pub mod error;
pub mod loss;
pub mod models;
pub mod nn;
pub mod pipeline;
pub mod training;
pub mod transform;
pub mod tuning;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::core::{IntervalForecast, MissingValuePolicy, PredictionInterval, WindSeries};
    pub use crate::error::{ForecastError, Result};
    pub use crate::loss::{GaussianNll, IntervalObjective, Objective, PinballPair, TubeLoss};
    pub use crate::models::{Architecture, IntervalForecaster, NetworkConfig, NeuralForecaster};
    pub use crate::pipeline::{run_experiment, ExperimentConfig, ExperimentReport};
    pub use crate::training::{Trainer, TrainerConfig};
    pub use crate::transform::{ScalingMethod, SlidingWindows};
    pub use crate::tuning::{DeltaSearch, DeltaTuner};
    pub use crate::utils::{calculate_interval_metrics, mpiw, picp, IntervalMetrics};
}
