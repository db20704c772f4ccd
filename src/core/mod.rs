//! Core data structures: the observed series and interval predictions.

mod interval;
mod series;

pub use interval::{IntervalForecast, PredictionInterval};
pub use series::{MissingValuePolicy, WindSeries};
