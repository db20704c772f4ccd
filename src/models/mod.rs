//! Interval forecasting models.

mod config;
mod network;
mod neural;
mod traits;

pub use config::{Architecture, NetworkConfig};
pub use network::{IntervalNetwork, SequenceBlock};
pub use neural::NeuralForecaster;
pub use traits::{BoxedForecaster, IntervalForecaster};
