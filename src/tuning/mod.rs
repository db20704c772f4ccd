//! Hyper-parameter search for the interval objectives.

mod delta;

pub use delta::{DeltaSearch, DeltaTrial, DeltaTuner, DeltaTuningResult};
