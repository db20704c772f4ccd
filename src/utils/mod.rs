//! Metrics and statistical helpers.

pub mod metrics;
pub mod stats;

pub use metrics::{
    calculate_interval_metrics, calculate_metrics, mpiw, picp, winkler_score, AccuracyMetrics,
    IntervalMetrics,
};
pub use stats::z_for_coverage;
