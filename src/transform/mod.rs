//! Data transformations applied before training.
//!
//! Provides scaling / normalization and the sliding-window dataset builder.
//!
//! # Example
//!
//! ```
//! use tubecast::transform::{ScalingMethod, SlidingWindows};
//!
//! let series: Vec<f64> = (0..48).map(|i| 5.0 + (i as f64 / 4.0).sin()).collect();
//!
//! // Normalize to [0, 1] using the series itself as the training range
//! let scale = ScalingMethod::MinMax.fit(&series);
//!
//! // 24-step lookback, next-step target
//! let windows = SlidingWindows::new(24, 1).build(&scale.data).unwrap();
//! assert_eq!(windows.len(), 24);
//! ```

pub mod scale;
pub mod window;

pub use scale::{normalize, robust_scale, standardize, ScaleResult, ScalingMethod};
pub use window::{SlidingWindows, WindowSet};
