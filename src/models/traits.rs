//! Forecaster trait defining the common interface for interval models.

use crate::core::IntervalForecast;
use crate::error::Result;
use crate::training::TrainingHistory;
use crate::transform::WindowSet;

/// Common interface for models that predict intervals from windows.
///
/// This trait is object-safe and can be used with `Box<dyn IntervalForecaster>`.
pub trait IntervalForecaster {
    /// Fit the model. `validation` may be empty.
    fn fit(&mut self, train: &WindowSet, validation: &WindowSet) -> Result<()>;

    /// Predict one interval per window, in the scale the model was trained on.
    fn predict_intervals(&mut self, windows: &WindowSet) -> Result<IntervalForecast>;

    /// Loss curves of the last fit, if any.
    fn history(&self) -> Option<&TrainingHistory>;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.history().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
///
/// # Example
///
/// ```
/// use tubecast::loss::Objective;
/// use tubecast::models::{BoxedForecaster, NetworkConfig, NeuralForecaster};
/// use tubecast::training::TrainerConfig;
///
/// let model: BoxedForecaster = Box::new(
///     NeuralForecaster::new(&NetworkConfig::default(), Objective::default(), TrainerConfig::default())
///         .unwrap(),
/// );
/// assert_eq!(model.name(), "LSTM-Tube");
/// assert!(!model.is_fitted());
/// ```
pub type BoxedForecaster = Box<dyn IntervalForecaster>;
