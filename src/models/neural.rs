//! Neural interval forecaster: network + objective + trainer.

use super::config::NetworkConfig;
use super::network::IntervalNetwork;
use super::traits::IntervalForecaster;
use crate::core::IntervalForecast;
use crate::error::{ForecastError, Result};
use crate::loss::{IntervalObjective, Objective};
use crate::training::{Trainer, TrainerConfig, TrainingHistory};
use crate::transform::WindowSet;

/// Interval forecaster backed by an [`IntervalNetwork`].
///
/// # Example
///
/// ```
/// use tubecast::loss::{Objective, TubeLoss};
/// use tubecast::models::{Architecture, IntervalForecaster, NetworkConfig, NeuralForecaster};
/// use tubecast::training::TrainerConfig;
/// use tubecast::transform::SlidingWindows;
///
/// let values: Vec<f64> = (0..80).map(|i| 0.5 + 0.3 * (i as f64 * 0.4).sin()).collect();
/// let windows = SlidingWindows::new(8, 1).build(&values).unwrap();
/// let (train, test) = (windows.select(0..60), windows.select(60..80));
///
/// let mut model = NeuralForecaster::new(
///     &NetworkConfig::new(Architecture::Gru).with_hidden_size(4),
///     Objective::Tube(TubeLoss::symmetric(0.9).unwrap()),
///     TrainerConfig::default().with_epochs(3),
/// )
/// .unwrap();
/// model.fit(&train, &test).unwrap();
///
/// let intervals = model.predict_intervals(&test).unwrap();
/// assert_eq!(intervals.len(), test.len());
/// ```
#[derive(Debug, Clone)]
pub struct NeuralForecaster {
    name: String,
    network: IntervalNetwork,
    objective: Objective,
    trainer: Trainer,
    history: Option<TrainingHistory>,
}

impl NeuralForecaster {
    /// Build an untrained forecaster for univariate windows.
    pub fn new(
        network_config: &NetworkConfig,
        objective: Objective,
        trainer_config: TrainerConfig,
    ) -> Result<Self> {
        objective.validate()?;
        let network = IntervalNetwork::new(network_config, 1)?;
        Ok(Self::assemble(network, objective, trainer_config, None))
    }

    /// Wrap an already trained network (e.g. one restored from a checkpoint).
    pub fn from_trained(
        network: IntervalNetwork,
        objective: Objective,
        trainer_config: TrainerConfig,
    ) -> Self {
        Self::assemble(
            network,
            objective,
            trainer_config,
            Some(TrainingHistory::default()),
        )
    }

    fn assemble(
        network: IntervalNetwork,
        objective: Objective,
        trainer_config: TrainerConfig,
        history: Option<TrainingHistory>,
    ) -> Self {
        let name = format!(
            "{}-{}",
            network.config().architecture.name(),
            objective.name()
        );
        Self {
            name,
            network,
            objective,
            trainer: Trainer::new(trainer_config),
            history,
        }
    }

    pub fn network(&self) -> &IntervalNetwork {
        &self.network
    }

    pub fn into_network(self) -> IntervalNetwork {
        self.network
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Mean objective value over `windows` with the current weights.
    pub fn evaluate_loss(&mut self, windows: &WindowSet) -> Result<f64> {
        self.trainer
            .evaluate(&mut self.network, &self.objective, windows)
    }
}

impl IntervalForecaster for NeuralForecaster {
    fn fit(&mut self, train: &WindowSet, validation: &WindowSet) -> Result<()> {
        let history = self
            .trainer
            .fit(&mut self.network, &self.objective, train, validation)?;
        self.history = Some(history);
        Ok(())
    }

    fn predict_intervals(&mut self, windows: &WindowSet) -> Result<IntervalForecast> {
        if !self.is_fitted() {
            return Err(ForecastError::FitRequired);
        }
        let outputs = self.trainer.predict(&mut self.network, windows)?;
        self.objective.decode(&outputs)
    }

    fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
