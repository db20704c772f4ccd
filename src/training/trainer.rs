//! Mini-batch training loop with early stopping.

use crate::error::{ForecastError, Result};
use crate::loss::IntervalObjective;
use crate::models::IntervalNetwork;
use crate::nn::{clip_grad_norm, Module, OptimizerKind};
use crate::transform::WindowSet;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for [`Trainer`].
///
/// # Example
///
/// ```
/// use tubecast::training::TrainerConfig;
///
/// let config = TrainerConfig::default()
///     .with_epochs(20)
///     .with_batch_size(32)
///     .with_patience(5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Maximum global gradient norm (0 disables clipping)
    pub grad_clip: f64,
    /// Epochs without improvement before stopping (0 disables early stopping)
    pub patience: usize,
    /// Improvement below this does not reset the patience counter
    pub min_delta: f64,
    pub shuffle: bool,
    pub seed: u64,
    pub optimizer: OptimizerKind,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 64,
            learning_rate: 1e-3,
            grad_clip: 1.0,
            patience: 10,
            min_delta: 0.0,
            shuffle: true,
            seed: 42,
            optimizer: OptimizerKind::default(),
        }
    }
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_grad_clip(mut self, grad_clip: f64) -> Self {
        self.grad_clip = grad_clip;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ForecastError::InvalidParameter(
                "epochs must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "batch_size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.grad_clip >= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "grad_clip must be non-negative, got {}",
                self.grad_clip
            )));
        }
        if !(self.min_delta >= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "min_delta must be non-negative, got {}",
                self.min_delta
            )));
        }
        Ok(())
    }
}

/// Per-epoch losses of one training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_loss: Vec<f64>,
    /// Empty when training ran without a validation set
    pub validation_loss: Vec<f64>,
    /// Epoch whose weights were kept
    pub best_epoch: usize,
    /// Monitored loss at `best_epoch`
    pub best_loss: f64,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn epochs_run(&self) -> usize {
        self.train_loss.len()
    }
}

/// Fits an [`IntervalNetwork`] to windows under an interval objective.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train `network` in place.
    ///
    /// The monitored loss is the validation loss when `validation` is
    /// non-empty, the training loss otherwise. On return the network holds the
    /// weights of the best monitored epoch.
    pub fn fit<O>(
        &self,
        network: &mut IntervalNetwork,
        objective: &O,
        train: &WindowSet,
        validation: &WindowSet,
    ) -> Result<TrainingHistory>
    where
        O: IntervalObjective + ?Sized,
    {
        self.config.validate()?;
        objective.validate()?;
        if train.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        let config = &self.config;
        let mut optimizer = config.optimizer.build(config.learning_rate)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut order: Vec<usize> = (0..train.len()).collect();

        let mut history = TrainingHistory {
            best_loss: f64::INFINITY,
            ..Default::default()
        };
        let mut best_network = network.clone();
        let mut since_best = 0;

        for epoch in 0..config.epochs {
            if config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut epoch_loss = 0.0;
            for chunk in order.chunks(config.batch_size) {
                let batch = train.rows(chunk);
                network.zero_grad();
                let outputs = network.forward(&batch.inputs)?;
                let (loss, grad) = objective.loss_and_grad(&outputs, &batch.targets)?;
                if !loss.is_finite() {
                    return Err(ForecastError::ComputationError(format!(
                        "non-finite training loss at epoch {epoch}"
                    )));
                }
                network.backward(&grad)?;

                let mut params = network.params();
                clip_grad_norm(&mut params, config.grad_clip);
                optimizer.step(params);

                epoch_loss += loss * chunk.len() as f64;
            }
            let train_loss = epoch_loss / train.len() as f64;
            history.train_loss.push(train_loss);

            let monitored = if validation.is_empty() {
                train_loss
            } else {
                let loss = self.evaluate(network, objective, validation)?;
                if !loss.is_finite() {
                    return Err(ForecastError::ComputationError(format!(
                        "non-finite validation loss at epoch {epoch}"
                    )));
                }
                history.validation_loss.push(loss);
                loss
            };
            debug!(epoch, train_loss, monitored, "epoch finished");

            if monitored < history.best_loss - config.min_delta {
                history.best_loss = monitored;
                history.best_epoch = epoch;
                best_network = network.clone();
                since_best = 0;
            } else {
                since_best += 1;
                if config.patience > 0 && since_best >= config.patience {
                    info!(
                        epoch,
                        best_epoch = history.best_epoch,
                        best_loss = history.best_loss,
                        "early stopping"
                    );
                    history.stopped_early = true;
                    break;
                }
            }
        }

        if history.best_epoch + 1 < history.epochs_run() {
            debug!(best_epoch = history.best_epoch, "restoring best weights");
        }
        *network = best_network;
        Ok(history)
    }

    /// Mean objective value over `set`, evaluated in batches.
    pub fn evaluate<O>(
        &self,
        network: &mut IntervalNetwork,
        objective: &O,
        set: &WindowSet,
    ) -> Result<f64>
    where
        O: IntervalObjective + ?Sized,
    {
        if set.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        let indices: Vec<usize> = (0..set.len()).collect();
        let mut total = 0.0;
        for chunk in indices.chunks(self.config.batch_size.max(1)) {
            let batch = set.rows(chunk);
            let outputs = network.forward(&batch.inputs)?;
            total += objective.loss(&outputs, &batch.targets)? * chunk.len() as f64;
        }
        Ok(total / set.len() as f64)
    }

    /// Raw network outputs for every window in `set`, shape `(n, 2)`.
    pub fn predict(&self, network: &mut IntervalNetwork, set: &WindowSet) -> Result<Array2<f64>> {
        if set.is_empty() {
            return Ok(Array2::zeros((0, 2)));
        }
        let indices: Vec<usize> = (0..set.len()).collect();
        let mut outputs = Vec::with_capacity(set.len() * 2);
        for chunk in indices.chunks(self.config.batch_size.max(1)) {
            let batch = set.rows(chunk);
            outputs.extend(network.forward(&batch.inputs)?.iter().copied());
        }
        Array2::from_shape_vec((set.len(), 2), outputs).map_err(|e| {
            warn!(error = %e, "prediction buffer has the wrong shape");
            ForecastError::ComputationError(e.to_string())
        })
    }
}
