//! JSON model checkpoints.

use crate::core::IntervalForecast;
use crate::error::{ForecastError, Result};
use crate::loss::{IntervalObjective, Objective};
use crate::models::{IntervalNetwork, NetworkConfig};
use crate::transform::{ScaleResult, SlidingWindows};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Everything needed to turn raw observations into intervals again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub network_config: NetworkConfig,
    pub network: IntervalNetwork,
    pub objective: Objective,
    /// Scaler fitted on the training segment
    pub scaler: ScaleResult,
    pub window: SlidingWindows,
    pub created_at: DateTime<Utc>,
}

impl ModelCheckpoint {
    pub fn new(
        network: IntervalNetwork,
        objective: Objective,
        scaler: ScaleResult,
        window: SlidingWindows,
    ) -> Self {
        Self {
            network_config: network.config().clone(),
            network,
            objective,
            scaler,
            window,
            created_at: Utc::now(),
        }
    }

    /// Interval for the observation following every complete window of
    /// `values` (raw units in, raw units out).
    ///
    /// Entry `i` predicts `values[i + lookback + horizon - 1]`; the final
    /// window predicts `horizon` steps past the end of `values`.
    pub fn predict(&mut self, values: &[f64]) -> Result<IntervalForecast> {
        let scaled = self.scaler.transform(values);
        let needed = self.window.lookback;
        if scaled.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: scaled.len(),
            });
        }
        // padding targets are never read; they only let build() emit the
        // trailing window
        let mut padded = scaled;
        padded.extend(std::iter::repeat(0.0).take(self.window.horizon));
        let windows = self.window.build(&padded)?;
        let outputs = self.network.forward(&windows.inputs)?;
        Ok(self.objective.decode(&outputs)?.inverse_scaled(&self.scaler))
    }

    fn check(&self) -> Result<()> {
        if self.network.config() != &self.network_config {
            return Err(ForecastError::Parse(
                "checkpoint network does not match its configuration".to_string(),
            ));
        }
        if !(self.scaler.scale.is_finite() && self.scaler.scale > 0.0) {
            return Err(ForecastError::Parse(format!(
                "checkpoint scaler has invalid scale {}",
                self.scaler.scale
            )));
        }
        if self.network.input_size() != 1 {
            return Err(ForecastError::Parse(format!(
                "checkpoint network expects {} features per step, windows carry 1",
                self.network.input_size()
            )));
        }
        self.network.check_shapes()?;
        self.window.validate()?;
        self.objective.validate()
    }
}

/// Write `checkpoint` as pretty-printed JSON, creating parent directories.
pub fn save_checkpoint(path: impl AsRef<Path>, checkpoint: &ModelCheckpoint) -> Result<()> {
    let path = path.as_ref();
    info!(path = %path.display(), model = checkpoint.network_config.architecture.name(), "saving checkpoint");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(checkpoint)?;
    std::fs::write(path, json)?;

    debug!(
        path = %path.display(),
        size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        "checkpoint saved"
    );
    Ok(())
}

/// Read a checkpoint written by [`save_checkpoint`].
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<ModelCheckpoint> {
    let path = path.as_ref();
    info!(path = %path.display(), "restoring checkpoint");

    let json = std::fs::read_to_string(path)?;
    let checkpoint: ModelCheckpoint = serde_json::from_str(&json)?;
    checkpoint.check()?;
    Ok(checkpoint)
}
