//! End-to-end experiment: split, scale, window, train, evaluate.

use crate::core::{IntervalForecast, MissingValuePolicy, WindSeries};
use crate::error::{ForecastError, Result};
use crate::loss::{IntervalObjective, Objective};
use crate::models::{IntervalForecaster, NetworkConfig, NeuralForecaster};
use crate::nn::Module;
use crate::training::{ModelCheckpoint, TrainerConfig, TrainingHistory};
use crate::transform::{ScaleResult, ScalingMethod, SlidingWindows, WindowSet};
use crate::tuning::{DeltaSearch, DeltaTuner, DeltaTuningResult};
use crate::utils::{calculate_interval_metrics, calculate_metrics, AccuracyMetrics, IntervalMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Chronological split and preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub train_fraction: f64,
    pub validation_fraction: f64,
    pub scaling: ScalingMethod,
    pub missing: MissingValuePolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            validation_fraction: 0.15,
            scaling: ScalingMethod::MinMax,
            missing: MissingValuePolicy::ForwardFill,
        }
    }
}

/// δ search settings; the target coverage comes from the objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub search: DeltaSearch,
    pub tolerance: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            search: DeltaSearch::default(),
            tolerance: 0.01,
        }
    }
}

/// Complete description of one run, typically read from JSON.
///
/// Every section is optional in the file and falls back to its default.
///
/// ```
/// use tubecast::pipeline::ExperimentConfig;
///
/// let config = ExperimentConfig::from_json_str(
///     r#"{"window": {"lookback": 12, "horizon": 1}, "objective": {"kind": "gaussian"}}"#,
/// )
/// .unwrap();
/// assert_eq!(config.window.lookback, 12);
/// assert_eq!(config.data.train_fraction, 0.7);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    pub window: SlidingWindows,
    pub network: NetworkConfig,
    pub objective: Objective,
    pub training: TrainerConfig,
    /// δ tuning on the validation segment (Tube objective only)
    pub tuning: Option<TuningConfig>,
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ExperimentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.network.validate()?;
        self.objective.validate()?;
        self.training.validate()?;
        if let Some(tuning) = &self.tuning {
            if self.objective.delta().is_none() {
                return Err(ForecastError::InvalidParameter(format!(
                    "delta tuning requires the Tube objective, not {}",
                    self.objective.name()
                )));
            }
            DeltaTuner::new(
                tuning.search.clone(),
                self.objective.target_coverage(),
                tuning.tolerance,
            )?;
        }
        Ok(())
    }
}

/// Everything a run produced, in original units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub model: String,
    /// Objective used for the final fit (with the tuned δ)
    pub objective: Objective,
    pub delta: Option<f64>,
    pub num_parameters: usize,
    pub history: TrainingHistory,
    pub tuning: Option<DeltaTuningResult>,
    pub validation_metrics: Option<IntervalMetrics>,
    pub test_metrics: IntervalMetrics,
    pub point_metrics: AccuracyMetrics,
    pub forecast: IntervalForecast,
    pub actual: Vec<f64>,
    pub test_timestamps: Option<Vec<DateTime<Utc>>>,
}

struct Prepared {
    series: WindSeries,
    scaler: ScaleResult,
    train: WindowSet,
    validation: WindowSet,
    test: WindowSet,
}

impl Prepared {
    fn new(series: &WindSeries, config: &ExperimentConfig) -> Result<Self> {
        let series = series.sanitized(config.data.missing)?;
        let (train_end, validation_end) = series
            .split_points(config.data.train_fraction, config.data.validation_fraction)?;

        let scaler = config.data.scaling.fit(&series.values()[..train_end]);
        let windows = config.window.build(&scaler.transform(series.values()))?;

        let train = windows.select(0..train_end);
        if train.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: config.window.first_target() + 1,
                got: train_end,
            });
        }
        let validation = windows.select(train_end..validation_end);
        let test = windows.select(validation_end..series.len());
        if test.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: validation_end + 1,
                got: series.len(),
            });
        }

        info!(
            train = train.len(),
            validation = validation.len(),
            test = test.len(),
            "windows prepared"
        );
        Ok(Self {
            series,
            scaler,
            train,
            validation,
            test,
        })
    }

    /// Observations at the targets of `set`, in original units.
    fn actual(&self, set: &WindowSet) -> Vec<f64> {
        set.target_index
            .iter()
            .map(|&i| self.series.values()[i])
            .collect()
    }

    fn evaluate(
        &self,
        model: &mut NeuralForecaster,
        set: &WindowSet,
        target: f64,
    ) -> Result<(Vec<f64>, IntervalForecast, IntervalMetrics)> {
        let forecast = model.predict_intervals(set)?.inverse_scaled(&self.scaler);
        let actual = self.actual(set);
        let metrics = calculate_interval_metrics(&actual, forecast.lower(), forecast.upper(), target)?;
        Ok((actual, forecast, metrics))
    }
}

fn tune_delta(
    prepared: &Prepared,
    config: &ExperimentConfig,
    tuning: &TuningConfig,
) -> Result<DeltaTuningResult> {
    if prepared.validation.is_empty() {
        return Err(ForecastError::InsufficientData {
            needed: 1,
            got: 0,
        });
    }
    let target = config.objective.target_coverage();
    let tuner = DeltaTuner::new(tuning.search.clone(), target, tuning.tolerance)?;
    tuner.tune(|delta| {
        let objective = config.objective.with_delta(delta)?;
        let mut model = NeuralForecaster::new(&config.network, objective, config.training.clone())?;
        model.fit(&prepared.train, &prepared.validation)?;
        let (_, _, metrics) = prepared.evaluate(&mut model, &prepared.validation, target)?;
        Ok(metrics)
    })
}

/// Run an experiment and keep the trained model.
pub fn train_and_evaluate(
    series: &WindSeries,
    config: &ExperimentConfig,
) -> Result<(ExperimentReport, ModelCheckpoint)> {
    config.validate()?;
    let prepared = Prepared::new(series, config)?;
    let target = config.objective.target_coverage();

    let (objective, tuning) = match &config.tuning {
        Some(tuning) => {
            let result = tune_delta(&prepared, config, tuning)?;
            info!(
                delta = result.best_delta,
                met_target = result.met_target,
                "delta selected"
            );
            (config.objective.with_delta(result.best_delta)?, Some(result))
        }
        None => (config.objective, None),
    };

    let mut model = NeuralForecaster::new(&config.network, objective, config.training.clone())?;
    model.fit(&prepared.train, &prepared.validation)?;
    let history = model.history().cloned().unwrap_or_default();

    let validation_metrics = if prepared.validation.is_empty() {
        None
    } else {
        Some(prepared.evaluate(&mut model, &prepared.validation, target)?.2)
    };
    let (actual, forecast, test_metrics) = prepared.evaluate(&mut model, &prepared.test, target)?;
    let point_metrics = calculate_metrics(&actual, forecast.point())?;
    let test_timestamps = prepared.series.timestamps().map(|ts| {
        prepared
            .test
            .target_index
            .iter()
            .map(|&i| ts[i])
            .collect()
    });

    info!(
        model = model.name(),
        picp = test_metrics.picp,
        mpiw = test_metrics.mpiw,
        rmse = point_metrics.rmse,
        "test evaluation"
    );

    let name = model.name().to_string();
    let mut network = model.into_network();
    let report = ExperimentReport {
        model: name,
        objective,
        delta: objective.delta(),
        num_parameters: network.num_parameters(),
        history,
        tuning,
        validation_metrics,
        test_metrics,
        point_metrics,
        forecast,
        actual,
        test_timestamps,
    };
    let checkpoint = ModelCheckpoint::new(network, objective, prepared.scaler, config.window);
    Ok((report, checkpoint))
}

/// Run an experiment on `series` as described by `config`.
pub fn run_experiment(series: &WindSeries, config: &ExperimentConfig) -> Result<ExperimentReport> {
    train_and_evaluate(series, config).map(|(report, _)| report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_wind;
    use crate::loss::{GaussianNll, TubeLoss};
    use crate::models::Architecture;

    fn fast_config() -> ExperimentConfig {
        ExperimentConfig {
            window: SlidingWindows::new(12, 1),
            network: NetworkConfig::new(Architecture::Gru)
                .with_hidden_size(6)
                .with_seed(5),
            objective: Objective::Tube(TubeLoss::new(0.9, 0.5, 0.0).unwrap()),
            training: TrainerConfig::default()
                .with_epochs(4)
                .with_batch_size(32)
                .with_learning_rate(0.01),
            ..Default::default()
        }
    }

    #[test]
    fn empty_json_gives_defaults() {
        let config = ExperimentConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert!(config.tuning.is_none());
    }

    #[test]
    fn tuning_requires_tube_objective() {
        let config = ExperimentConfig {
            objective: Objective::Gaussian(GaussianNll::default()),
            tuning: Some(TuningConfig::default()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn report_lines_up_with_test_segment() {
        let series = synthetic_wind(300, 9).unwrap();
        let config = fast_config();
        let report = run_experiment(&series, &config).unwrap();

        // test targets are indices 255..300
        assert_eq!(report.actual.len(), 45);
        assert_eq!(report.forecast.len(), 45);
        assert_eq!(report.test_timestamps.as_ref().map(Vec::len), Some(45));
        assert_eq!(report.actual[0], series.values()[255]);
        assert!(report.test_metrics.picp >= 0.0 && report.test_metrics.picp <= 1.0);
        assert!(report.test_metrics.mpiw >= 0.0);
        assert_eq!(report.history.epochs_run(), 4);
        assert_eq!(report.model, "GRU-Tube");
        assert!(report.validation_metrics.is_some());
        assert!(report.num_parameters > 0);
    }

    #[test]
    fn tuned_delta_comes_from_the_grid() {
        let series = synthetic_wind(240, 2).unwrap();
        let config = ExperimentConfig {
            tuning: Some(TuningConfig {
                search: DeltaSearch::Grid(vec![0.0, 0.05]),
                tolerance: 0.05,
            }),
            ..fast_config()
        };
        let (report, checkpoint) = train_and_evaluate(&series, &config).unwrap();
        let tuning = report.tuning.unwrap();
        assert_eq!(tuning.trials.len(), 2);
        assert_eq!(report.delta, Some(tuning.best_delta));
        assert_eq!(checkpoint.objective.delta(), Some(tuning.best_delta));
    }

    #[test]
    fn too_short_series_is_rejected() {
        let series = synthetic_wind(12, 1).unwrap();
        assert!(matches!(
            run_experiment(&series, &fast_config()),
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
