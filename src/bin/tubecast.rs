//! # tubecast CLI
//!
//! Train, evaluate and apply wind-speed interval forecasters from the
//! command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tubecast::data::{load_csv, read_interval_csv, synthetic_wind, write_forecast_csv, CsvOptions};
use tubecast::loss::IntervalObjective;
use tubecast::pipeline::{train_and_evaluate, ExperimentConfig};
use tubecast::training::{load_checkpoint, save_checkpoint};
use tubecast::utils::{calculate_interval_metrics, IntervalMetrics};

#[derive(Parser)]
#[command(name = "tubecast")]
#[command(about = "Probabilistic wind-speed forecasting with Tube-loss intervals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and evaluate it on the held-out tail of the series
    Train {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Column holding wind speed (default: first numeric column)
        #[arg(short, long)]
        column: Option<String>,

        /// Timestamp column (default: auto-detected)
        #[arg(long)]
        timestamp_column: Option<String>,

        /// Experiment configuration (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write test-set intervals to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the full JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Save the trained model to this JSON checkpoint
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Score an existing interval CSV (actual, lower, upper columns)
    Evaluate {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Nominal coverage of the intervals
        #[arg(long, default_value = "0.95")]
        coverage: f64,
    },

    /// Apply a saved checkpoint to a series
    Predict {
        /// Checkpoint written by `train --checkpoint`
        #[arg(long)]
        checkpoint: PathBuf,

        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Column holding wind speed (default: first numeric column)
        #[arg(short, long)]
        column: Option<String>,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate a synthetic hourly wind-speed series
    Synth {
        /// Number of hourly observations
        #[arg(short, long, default_value = "2000")]
        n: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct SeriesRow {
    timestamp: String,
    wind_speed: f64,
}

#[derive(Serialize)]
struct PredictionRow {
    index: usize,
    lower: f64,
    point: f64,
    upper: f64,
}

fn csv_options(column: Option<String>, timestamp_column: Option<String>) -> CsvOptions {
    let mut options = CsvOptions::default();
    if let Some(column) = column {
        options = options.with_column(column);
    }
    if let Some(ts) = timestamp_column {
        options = options.with_timestamp_column(ts);
    }
    options
}

fn print_metrics(label: &str, metrics: &IntervalMetrics) {
    println!("{label}:");
    println!(
        "  PICP     {:.4} (target {:.2})",
        metrics.picp, metrics.target_coverage
    );
    println!("  MPIW     {:.4}", metrics.mpiw);
    if let Some(nmpiw) = metrics.nmpiw {
        println!("  NMPIW    {:.4}", nmpiw);
    }
    println!("  Winkler  {:.4}", metrics.winkler);
    println!("  CWC      {:.4}", metrics.cwc);
    println!("  n        {}", metrics.n);
}

fn train(
    input: PathBuf,
    options: CsvOptions,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    report_path: Option<PathBuf>,
    checkpoint_path: Option<PathBuf>,
) -> Result<()> {
    let series = load_csv(&input, &options)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let config = match config {
        Some(path) => ExperimentConfig::from_json_file(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    info!(
        observations = series.len(),
        model = config.network.architecture.name(),
        objective = config.objective.name(),
        "training"
    );

    let (report, checkpoint) = train_and_evaluate(&series, &config)?;

    println!("Model: {} ({} parameters)", report.model, report.num_parameters);
    if let Some(delta) = report.delta {
        println!("Delta: {delta}");
    }
    println!(
        "Epochs: {} (best {}, loss {:.5})",
        report.history.epochs_run(),
        report.history.best_epoch,
        report.history.best_loss
    );
    if let Some(metrics) = &report.validation_metrics {
        print_metrics("Validation", metrics);
    }
    print_metrics("Test", &report.test_metrics);
    println!("  RMSE     {:.4}", report.point_metrics.rmse);

    if let Some(path) = output {
        write_forecast_csv(
            &path,
            &report.actual,
            &report.forecast,
            report.test_timestamps.as_deref(),
        )
        .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Intervals written to {}", path.display());
    }
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    if let Some(path) = checkpoint_path {
        save_checkpoint(&path, &checkpoint)?;
        println!("Checkpoint written to {}", path.display());
    }
    Ok(())
}

fn evaluate(input: PathBuf, coverage: f64) -> Result<()> {
    if !(coverage > 0.0 && coverage < 1.0) {
        bail!("coverage must be in (0, 1), got {coverage}");
    }
    let (actual, forecast) = read_interval_csv(&input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let metrics = calculate_interval_metrics(&actual, forecast.lower(), forecast.upper(), coverage)?;
    print_metrics(&input.display().to_string(), &metrics);
    Ok(())
}

fn predict(checkpoint: PathBuf, input: PathBuf, options: CsvOptions, output: PathBuf) -> Result<()> {
    let mut model = load_checkpoint(&checkpoint)
        .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?;
    let series = load_csv(&input, &options)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let forecast = model.predict(series.values())?;

    let mut writer = csv::Writer::from_path(&output)?;
    for (index, interval) in forecast.iter().enumerate() {
        writer.serialize(PredictionRow {
            index,
            lower: interval.lower,
            point: interval.point,
            upper: interval.upper,
        })?;
    }
    writer.flush()?;
    println!("{} intervals written to {}", forecast.len(), output.display());
    Ok(())
}

fn synth(n: usize, seed: u64, output: PathBuf) -> Result<()> {
    let series = synthetic_wind(n, seed)?;
    let timestamps = series.timestamps().unwrap_or_default();
    let mut writer = csv::Writer::from_path(&output)?;
    for (ts, &value) in timestamps.iter().zip(series.values()) {
        writer.serialize(SeriesRow {
            timestamp: ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            wind_speed: value,
        })?;
    }
    writer.flush()?;
    println!("{} observations written to {}", series.len(), output.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train {
            input,
            column,
            timestamp_column,
            config,
            output,
            report,
            checkpoint,
        } => train(
            input,
            csv_options(column, timestamp_column),
            config,
            output,
            report,
            checkpoint,
        ),
        Commands::Evaluate { input, coverage } => evaluate(input, coverage),
        Commands::Predict {
            checkpoint,
            input,
            column,
            output,
        } => predict(checkpoint, input, csv_options(column, None), output),
        Commands::Synth { n, seed, output } => synth(n, seed, output),
    }
}
