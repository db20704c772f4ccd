//! Tuning the Tube width penalty on a validation split.
//!
//! Trains one GRU per candidate delta, keeps the narrowest model that still
//! reaches the target coverage, and compares it with a Gaussian baseline.
//!
//! Run with: cargo run --example delta_tuning

use tubecast::data::synthetic_wind;
use tubecast::pipeline::TuningConfig;
use tubecast::prelude::*;

fn main() {
    println!("=== Delta Tuning ===\n");

    let series = synthetic_wind(24 * 45, 7).unwrap();
    let base = ExperimentConfig {
        window: SlidingWindows::new(24, 1),
        network: NetworkConfig::new(Architecture::Gru).with_hidden_size(12),
        objective: Objective::Tube(TubeLoss::new(0.9, 0.5, 0.0).unwrap()),
        training: TrainerConfig::default()
            .with_epochs(15)
            .with_batch_size(32)
            .with_learning_rate(0.005),
        ..Default::default()
    };

    let tuned = ExperimentConfig {
        tuning: Some(TuningConfig {
            search: DeltaSearch::Grid(vec![0.0, 0.005, 0.01, 0.02, 0.05]),
            tolerance: 0.02,
        }),
        ..base.clone()
    };
    let report = run_experiment(&series, &tuned).unwrap();

    if let Some(tuning) = &report.tuning {
        println!("{:>8} {:>10} {:>10}", "delta", "PICP", "MPIW");
        println!("{:-<30}", "");
        for trial in &tuning.trials {
            println!(
                "{:>8.3} {:>10.4} {:>10.4}",
                trial.delta, trial.metrics.picp, trial.metrics.mpiw
            );
        }
        println!(
            "\nSelected delta = {} (target met: {})",
            tuning.best_delta, tuning.met_target
        );
    }

    let gaussian = ExperimentConfig {
        objective: Objective::Gaussian(GaussianNll::new(0.9).unwrap()),
        ..base
    };
    let baseline = run_experiment(&series, &gaussian).unwrap();

    println!("\n--- Test Metrics ---");
    println!("{:<18} {:>10} {:>10}", "Model", "PICP", "MPIW");
    for r in [&report, &baseline] {
        println!(
            "{:<18} {:>10.4} {:>10.4}",
            r.model, r.test_metrics.picp, r.test_metrics.mpiw
        );
    }
}
