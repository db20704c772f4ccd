//! Quickstart example demonstrating basic usage of tubecast.
//!
//! Run with: cargo run --example quickstart

use tubecast::data::synthetic_wind;
use tubecast::prelude::*;

fn main() {
    println!("=== tubecast Quickstart ===\n");

    // 1. Two months of hourly wind speed
    let series = synthetic_wind(24 * 60, 42).unwrap();
    println!("Generated {} hourly observations", series.len());

    // 2. Chronological split, scaler fitted on the training part only
    let (train_end, validation_end) = series.split_points(0.7, 0.15).unwrap();
    let scale = ScalingMethod::MinMax.fit(&series.values()[..train_end]);
    let windows = SlidingWindows::new(24, 1)
        .build(&scale.transform(series.values()))
        .unwrap();
    let train = windows.select(0..train_end);
    let validation = windows.select(train_end..validation_end);
    let test = windows.select(validation_end..series.len());
    println!(
        "Windows: {} train / {} validation / {} test",
        train.len(),
        validation.len(),
        test.len()
    );

    // 3. LSTM trained with the Tube loss for 90% intervals
    println!("\n--- Training LSTM with Tube loss (t = 0.9) ---");
    let objective = Objective::Tube(TubeLoss::new(0.9, 0.5, 0.0).unwrap());
    let trainer = TrainerConfig::default()
        .with_epochs(20)
        .with_batch_size(32)
        .with_learning_rate(0.005);
    let mut model = NeuralForecaster::new(
        &NetworkConfig::new(Architecture::Lstm).with_hidden_size(16),
        objective,
        trainer,
    )
    .unwrap();
    model.fit(&train, &validation).unwrap();

    let history = model.history().unwrap();
    println!(
        "Ran {} epochs, best validation loss {:.5} at epoch {}",
        history.epochs_run(),
        history.best_loss,
        history.best_epoch
    );

    // 4. Intervals on the test segment, back in m/s
    let forecast = model.predict_intervals(&test).unwrap().inverse_scaled(&scale);
    let actual: Vec<f64> = test
        .target_index
        .iter()
        .map(|&i| series.values()[i])
        .collect();

    println!("\n--- First 10 test intervals ---");
    println!(
        "{:>4} {:>10} {:>10} {:>10} {:>10}",
        "i", "Lower", "Point", "Upper", "Actual"
    );
    println!("{:-<48}", "");
    for (i, interval) in forecast.iter().take(10).enumerate() {
        println!(
            "{:>4} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            i, interval.lower, interval.point, interval.upper, actual[i]
        );
    }

    // 5. Interval quality
    let metrics =
        calculate_interval_metrics(&actual, forecast.lower(), forecast.upper(), 0.9).unwrap();
    println!("\n--- Test Metrics ---");
    println!("PICP:    {:.4} (target 0.90)", metrics.picp);
    println!("MPIW:    {:.4} m/s", metrics.mpiw);
    println!("Winkler: {:.4}", metrics.winkler);
    println!("CWC:     {:.4}", metrics.cwc);

    println!("\n=== Quickstart Complete ===");
}
