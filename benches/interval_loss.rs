//! Benchmarks for interval objectives, metrics and network forward passes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2, Array3};
use tubecast::loss::{GaussianNll, IntervalObjective, Objective, PinballPair, TubeLoss};
use tubecast::models::{Architecture, IntervalNetwork, NetworkConfig};
use tubecast::utils::{mpiw, picp};

fn batch(size: usize) -> (Array2<f64>, Array1<f64>) {
    let outputs = Array2::from_shape_fn((size, 2), |(i, j)| {
        let base = (i as f64 * 0.01).sin();
        if j == 0 {
            base - 0.3
        } else {
            base + 0.3
        }
    });
    let targets = Array1::from_shape_fn(size, |i| (i as f64 * 0.013).cos() * 0.5);
    (outputs, targets)
}

fn bench_objectives(c: &mut Criterion) {
    let sizes = [64, 1024, 16384];
    let objectives = [
        Objective::Tube(TubeLoss::new(0.95, 0.5, 0.01).unwrap()),
        Objective::Gaussian(GaussianNll::new(0.95).unwrap()),
        Objective::Pinball(PinballPair::new(0.95).unwrap()),
    ];
    let mut group = c.benchmark_group("loss_and_grad");

    for size in sizes {
        let (outputs, targets) = batch(size);
        for objective in &objectives {
            group.bench_with_input(
                BenchmarkId::new(objective.name(), size),
                &(&outputs, &targets),
                |b, (o, t)| b.iter(|| black_box(objective.loss_and_grad(o, t).unwrap())),
            );
        }
    }
    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let sizes = [1000, 100000];
    let mut group = c.benchmark_group("interval_metrics");

    for size in sizes {
        let actual: Vec<f64> = (0..size).map(|i| (i as f64 * 0.01).sin()).collect();
        let lower: Vec<f64> = actual.iter().map(|v| v - 0.5).collect();
        let upper: Vec<f64> = actual.iter().map(|v| v + 0.4).collect();

        group.bench_with_input(
            BenchmarkId::new("picp", size),
            &(&actual, &lower, &upper),
            |b, (a, l, u)| b.iter(|| black_box(picp(a, l, u).unwrap())),
        );
        group.bench_with_input(BenchmarkId::new("mpiw", size), &(&lower, &upper), |b, (l, u)| {
            b.iter(|| black_box(mpiw(l, u).unwrap()))
        });
    }
    group.finish();
}

fn bench_forward(c: &mut Criterion) {
    let inputs = Array3::from_shape_fn((64, 24, 1), |(w, t, _)| ((w + t) as f64 * 0.1).sin());
    let mut group = c.benchmark_group("forward");

    for architecture in [Architecture::Lstm, Architecture::Gru, Architecture::Tcn] {
        let config = NetworkConfig::new(architecture)
            .with_hidden_size(32)
            .with_num_layers(2);
        let mut network = IntervalNetwork::new(&config, 1).unwrap();
        group.bench_function(architecture.name(), |b| {
            b.iter(|| black_box(network.forward(&inputs).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_objectives, bench_metrics, bench_forward);
criterion_main!(benches);
