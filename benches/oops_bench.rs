//! Benchmarks for oops-lstm.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use oops_lstm::{MutationOp, OopsConfig, SequenceEvaluator, Topology, TrainerBuilder};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_grid(size: usize, rng: &mut ChaCha8Rng) -> Topology {
    let mut topology = Topology::lstm_grid(size).unwrap().topology;
    let weights: Vec<f64> = (0..topology.num_edges())
        .map(|_| rng.random_range(-6.0..6.0))
        .collect();
    topology.load_weights(&weights);
    topology
}

fn bench_activate(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for size in [4, 16] {
        let mut topology = random_grid(size, &mut rng);
        c.bench_function(&format!("activate_grid_{size}"), |b| {
            b.iter(|| {
                topology.activate().unwrap();
                black_box(&topology);
            });
        });
    }
}

fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut topology = random_grid(16, &mut rng);
    topology.activate().unwrap();

    c.bench_function("snapshot_roundtrip_grid_16", |b| {
        b.iter(|| {
            let snapshot = topology.save_snapshot();
            topology.load_snapshot(black_box(&snapshot));
        });
    });
}

fn bench_mutation(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut genes: Vec<f64> = (0..1000).map(|_| rng.random_range(-6.0..6.0)).collect();

    c.bench_function("mutation_ops_1000_genes", |b| {
        b.iter(|| {
            for op in MutationOp::ALL {
                op.apply(&mut genes, 6.0, &mut rng);
            }
            black_box(&genes);
        });
    });
}

fn bench_training_epoch(c: &mut Criterion) {
    let grid = Topology::lstm_grid(4).unwrap();
    let evaluator = SequenceEvaluator::for_grid(&grid, "Hi");
    let config = OopsConfig {
        max_solutions: 100,
        mutants_per_epoch: 100,
        ..OopsConfig::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut trainer = TrainerBuilder::new()
        .topology(grid.topology)
        .evaluator(evaluator)
        .config(config)
        .build(&mut rng)
        .unwrap();

    c.bench_function("training_epoch_grid_4", |b| {
        b.iter(|| {
            black_box(trainer.training_epoch(&mut rng).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_activate,
    bench_snapshot_roundtrip,
    bench_mutation,
    bench_training_epoch,
);
criterion_main!(benches);
