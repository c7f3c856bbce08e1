//! Train a 4-cell LSTM grid to spell out a string, one character per tick.
//!
//! The grid is taught a growing prefix of the target: once a prefix is
//! solved, the evaluator is swapped for the next longer one and the stored
//! solutions are rescored under it.
//!
//! Run with: `cargo run --example hello -- [TARGET] [SEED]`
//! Set `RUST_LOG=oops_lstm=debug` to watch individual improvements.

use oops_lstm::{OopsConfig, SequenceEvaluator, Topology, TrainerBuilder};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let target = args.next().unwrap_or_else(|| "Hi".to_owned());
    let seed: u64 = match args.next() {
        Some(seed) => seed.parse()?,
        None => 42,
    };

    println!("OOPS LSTM Example");
    println!("=================\n");

    let grid = Topology::lstm_grid(4)?;
    println!(
        "Grid: {} cells, {} edges",
        grid.topology.num_nodes(),
        grid.topology.num_edges()
    );
    println!("Goal sequence: {target:?}");
    println!("Seed: {seed}\n");

    let full = SequenceEvaluator::for_grid(&grid, target.as_bytes());
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut trainer = TrainerBuilder::new()
        .topology(grid.topology)
        .evaluator(full.prefix(1))
        .config(OopsConfig::default())
        .build(&mut rng)?;

    for len in 1..=full.target().len() {
        if len > 1 {
            trainer.change_evaluator(full.prefix(len))?;
        }
        while !SequenceEvaluator::is_solved(trainer.fitness()) {
            let report = trainer.training_epoch(&mut rng)?;
            if report.committed {
                let mut topology = trainer.topology().clone();
                let emitted = trainer.evaluator().replay(&mut topology)?;
                info!(
                    epoch = trainer.epochs(),
                    fitness = report.fitness,
                    solutions = trainer.solutions().len(),
                    emitted = %emitted,
                    "progress"
                );
            }
        }
        println!(
            "Prefix {:?} solved after {} epochs",
            String::from_utf8_lossy(&full.target()[..len]),
            trainer.epochs()
        );
    }

    let mut topology = trainer.topology().clone();
    let emitted = trainer.evaluator().replay(&mut topology)?;
    println!();
    println!("Training Complete!");
    println!("==================");
    println!("Epochs: {}", trainer.epochs());
    println!("Improvements: {}", trainer.solves());
    println!("Best fitness: {:.4}", trainer.fitness());
    println!("Output: {emitted:?}");
    Ok(())
}
