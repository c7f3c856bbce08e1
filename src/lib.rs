//! # OOPS LSTM
//!
//! Recurrent graphs of LSTM memory cells, trained without gradients by an
//! Optimal Ordered Problem Solver (OOPS) style search over edge weights.
//!
//! ## Features
//!
//! - **Arena Topology**: Nodes and terminals live in a `SlotMap`; edges are a
//!   sorted list with a parallel weight vector, so snapshots are flat vectors
//!   in a stable order
//! - **Cyclic Graphs**: Every tick reads the graph as it stood when the tick
//!   began, so loops and self-connections are well defined
//! - **Pluggable Nodes**: Anything implementing [`Node`] can be wired in by
//!   declaring its sink and source channels
//! - **OOPS Trainer**: A bounded, fitness-ordered solution store, five mutation
//!   operators plus splice crossover, affect-guided noise and timestamp
//!   backtracking
//!
//! ## Quick Start
//!
//! ```rust
//! use oops_lstm::{Channel, Port, Topology};
//!
//! let mut topology = Topology::new();
//! let cell = topology.add_lstm();
//! topology
//!     .link(
//!         Port::new(cell, Channel::Peephole),
//!         [
//!             Port::new(cell, Channel::InputGate),
//!             Port::new(cell, Channel::ForgetGate),
//!             Port::new(cell, Channel::OutputGate),
//!         ],
//!     )
//!     .unwrap();
//! let input = topology.add_input(Port::new(cell, Channel::Input)).unwrap();
//! let output = topology.add_output(Port::new(cell, Channel::Output)).unwrap();
//!
//! topology.write(input, 5.0).unwrap();
//! topology.activate().unwrap();
//! let value = topology.read_terminal(output).unwrap();
//! assert!((0.0..=1.0).contains(&value));
//! ```
//!
//! ## Training
//!
//! ```rust
//! use oops_lstm::{OopsConfig, SequenceEvaluator, Topology, TrainerBuilder};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let grid = Topology::lstm_grid(2).unwrap();
//! let evaluator = SequenceEvaluator::for_grid(&grid, "H");
//! let config = OopsConfig {
//!     mutants_per_epoch: 50,
//!     ..OopsConfig::default()
//! };
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut trainer = TrainerBuilder::new()
//!     .topology(grid.topology)
//!     .evaluator(evaluator)
//!     .config(config)
//!     .build(&mut rng)
//!     .unwrap();
//!
//! let start = trainer.fitness();
//! for _ in 0..5 {
//!     trainer.training_epoch(&mut rng).unwrap();
//! }
//! assert!(trainer.fitness() >= start);
//! ```
//!
//! ## Architecture
//!
//! ### Snapshot Layout
//!
//! A solution is `(weights, state, fitness)`. `weights` holds one entry per
//! edge, in edge order. `state` holds the memory of every wired node followed
//! by the output of every wired node, both in node creation order. Derived
//! values such as the LSTM peephole are recomputed on load.
//!
//! ### Epochs
//!
//! Mutants are always tested at the current best solution's state (its
//! "timestamp"). Every improvement is promoted to the front of the store at
//! once; the topology itself only moves at the end of an epoch, and only if
//! the epoch beat the fitness it started from. An evaluator may abort, which
//! rolls the whole epoch back.

pub mod activation;
pub mod affect;
pub mod error;
pub mod evaluator;
pub mod lstm;
pub mod mutation;
pub mod node;
pub mod oops;
pub mod port;
pub mod solution;
pub mod topology;

// Re-exports for convenience
pub use activation::{sigmoid, squash_input};
pub use affect::Affect;
pub use error::{
    ConfigurationError, EvaluationError, NodeProtocolError, StructuralError, TrainerError,
};
pub use evaluator::{from_fn, Evaluator, FnEvaluator, MutationContext, SequenceEvaluator};
pub use lstm::LstmNode;
pub use mutation::{MutationOp, NoiseMode};
pub use node::Node;
pub use oops::{AffectPolicy, EpochReport, OopsConfig, OopsTrainer, TrainerBuilder};
pub use port::{Channel, Direction, Edge, ParticipantId, Port, Terminal};
pub use solution::{Snapshot, Solution, SolutionStore};
pub use topology::{Endpoint, LstmGrid, Participant, TickInputs, Topology, DEFAULT_WEIGHT};
