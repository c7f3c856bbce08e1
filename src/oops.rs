//! Optimal Ordered Problem Solver (OOPS) style weight search.
//!
//! The trainer keeps a bounded store of scored solutions, best first. Each
//! [`training_epoch`](OopsTrainer::training_epoch) breeds mutants from
//! cosine-weighted random parents, tests every mutant at the best solution's
//! timestamp and promotes each improvement to the front of the store. An
//! optional backtracking pass then retries stored weights and stored
//! timestamps against the epoch's search term. The topology only changes
//! when the epoch ends with something better than it started with.
//!
//! # Example
//!
//! ```no_run
//! use oops_lstm::{OopsConfig, SequenceEvaluator, Topology, TrainerBuilder};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let grid = Topology::lstm_grid(4).unwrap();
//! let evaluator = SequenceEvaluator::for_grid(&grid, "Hi");
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let mut trainer = TrainerBuilder::new()
//!     .topology(grid.topology)
//!     .evaluator(evaluator)
//!     .config(OopsConfig::default())
//!     .build(&mut rng)
//!     .unwrap();
//!
//! while !SequenceEvaluator::is_solved(trainer.fitness()) {
//!     trainer.training_epoch(&mut rng).unwrap();
//! }
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::affect::Affect;
use crate::error::{ConfigurationError, EvaluationError, TrainerError};
use crate::evaluator::{Evaluator, MutationContext};
use crate::mutation::{affect_noise, random_gene, splice, MutationOp, NoiseMode};
use crate::solution::{Snapshot, Solution, SolutionStore};
use crate::topology::Topology;

/// Which evaluations feed the affect vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AffectPolicy {
    /// Only mutants that beat the search term.
    #[default]
    Improvements,
    /// Every mutant, with its signed fitness change.
    EveryTrial,
}

/// Trainer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OopsConfig {
    /// Solution store capacity.
    pub max_solutions: usize,
    /// Mutants bred and tested per epoch.
    pub mutants_per_epoch: usize,
    /// Fresh genes and genesis memories are drawn from `[−weight_range, weight_range]`.
    pub weight_range: f64,
    /// Run the timestamp backtracking pass after the mutants.
    pub backtracking: bool,
    /// Which evaluations update the affect vector.
    pub affect_policy: AffectPolicy,
}

impl Default for OopsConfig {
    fn default() -> Self {
        Self {
            max_solutions: 1000,
            mutants_per_epoch: 1000,
            weight_range: 6.0,
            backtracking: true,
            affect_policy: AffectPolicy::Improvements,
        }
    }
}

impl OopsConfig {
    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for a zero store capacity or a weight
    /// range that is not finite and positive.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_solutions == 0 {
            return Err(ConfigurationError::InvalidMaxSolutions(self.max_solutions));
        }
        if !(self.weight_range.is_finite() && self.weight_range > 0.0) {
            return Err(ConfigurationError::InvalidWeightRange(self.weight_range));
        }
        Ok(())
    }
}

/// Outcome of one [`training_epoch`](OopsTrainer::training_epoch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// Candidates that beat the search term, mutants and backtracking combined.
    pub improvements: usize,
    /// Whether the topology was moved to a better solution.
    pub committed: bool,
    /// Best stored fitness after the epoch.
    pub fitness: f64,
}

/// Assembles an [`OopsTrainer`].
#[derive(Debug)]
pub struct TrainerBuilder<E> {
    topology: Option<Topology>,
    evaluator: Option<E>,
    config: OopsConfig,
}

impl<E> Default for TrainerBuilder<E> {
    fn default() -> Self {
        Self {
            topology: None,
            evaluator: None,
            config: OopsConfig::default(),
        }
    }
}

impl<E: Evaluator> TrainerBuilder<E> {
    /// A builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The topology to train. It must not be rewired afterwards.
    #[must_use]
    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }

    /// The fitness function.
    #[must_use]
    pub fn evaluator(mut self, evaluator: E) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Trainer settings.
    #[must_use]
    pub fn config(mut self, config: OopsConfig) -> Self {
        self.config = config;
        self
    }

    /// Randomize the topology, score it once and seed the store with it.
    ///
    /// Every weight and node memory is drawn from `[−r, r]` and every node
    /// output from `[0, 1]`, where `r` is the configured weight range.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::Configuration`] for a missing topology or
    /// evaluator, a topology without edges or invalid settings, and
    /// [`TrainerError::Evaluation`] if the genesis evaluation fails.
    pub fn build<R: Rng>(self, rng: &mut R) -> Result<OopsTrainer<E>, TrainerError> {
        let mut topology = self.topology.ok_or(ConfigurationError::MissingTopology)?;
        let evaluator = self.evaluator.ok_or(ConfigurationError::MissingEvaluator)?;
        let config = self.config;
        config.validate()?;
        if topology.num_edges() == 0 {
            return Err(ConfigurationError::NoConnections.into());
        }

        let range = config.weight_range;
        let weights: Vec<f64> = (0..topology.num_edges())
            .map(|_| random_gene(range, rng))
            .collect();
        let nodes = topology.num_nodes();
        let mut state: Vec<f64> = (0..nodes).map(|_| random_gene(range, rng)).collect();
        state.extend((0..nodes).map(|_| rng.random_range(0.0..=1.0)));
        let genesis = Snapshot { weights, state };
        topology.load_snapshot(&genesis);

        let mut trainer = OopsTrainer {
            affect: Affect::new(topology.num_edges()),
            store: SolutionStore::new(config.max_solutions),
            topology,
            evaluator,
            config,
            min_fitness: f64::INFINITY,
            max_fitness: f64::NEG_INFINITY,
            solves: 0,
            epochs: 0,
        };
        let fitness = trainer.score(None)?;
        trainer.topology.load_snapshot(&genesis);
        trainer.store.promote(Solution::new(genesis, fitness));
        info!(
            edges = trainer.topology.num_edges(),
            nodes,
            fitness,
            "OOPS trainer ready"
        );
        Ok(trainer)
    }
}

/// Everything an aborted epoch must put back.
struct Checkpoint {
    topology: Topology,
    store: SolutionStore,
    affect: Affect,
    min_fitness: f64,
    max_fitness: f64,
    solves: u64,
}

/// Mutation-based trainer for a fixed [`Topology`].
#[derive(Debug)]
pub struct OopsTrainer<E> {
    topology: Topology,
    evaluator: E,
    config: OopsConfig,
    store: SolutionStore,
    affect: Affect,
    min_fitness: f64,
    max_fitness: f64,
    solves: u64,
    epochs: u64,
}

impl<E: Evaluator> OopsTrainer<E> {
    /// The trained topology.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable access for running the topology between epochs.
    ///
    /// Weights and state may be changed freely; wiring must not be, since the
    /// stored solutions are laid out for the current edges and nodes.
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    /// Give up the trainer and keep the topology.
    #[must_use]
    pub fn into_topology(self) -> Topology {
        self.topology
    }

    /// The current fitness function.
    #[must_use]
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Trainer settings.
    #[must_use]
    pub fn config(&self) -> &OopsConfig {
        &self.config
    }

    /// Stored solutions, best first.
    #[must_use]
    pub fn solutions(&self) -> &SolutionStore {
        &self.store
    }

    /// Per-gene affect scores.
    #[must_use]
    pub fn affect(&self) -> &Affect {
        &self.affect
    }

    /// Best stored fitness.
    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.store.best().map_or(f64::NEG_INFINITY, |s| s.fitness)
    }

    /// Lowest and highest fitness seen under the current evaluator.
    #[must_use]
    pub const fn fitness_bounds(&self) -> (f64, f64) {
        (self.min_fitness, self.max_fitness)
    }

    /// Improvements accepted since construction.
    #[must_use]
    pub const fn solves(&self) -> u64 {
        self.solves
    }

    /// Epochs completed since construction.
    #[must_use]
    pub const fn epochs(&self) -> u64 {
        self.epochs
    }

    /// Reset every affect score to 1.
    ///
    /// The next epoch then applies "good" noise to every mutant instead of
    /// alternating.
    pub fn reset_affect(&mut self) {
        self.affect.reset();
        debug!("affect reset");
    }

    fn score(&mut self, context: Option<&MutationContext<'_>>) -> Result<f64, EvaluationError> {
        let fitness = self.evaluator.evaluate(&mut self.topology, context)?;
        self.min_fitness = self.min_fitness.min(fitness);
        self.max_fitness = self.max_fitness.max(fitness);
        Ok(fitness)
    }

    fn accept(&mut self, solution: Solution) {
        self.store.promote(solution);
        self.solves += 1;
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            topology: self.topology.clone(),
            store: self.store.clone(),
            affect: self.affect.clone(),
            min_fitness: self.min_fitness,
            max_fitness: self.max_fitness,
            solves: self.solves,
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.topology = checkpoint.topology;
        self.store = checkpoint.store;
        self.affect = checkpoint.affect;
        self.min_fitness = checkpoint.min_fitness;
        self.max_fitness = checkpoint.max_fitness;
        self.solves = checkpoint.solves;
    }

    /// Run one generation.
    ///
    /// On success the topology holds either the epoch's winning weights and
    /// timestamp, or exactly what it held before the call: weights, node
    /// state, gate readings and terminal values alike.
    ///
    /// # Errors
    ///
    /// Propagates the first [`EvaluationError`]. The trainer and topology are
    /// then rolled back to their state before the call.
    pub fn training_epoch<R: Rng>(&mut self, rng: &mut R) -> Result<EpochReport, EvaluationError> {
        let checkpoint = self.checkpoint();
        match self.run_epoch(&checkpoint.topology, rng) {
            Ok(report) => {
                self.epochs += 1;
                Ok(report)
            }
            Err(err) => {
                warn!(epoch = self.epochs, error = %err, "epoch aborted, rolling back");
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    fn run_epoch<R: Rng>(
        &mut self,
        found: &Topology,
        rng: &mut R,
    ) -> Result<EpochReport, EvaluationError> {
        let Some(best) = self.store.best().cloned() else {
            return Ok(EpochReport {
                improvements: 0,
                committed: false,
                fitness: f64::NEG_INFINITY,
            });
        };
        let ts_now = best.state.clone();
        let start_fitness = best.fitness;
        let mut search = best;

        let operator_limit = (self.topology.num_edges() + self.topology.num_nodes()).max(1);
        let alternate = !self.affect.is_fresh();
        let mut mode = NoiseMode::Good;
        let mut improvements = 0;

        for mutant_index in 0..self.config.mutants_per_epoch {
            let mutant = self.breed(operator_limit, mode, rng);
            if alternate {
                mode = mode.flipped();
            }

            self.topology.load_weights(&mutant);
            self.topology.load_state(&ts_now);
            let context = MutationContext {
                prior_weights: &search.weights,
                current_weights: &mutant,
                prior_fitness: search.fitness,
            };
            let fitness = self.score(Some(&context))?;

            let improved = fitness > search.fitness;
            if improved || self.config.affect_policy == AffectPolicy::EveryTrial {
                let range = self.max_fitness - self.min_fitness;
                self.affect
                    .update(&search.weights, &mutant, fitness - search.fitness, range);
            }
            if improved {
                debug!(mutant = mutant_index, fitness, "mutant improved search term");
                search = Solution {
                    weights: mutant,
                    state: ts_now.clone(),
                    fitness,
                };
                self.accept(search.clone());
                improvements += 1;
            }
        }

        if self.config.backtracking {
            improvements += self.backtrack(&ts_now, &mut search)?;
        }

        let committed = search.fitness > start_fitness;
        self.topology = found.clone();
        if committed {
            self.topology.load_weights(&search.weights);
            self.topology.load_state(&search.state);
            info!(
                epoch = self.epochs,
                improvements,
                from = start_fitness,
                to = search.fitness,
                "epoch committed"
            );
        } else {
            info!(epoch = self.epochs, fitness = start_fitness, "epoch found no improvement");
        }

        Ok(EpochReport {
            improvements,
            committed,
            fitness: self.fitness(),
        })
    }

    /// Splice two cosine-weighted parents, apply a random run of operators,
    /// then affect-guided noise.
    fn breed<R: Rng>(&self, operator_limit: usize, mode: NoiseMode, rng: &mut R) -> Vec<f64> {
        let range = self.config.weight_range;
        let mut mutant = match self.store.pick_weighted(rng) {
            Some(parent) => parent.weights.clone(),
            None => self.topology.save_weights(),
        };
        if let Some(donor) = self.store.pick_weighted(rng) {
            splice(&mut mutant, &donor.weights, rng);
        }

        let count = rng.random_range(1.0..=operator_limit as f64).round() as usize;
        for _ in 0..count {
            MutationOp::random(rng).apply(&mut mutant, range, rng);
        }
        affect_noise(&mut mutant, self.affect.scores(), mode, range, rng);
        mutant
    }

    /// Retry stored weights at `ts_now` and the search weights at each stored
    /// timestamp. Returns the number of improvements found.
    fn backtrack(
        &mut self,
        ts_now: &[f64],
        search: &mut Solution,
    ) -> Result<usize, EvaluationError> {
        let stored: Vec<Solution> = self
            .store
            .iter()
            .filter(|s| s.state != ts_now)
            .cloned()
            .collect();
        trace!(timestamps = stored.len(), "backtracking sweep");

        let mut improvements = 0;
        for solution in stored {
            self.topology.load_weights(&solution.weights);
            self.topology.load_state(ts_now);
            let fitness = self.score(None)?;
            if fitness > search.fitness {
                debug!(fitness, "stored weights improved at current timestamp");
                *search = Solution {
                    weights: solution.weights.clone(),
                    state: ts_now.to_vec(),
                    fitness,
                };
                self.accept(search.clone());
                improvements += 1;
            }

            self.topology.load_weights(&search.weights);
            self.topology.load_state(&solution.state);
            let fitness = self.score(None)?;
            if fitness > search.fitness {
                debug!(fitness, "search term improved at stored timestamp");
                *search = Solution {
                    weights: search.weights.clone(),
                    state: solution.state,
                    fitness,
                };
                self.accept(search.clone());
                improvements += 1;
            }
        }
        Ok(improvements)
    }

    /// Swap the fitness function and rescore every stored solution under it.
    ///
    /// The fitness trackers are reset and then bound exactly the new scores,
    /// the store is re-sorted best first and the topology is put back exactly
    /// as it was before the call. Returns the previous evaluator.
    ///
    /// # Errors
    ///
    /// Propagates an [`EvaluationError`]; the old evaluator, scores and
    /// topology are then kept.
    pub fn change_evaluator(&mut self, evaluator: E) -> Result<E, EvaluationError> {
        let saved = self.topology.clone();
        let previous = std::mem::replace(&mut self.evaluator, evaluator);
        let bounds = (self.min_fitness, self.max_fitness);
        self.min_fitness = f64::INFINITY;
        self.max_fitness = f64::NEG_INFINITY;

        match self.rescore() {
            Ok(scores) => {
                for (solution, fitness) in self.store.iter_mut().zip(scores) {
                    solution.fitness = fitness;
                }
                self.store.sort_descending();
                self.topology = saved;
                info!(
                    solutions = self.store.len(),
                    fitness = self.fitness(),
                    "evaluator changed"
                );
                Ok(previous)
            }
            Err(err) => {
                self.topology = saved;
                self.evaluator = previous;
                (self.min_fitness, self.max_fitness) = bounds;
                Err(err)
            }
        }
    }

    fn rescore(&mut self) -> Result<Vec<f64>, EvaluationError> {
        let snapshots: Vec<Snapshot> = self.store.iter().map(Solution::snapshot).collect();
        snapshots
            .iter()
            .map(|snapshot| {
                self.topology.load_snapshot(snapshot);
                self.score(None)
            })
            .collect()
    }

    /// Replace the store with a previously exported one and load its best
    /// solution into the topology.
    ///
    /// The store is resized to the configured capacity and re-sorted, and the
    /// fitness trackers are set to the bounds of its scores.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptySolutionStore`] for an empty store
    /// and [`ConfigurationError::LayoutMismatch`] if any solution does not fit
    /// the topology. The trainer is unchanged on error.
    pub fn restore_solutions(&mut self, mut store: SolutionStore) -> Result<(), ConfigurationError> {
        let expected_weights = self.topology.num_edges();
        let expected_state = self.topology.state_len();
        if let Some(bad) = store
            .iter()
            .find(|s| s.weights.len() != expected_weights || s.state.len() != expected_state)
        {
            return Err(ConfigurationError::LayoutMismatch {
                expected_weights,
                expected_state,
                found_weights: bad.weights.len(),
                found_state: bad.state.len(),
            });
        }

        store.set_capacity(self.config.max_solutions);
        store.sort_descending();
        let Some(best) = store.best() else {
            return Err(ConfigurationError::EmptySolutionStore);
        };
        self.topology.load_snapshot(&best.snapshot());

        let (low, high) = store
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.fitness), hi.max(s.fitness))
            });
        self.min_fitness = low;
        self.max_fitness = high;
        self.store = store;
        info!(solutions = self.store.len(), fitness = self.fitness(), "solutions restored");
        Ok(())
    }
}
