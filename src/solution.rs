//! Stored solutions and the bounded, fitness-ordered store.
//!
//! A [`Snapshot`] is what a topology needs to resume: every edge weight in
//! edge order, and a state vector holding every participating node's memory
//! followed by every participating node's output. A [`Solution`] adds the
//! fitness the snapshot scored.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::mutation::cosine_rank;

/// Weights and node state, restorable into the topology they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// One weight per edge, in edge order.
    pub weights: Vec<f64>,
    /// Memory block then output block, in participating-node order.
    pub state: Vec<f64>,
}

/// A scored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// One weight per edge, in edge order.
    pub weights: Vec<f64>,
    /// The timestamp (node state) the weights were scored at.
    pub state: Vec<f64>,
    /// Evaluator score; higher is better.
    pub fitness: f64,
}

impl Solution {
    /// Pair a snapshot with its score.
    #[must_use]
    pub fn new(snapshot: Snapshot, fitness: f64) -> Self {
        Self {
            weights: snapshot.weights,
            state: snapshot.state,
            fitness,
        }
    }

    /// Weights and state without the score.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            weights: self.weights.clone(),
            state: self.state.clone(),
        }
    }
}

/// Solutions ordered by non-increasing fitness, holding at most `capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionStore {
    solutions: Vec<Solution>,
    capacity: usize,
}

impl SolutionStore {
    /// An empty store. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            solutions: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Maximum number of solutions kept.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, evicting from the tail if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.solutions.truncate(self.capacity);
    }

    /// Number of stored solutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// The fittest solution.
    #[must_use]
    pub fn best(&self) -> Option<&Solution> {
        self.solutions.first()
    }

    /// Solution at `rank`, 0 being the fittest.
    #[must_use]
    pub fn get(&self, rank: usize) -> Option<&Solution> {
        self.solutions.get(rank)
    }

    /// Solutions from fittest to least fit.
    pub fn iter(&self) -> std::slice::Iter<'_, Solution> {
        self.solutions.iter()
    }

    /// All solutions as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Solution] {
        &self.solutions
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Solution> {
        self.solutions.iter_mut()
    }

    /// Insert at the front, evicting the tail if the store is over capacity.
    ///
    /// Callers promote only solutions at least as fit as the current best, so
    /// the ordering holds without a re-sort.
    pub fn promote(&mut self, solution: Solution) {
        debug_assert!(self
            .best()
            .map_or(true, |best| solution.fitness >= best.fitness));
        self.solutions.insert(0, solution);
        self.solutions.truncate(self.capacity);
    }

    /// Re-establish non-increasing fitness order.
    ///
    /// The sort is stable, so equally fit solutions keep their relative order.
    pub fn sort_descending(&mut self) {
        self.solutions
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    }

    /// Whether fitness never increases from front to back.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.solutions
            .windows(2)
            .all(|pair| pair[0].fitness >= pair[1].fitness)
    }

    /// Pick a solution at a cosine-weighted random rank, favouring the front.
    pub fn pick_weighted<R: Rng>(&self, rng: &mut R) -> Option<&Solution> {
        self.solutions.get(cosine_rank(self.solutions.len(), rng))
    }
}

impl<'a> IntoIterator for &'a SolutionStore {
    type Item = &'a Solution;
    type IntoIter = std::slice::Iter<'a, Solution>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
