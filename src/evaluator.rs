//! Fitness functions.
//!
//! An [`Evaluator`] scores whatever weights and state the trainer has loaded
//! into a [`Topology`]; higher is better. Evaluators are called many times per
//! epoch and must read the topology live each call.
//!
//! [`SequenceEvaluator`] is the stock "emit a byte string" task: it drives a
//! single input terminal at zero and compares the output terminal, scaled to
//! `0..=255`, against one target byte per tick.

use crate::error::{EvaluationError, NodeProtocolError};
use crate::port::ParticipantId;
use crate::topology::{LstmGrid, Topology};

/// The mutation an evaluation is scoring, passed alongside the topology.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    /// Weights of the candidate the mutant is measured against.
    pub prior_weights: &'a [f64],
    /// Weights of the mutant now loaded in the topology.
    pub current_weights: &'a [f64],
    /// Fitness of the candidate the mutant is measured against.
    pub prior_fitness: f64,
}

/// A fitness function over a loaded topology.
pub trait Evaluator {
    /// Score the topology as currently loaded.
    ///
    /// `context` is present when the loaded weights are a mutant.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::Aborted`] to unwind the current epoch, or a
    /// protocol error from misusing the topology.
    fn evaluate(
        &mut self,
        topology: &mut Topology,
        context: Option<&MutationContext<'_>>,
    ) -> Result<f64, EvaluationError>;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(
        &mut self,
        topology: &mut Topology,
        context: Option<&MutationContext<'_>>,
    ) -> Result<f64, EvaluationError> {
        (**self).evaluate(topology, context)
    }
}

/// Adapts a closure into an [`Evaluator`] that ignores the mutation context.
#[derive(Debug, Clone)]
pub struct FnEvaluator<F>(F);

/// Wrap a closure as an [`Evaluator`].
pub fn from_fn<F>(f: F) -> FnEvaluator<F>
where
    F: FnMut(&mut Topology) -> Result<f64, EvaluationError>,
{
    FnEvaluator(f)
}

impl<F> Evaluator for FnEvaluator<F>
where
    F: FnMut(&mut Topology) -> Result<f64, EvaluationError>,
{
    fn evaluate(
        &mut self,
        topology: &mut Topology,
        _context: Option<&MutationContext<'_>>,
    ) -> Result<f64, EvaluationError> {
        (self.0)(topology)
    }
}

/// Learn to emit a fixed byte string, one byte per tick.
///
/// Fitness is `−√Σ(255·out − target)²`, so a perfect run scores 0. A run
/// counts as solved once its fitness reaches `−0.5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEvaluator {
    input: ParticipantId,
    output: ParticipantId,
    target: Vec<u8>,
}

impl SequenceEvaluator {
    /// Drive `input` at zero and compare `output` against `target`.
    pub fn new(input: ParticipantId, output: ParticipantId, target: impl Into<Vec<u8>>) -> Self {
        Self {
            input,
            output,
            target: target.into(),
        }
    }

    /// Use the terminals of a grid built by [`Topology::lstm_grid`].
    pub fn for_grid(grid: &LstmGrid, target: impl Into<Vec<u8>>) -> Self {
        Self::new(grid.input, grid.output, target)
    }

    /// The target bytes.
    #[must_use]
    pub fn target(&self) -> &[u8] {
        &self.target
    }

    /// The same task cut down to the first `len` target bytes.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            target: self.target[..len.min(self.target.len())].to_vec(),
            ..self.clone()
        }
    }

    /// Whether `fitness` is within half a unit of a perfect score.
    ///
    /// The boundary is inclusive: `−0.5` itself counts as solved.
    #[must_use]
    pub fn is_solved(fitness: f64) -> bool {
        fitness >= -0.5
    }

    /// Run the sequence from the loaded state and return the emitted string.
    ///
    /// Each output is scaled by 255 and rounded to a byte, read as Latin-1.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError`] if the terminals do not belong to `topology`.
    pub fn replay(&self, topology: &mut Topology) -> Result<String, NodeProtocolError> {
        let (emitted, _) = self.run(topology)?;
        Ok(emitted.into_iter().map(char::from).collect())
    }

    fn run(&self, topology: &mut Topology) -> Result<(Vec<u8>, f64), NodeProtocolError> {
        topology.write(self.input, 0.0)?;
        let mut emitted = Vec::with_capacity(self.target.len());
        let mut squared = 0.0;
        for &expected in &self.target {
            topology.activate()?;
            let scaled = topology.read_terminal(self.output)? * 255.0;
            let err = scaled - f64::from(expected);
            squared += err * err;
            emitted.push(scaled.round().clamp(0.0, 255.0) as u8);
        }
        Ok((emitted, squared))
    }
}

impl Evaluator for SequenceEvaluator {
    fn evaluate(
        &mut self,
        topology: &mut Topology,
        _context: Option<&MutationContext<'_>>,
    ) -> Result<f64, EvaluationError> {
        let (_, squared) = self.run(topology)?;
        Ok(-squared.sqrt())
    }
}
