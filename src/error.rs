//! Error types.
//!
//! Structural, protocol and configuration errors are assembly mistakes: they are
//! raised once, at the call that made them, and never retried. The only error
//! expected during normal training is [`EvaluationError::Aborted`], which an
//! evaluator raises to unwind an epoch.

use thiserror::Error;

use crate::port::{Channel, Direction};

/// Illegal or malformed wiring passed to [`Topology::connect`](crate::Topology::connect).
///
/// The topology is left unmodified whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// Both endpoints omitted: an input terminal wired straight to an output terminal.
    #[error("attempt to create an input/output terminal pair that bypasses all nodes")]
    BareTerminalPair,

    /// Endpoint does not name a participant of this topology, or is an empty port list.
    #[error("malformed endpoint: {0}")]
    MalformedEndpoint(String),

    /// The participant has no channel by that name.
    #[error("{kind} has no channel '{channel}'")]
    UnknownChannel {
        /// Kind of participant addressed.
        kind: &'static str,
        /// The channel that was requested.
        channel: Channel,
    },

    /// A channel name that does not parse.
    #[error("no such channel name '{0}'")]
    UnknownChannelName(String),

    /// A node channel used in the wrong direction.
    #[error("channel '{channel}' of {kind} is a {declared}, not a {requested}")]
    RoleMismatch {
        /// Kind of participant addressed.
        kind: &'static str,
        /// The channel that was requested.
        channel: Channel,
        /// Direction the node declares for the channel.
        declared: Direction,
        /// Direction the connection needed.
        requested: Direction,
    },

    /// An output terminal used as a connection source.
    #[error("output terminals may not be connection sources")]
    OutputAsSource,

    /// An input terminal used as a connection sink.
    #[error("input terminals may not be connection sinks")]
    InputAsSink,
}

/// Access to a participant outside its declared capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeProtocolError {
    /// Read of a channel the node never declared.
    #[error("{kind}: no such channel '{channel}'")]
    UndeclaredChannel {
        /// Kind of node addressed.
        kind: &'static str,
        /// The channel that was requested.
        channel: Channel,
    },

    /// The participant exists but is not a node.
    #[error("participant is a terminal, not a node")]
    NotANode,

    /// Terminal access addressed to a node.
    #[error("participant is a node, not a terminal")]
    NotATerminal,

    /// The participant id does not belong to this topology.
    #[error("unknown participant")]
    UnknownParticipant,
}

/// A trainer that cannot be built from what it was given.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// No topology supplied.
    #[error("no topology specified")]
    MissingTopology,

    /// No evaluator supplied.
    #[error("no evaluator specified")]
    MissingEvaluator,

    /// The topology has no weighted edges to train.
    #[error("topology has no connections")]
    NoConnections,

    /// The solution store must hold at least one solution.
    #[error("max_solutions must be at least 1, got {0}")]
    InvalidMaxSolutions(usize),

    /// Gene range must be finite and positive.
    #[error("weight_range must be finite and positive, got {0}")]
    InvalidWeightRange(f64),

    /// A persisted store with no solutions in it.
    #[error("solution store is empty")]
    EmptySolutionStore,

    /// A persisted solution does not fit this topology.
    #[error("solution layout mismatch: expected {expected_weights} weights and {expected_state} state entries, found {found_weights} and {found_state}")]
    LayoutMismatch {
        /// Number of edges in the topology.
        expected_weights: usize,
        /// Twice the number of participating nodes.
        expected_state: usize,
        /// Weights in the offending solution.
        found_weights: usize,
        /// State entries in the offending solution.
        found_state: usize,
    },
}

/// Failure raised from inside an [`Evaluator`](crate::Evaluator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// External cancellation (user interrupt, deadline). Unwinds the current epoch.
    #[error("evaluation aborted: {0}")]
    Aborted(String),

    /// The evaluator misused the topology.
    #[error(transparent)]
    Node(#[from] NodeProtocolError),
}

impl EvaluationError {
    /// Create an abort with the given reason.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }
}

/// Anything that can stop a trainer from being built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainerError {
    /// Invalid inputs to the builder.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The genesis evaluation failed.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
