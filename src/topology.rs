//! Recurrent signal-propagation graph.
//!
//! A [`Topology`] owns an arena of participants (nodes and terminals) and a
//! sorted list of weighted edges between their ports. Cycles are allowed:
//! during a tick every node reads other participants as they stood when the
//! tick began, so activation order never changes the result and a loop can't
//! deadlock. Reads of a node's own source channels stay live, which lets a
//! node's peephole feed its own output gate with this tick's memory.
//!
//! ## Determinism
//!
//! Edges are kept sorted by `(source, sink)` and participants are ordered by
//! creation, so the weight vector, the state vector and every floating-point
//! summation order are the same for equal wiring. Incoming edges are indexed
//! in Compressed Sparse Row (CSR) form, rebuilt lazily after the wiring
//! changes.

use std::collections::BTreeSet;

use slotmap::SlotMap;

use crate::activation::sigmoid;
use crate::error::{NodeProtocolError, StructuralError};
use crate::lstm::LstmNode;
use crate::node::Node;
use crate::port::{Channel, Direction, Edge, ParticipantId, Port, Terminal};
use crate::solution::Snapshot;

/// Weight given to a newly registered edge.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Anything that can sit at the end of an edge.
#[derive(Debug, Clone)]
pub enum Participant {
    /// Boundary value written by the caller; may only be a source.
    Input(Terminal),
    /// Boundary value sampled after each tick; may only be a sink.
    Output(Terminal),
    /// A computing node.
    Node(Box<dyn Node>),
}

impl Participant {
    /// Short name of the participant kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input terminal",
            Self::Output(_) => "output terminal",
            Self::Node(node) => node.kind(),
        }
    }

    /// Current value of `channel`. Terminals ignore the channel.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError::UndeclaredChannel`] if a node does not declare it.
    pub fn read(&self, channel: Channel) -> Result<f64, NodeProtocolError> {
        match self {
            Self::Input(t) | Self::Output(t) => Ok(t.value),
            Self::Node(node) => node.read(channel),
        }
    }
}

/// One or more ports given as a connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A single port.
    One(Port),
    /// Several ports; every one is connected.
    Many(Vec<Port>),
}

impl Endpoint {
    fn into_ports(self) -> Vec<Port> {
        match self {
            Self::One(port) => vec![port],
            Self::Many(ports) => ports,
        }
    }
}

impl From<Port> for Endpoint {
    fn from(port: Port) -> Self {
        Self::One(port)
    }
}

impl From<Vec<Port>> for Endpoint {
    fn from(ports: Vec<Port>) -> Self {
        Self::Many(ports)
    }
}

impl From<&[Port]> for Endpoint {
    fn from(ports: &[Port]) -> Self {
        Self::Many(ports.to_vec())
    }
}

impl<const N: usize> From<[Port; N]> for Endpoint {
    fn from(ports: [Port; N]) -> Self {
        Self::Many(ports.to_vec())
    }
}

/// CSR index of incoming edges, grouped by sink port.
#[derive(Debug, Clone)]
struct ActivationPlan {
    /// Sink ports that have at least one incoming edge, sorted.
    sinks: Vec<Port>,
    /// `edge_ids[offsets[i]..offsets[i + 1]]` are the edges ending at `sinks[i]`.
    offsets: Vec<usize>,
    /// Edge ranks, ascending within each sink.
    edge_ids: Vec<usize>,
}

impl ActivationPlan {
    fn build(edges: &[Edge]) -> Self {
        let mut incoming: Vec<(Port, usize)> = edges
            .iter()
            .enumerate()
            .map(|(rank, edge)| (edge.sink, rank))
            .collect();
        incoming.sort_unstable();

        let mut sinks = Vec::new();
        let mut offsets = Vec::new();
        let mut edge_ids = Vec::with_capacity(incoming.len());
        for (sink, rank) in incoming {
            if sinks.last() != Some(&sink) {
                sinks.push(sink);
                offsets.push(edge_ids.len());
            }
            edge_ids.push(rank);
        }
        offsets.push(edge_ids.len());

        Self {
            sinks,
            offsets,
            edge_ids,
        }
    }

    fn incoming(&self, sink: Port) -> &[usize] {
        match self.sinks.binary_search(&sink) {
            Ok(pos) => &self.edge_ids[self.offsets[pos]..self.offsets[pos + 1]],
            Err(_) => &[],
        }
    }
}

/// The read-only view of the graph a node is handed during its activation.
#[derive(Debug)]
pub struct TickInputs<'a> {
    sink: ParticipantId,
    plan: &'a ActivationPlan,
    edges: &'a [Edge],
    weights: &'a [f64],
    upstream: &'a [f64],
}

impl TickInputs<'_> {
    /// The node being activated.
    #[must_use]
    pub fn participant(&self) -> ParticipantId {
        self.sink
    }

    /// Σ `weight × upstream value` over every edge ending at `channel` of this node.
    ///
    /// Upstream values are those from the start of the tick, except edges the
    /// node feeds from itself, which read `own` live.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError::UndeclaredChannel`] if `own` does not declare
    /// `channel` as a sink.
    pub fn weighted_sum(&self, channel: Channel, own: &dyn Node) -> Result<f64, NodeProtocolError> {
        if own.direction(channel) != Some(Direction::Sink) {
            return Err(NodeProtocolError::UndeclaredChannel {
                kind: own.kind(),
                channel,
            });
        }

        let mut sum = 0.0;
        for &rank in self.plan.incoming(Port::new(self.sink, channel)) {
            let source = self.edges[rank].source;
            let value = if source.participant == self.sink {
                own.read(source.channel)?
            } else {
                self.upstream[rank]
            };
            sum += self.weights[rank] * value;
        }
        Ok(sum)
    }
}

/// Ports of a grid built by [`Topology::lstm_grid`].
#[derive(Debug, Clone)]
pub struct LstmGrid {
    /// The wired topology.
    pub topology: Topology,
    /// Grid nodes, in creation order.
    pub nodes: Vec<ParticipantId>,
    /// Input terminal feeding the first node's `input`.
    pub input: ParticipantId,
    /// Output terminal reading the last node's `output`.
    pub output: ParticipantId,
}

/// Nodes, terminals and the weighted edges between them.
#[derive(Debug, Clone)]
pub struct Topology {
    participants: SlotMap<ParticipantId, Participant>,
    /// Sorted; `weights[i]` belongs to `edges[i]`.
    edges: Vec<Edge>,
    weights: Vec<f64>,
    /// Nodes at the end of at least one edge, in creation order.
    nodes: BTreeSet<ParticipantId>,
    /// Output terminals with at least one incoming edge.
    outputs: BTreeSet<ParticipantId>,
    squash_outputs: bool,
    plan: Option<ActivationPlan>,
    upstream: Vec<f64>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// An empty topology with logistic output squashing enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            participants: SlotMap::with_key(),
            edges: Vec::new(),
            weights: Vec::new(),
            nodes: BTreeSet::new(),
            outputs: BTreeSet::new(),
            squash_outputs: true,
            plan: None,
            upstream: Vec::new(),
        }
    }

    /// Build a fully cross-connected grid of `size` LSTM nodes.
    ///
    /// Each node's peephole feeds its own three gates, every node's output
    /// feeds all four sinks of every node (itself included), an input terminal
    /// feeds the first node's `input` and an output terminal reads the last
    /// node's `output`. A grid of `n` nodes has `3n + 4n² + 2` edges.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::MalformedEndpoint`] for an empty grid.
    pub fn lstm_grid(size: usize) -> Result<LstmGrid, StructuralError> {
        let mut topology = Self::new();
        let nodes: Vec<ParticipantId> = (0..size).map(|_| topology.add_lstm()).collect();
        let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
            return Err(StructuralError::MalformedEndpoint(
                "a grid needs at least one node".into(),
            ));
        };

        for &node in &nodes {
            topology.link(
                Port::new(node, Channel::Peephole),
                [
                    Port::new(node, Channel::InputGate),
                    Port::new(node, Channel::ForgetGate),
                    Port::new(node, Channel::OutputGate),
                ],
            )?;
        }
        for &from in &nodes {
            for &to in &nodes {
                topology.link(
                    Port::new(from, Channel::Output),
                    [
                        Port::new(to, Channel::Input),
                        Port::new(to, Channel::InputGate),
                        Port::new(to, Channel::ForgetGate),
                        Port::new(to, Channel::OutputGate),
                    ],
                )?;
            }
        }
        let input = topology.add_input(Port::new(first, Channel::Input))?;
        let output = topology.add_output(Port::new(last, Channel::Output))?;

        Ok(LstmGrid {
            topology,
            nodes,
            input,
            output,
        })
    }

    /// Add a node. It takes part in ticks once it is wired.
    pub fn add_node(&mut self, node: impl Node + 'static) -> ParticipantId {
        self.participants.insert(Participant::Node(Box::new(node)))
    }

    /// Add a fresh [`LstmNode`].
    pub fn add_lstm(&mut self) -> ParticipantId {
        self.add_node(LstmNode::new())
    }

    /// Enable or disable logistic squashing of output terminal values.
    pub fn set_output_squashing(&mut self, enable: bool) {
        self.squash_outputs = enable;
    }

    /// Whether output terminal values are squashed.
    #[must_use]
    pub const fn output_squashing(&self) -> bool {
        self.squash_outputs
    }

    /// Connect every source port to every sink port.
    ///
    /// An omitted source creates a new input terminal, an omitted sink a new
    /// output terminal; the created terminal is returned. Re-registering an
    /// existing edge resets its weight to [`DEFAULT_WEIGHT`] without adding
    /// structure. Terminal ports may name any channel.
    ///
    /// # Errors
    ///
    /// Returns a [`StructuralError`] and leaves the topology untouched if both
    /// endpoints are omitted, a port names a participant not in this topology,
    /// a port list is empty, a node channel is unknown or used in the wrong
    /// direction, an output terminal is a source or an input terminal a sink.
    pub fn connect(
        &mut self,
        source: Option<Endpoint>,
        sink: Option<Endpoint>,
    ) -> Result<Option<ParticipantId>, StructuralError> {
        let sources = source
            .map(|e| self.resolve(e, Direction::Source))
            .transpose()?;
        let sinks = sink.map(|e| self.resolve(e, Direction::Sink)).transpose()?;

        let (sources, sinks, created) = match (sources, sinks) {
            (Some(sources), Some(sinks)) => (sources, sinks, None),
            (None, Some(sinks)) => {
                let id = self.participants.insert(Participant::Input(Terminal::default()));
                (vec![Port::terminal(id)], sinks, Some(id))
            }
            (Some(sources), None) => {
                let id = self.participants.insert(Participant::Output(Terminal::default()));
                (sources, vec![Port::terminal(id)], Some(id))
            }
            (None, None) => return Err(StructuralError::BareTerminalPair),
        };

        for &from in &sources {
            for &to in &sinks {
                self.insert_edge(Edge::new(from, to));
            }
        }
        Ok(created)
    }

    /// Connect existing ports.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub fn link(
        &mut self,
        source: impl Into<Endpoint>,
        sink: impl Into<Endpoint>,
    ) -> Result<(), StructuralError> {
        self.connect(Some(source.into()), Some(sink.into()))
            .map(|_| ())
    }

    /// Create an input terminal feeding `sink`.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub fn add_input(&mut self, sink: impl Into<Endpoint>) -> Result<ParticipantId, StructuralError> {
        self.connect(None, Some(sink.into()))?
            .ok_or(StructuralError::BareTerminalPair)
    }

    /// Create an output terminal reading `source`.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub fn add_output(
        &mut self,
        source: impl Into<Endpoint>,
    ) -> Result<ParticipantId, StructuralError> {
        self.connect(Some(source.into()), None)?
            .ok_or(StructuralError::BareTerminalPair)
    }

    fn resolve(&self, endpoint: Endpoint, wanted: Direction) -> Result<Vec<Port>, StructuralError> {
        let ports = endpoint.into_ports();
        if ports.is_empty() {
            return Err(StructuralError::MalformedEndpoint("empty port list".into()));
        }
        ports
            .into_iter()
            .map(|port| self.validate_port(port, wanted))
            .collect()
    }

    fn validate_port(&self, port: Port, wanted: Direction) -> Result<Port, StructuralError> {
        let participant = self.participants.get(port.participant).ok_or_else(|| {
            StructuralError::MalformedEndpoint(format!(
                "{:?} is not a participant of this topology",
                port.participant
            ))
        })?;

        match participant {
            Participant::Input(_) if wanted == Direction::Sink => Err(StructuralError::InputAsSink),
            Participant::Output(_) if wanted == Direction::Source => {
                Err(StructuralError::OutputAsSource)
            }
            Participant::Input(_) | Participant::Output(_) => Ok(Port::terminal(port.participant)),
            Participant::Node(node) => match node.direction(port.channel) {
                None => Err(StructuralError::UnknownChannel {
                    kind: node.kind(),
                    channel: port.channel,
                }),
                Some(declared) if declared != wanted => Err(StructuralError::RoleMismatch {
                    kind: node.kind(),
                    channel: port.channel,
                    declared,
                    requested: wanted,
                }),
                Some(_) => Ok(port),
            },
        }
    }

    fn insert_edge(&mut self, edge: Edge) {
        match self.edges.binary_search(&edge) {
            Ok(rank) => self.weights[rank] = DEFAULT_WEIGHT,
            Err(rank) => {
                self.edges.insert(rank, edge);
                self.weights.insert(rank, DEFAULT_WEIGHT);
                self.plan = None;
            }
        }

        for port in [edge.source, edge.sink] {
            match self.participants.get(port.participant) {
                Some(Participant::Node(_)) => {
                    self.nodes.insert(port.participant);
                }
                Some(Participant::Output(_)) => {
                    self.outputs.insert(port.participant);
                }
                _ => {}
            }
        }
    }

    /// Run one synchronous tick.
    ///
    /// Every wired node is activated exactly once, in creation order, against
    /// the values the graph held when the tick began. Afterwards each output
    /// terminal stores the weighted sum of its incoming edges, squashed
    /// through [`sigmoid`] when output squashing is on. Edge weights are never
    /// touched.
    ///
    /// # Errors
    ///
    /// Propagates a [`NodeProtocolError`] raised by a node.
    pub fn activate(&mut self) -> Result<(), NodeProtocolError> {
        let Self {
            participants,
            edges,
            weights,
            nodes,
            outputs,
            squash_outputs,
            plan,
            upstream,
        } = self;
        let edges: &[Edge] = edges;
        let weights: &[f64] = weights;
        let plan: &ActivationPlan = plan.get_or_insert_with(|| ActivationPlan::build(edges));

        upstream.clear();
        for edge in edges {
            let source = participants
                .get(edge.source.participant)
                .ok_or(NodeProtocolError::UnknownParticipant)?;
            upstream.push(source.read(edge.source.channel)?);
        }
        let upstream: &[f64] = upstream;

        for &id in nodes.iter() {
            let Some(Participant::Node(node)) = participants.get_mut(id) else {
                return Err(NodeProtocolError::NotANode);
            };
            let inputs = TickInputs {
                sink: id,
                plan,
                edges,
                weights,
                upstream,
            };
            node.activate(&inputs)?;
        }

        for &id in outputs.iter() {
            let mut sigma = 0.0;
            for &rank in plan.incoming(Port::terminal(id)) {
                let source = edges[rank].source;
                let value = participants
                    .get(source.participant)
                    .ok_or(NodeProtocolError::UnknownParticipant)?
                    .read(source.channel)?;
                sigma += weights[rank] * value;
            }
            if let Some(Participant::Output(terminal)) = participants.get_mut(id) {
                terminal.value = if *squash_outputs { sigmoid(sigma) } else { sigma };
            }
        }
        Ok(())
    }

    /// Σ `weight × current upstream value` over every edge ending at `sink`.
    ///
    /// # Errors
    ///
    /// Propagates a [`NodeProtocolError`] from reading an upstream node.
    pub fn get_inputs(&self, sink: Port) -> Result<f64, NodeProtocolError> {
        let sink = match self.participants.get(sink.participant) {
            Some(Participant::Node(_)) => sink,
            Some(_) => Port::terminal(sink.participant),
            None => return Err(NodeProtocolError::UnknownParticipant),
        };

        let mut sum = 0.0;
        for (edge, weight) in self.edges.iter().zip(&self.weights) {
            if edge.sink == sink {
                sum += weight * self.read(edge.source)?;
            }
        }
        Ok(sum)
    }

    /// Current value at `port`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError`] for an unknown participant or an
    /// undeclared node channel.
    pub fn read(&self, port: Port) -> Result<f64, NodeProtocolError> {
        self.participants
            .get(port.participant)
            .ok_or(NodeProtocolError::UnknownParticipant)?
            .read(port.channel)
    }

    /// Current value of a terminal.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError::NotATerminal`] when `terminal` is a node.
    pub fn read_terminal(&self, terminal: ParticipantId) -> Result<f64, NodeProtocolError> {
        match self.participants.get(terminal) {
            Some(Participant::Input(t) | Participant::Output(t)) => Ok(t.value),
            Some(Participant::Node(_)) => Err(NodeProtocolError::NotATerminal),
            None => Err(NodeProtocolError::UnknownParticipant),
        }
    }

    /// Overwrite a terminal's value.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError::NotATerminal`] when `terminal` is a node.
    pub fn write(&mut self, terminal: ParticipantId, value: f64) -> Result<(), NodeProtocolError> {
        match self.participants.get_mut(terminal) {
            Some(Participant::Input(t) | Participant::Output(t)) => {
                t.value = value;
                Ok(())
            }
            Some(Participant::Node(_)) => Err(NodeProtocolError::NotATerminal),
            None => Err(NodeProtocolError::UnknownParticipant),
        }
    }

    /// A participant by id.
    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// A node by id, or `None` for terminals and unknown ids.
    #[must_use]
    pub fn node(&self, id: ParticipantId) -> Option<&dyn Node> {
        match self.participants.get(id)? {
            Participant::Node(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    /// Number of nodes and terminals, wired or not.
    #[must_use]
    pub fn num_participants(&self) -> usize {
        self.participants.len()
    }

    /// Wired nodes in snapshot order.
    pub fn nodes(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.nodes.iter().copied()
    }

    /// Number of wired nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Output terminals in sampling order.
    pub fn outputs(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.outputs.iter().copied()
    }

    /// All edges in weight-vector order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of edges, which is the length of the weight vector.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Weight of `edge`, if registered.
    #[must_use]
    pub fn weight(&self, edge: &Edge) -> Option<f64> {
        self.edges
            .binary_search(edge)
            .ok()
            .map(|rank| self.weights[rank])
    }

    /// Set the weight of a registered edge, returning the previous weight.
    pub fn set_weight(&mut self, edge: &Edge, weight: f64) -> Option<f64> {
        let rank = self.edges.binary_search(edge).ok()?;
        Some(std::mem::replace(&mut self.weights[rank], weight))
    }

    /// All weights, in edge order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Copy of the weight vector.
    #[must_use]
    pub fn save_weights(&self) -> Vec<f64> {
        self.weights.clone()
    }

    /// Overwrite every weight, in edge order.
    ///
    /// # Panics
    ///
    /// Panics if `weights.len()` differs from [`num_edges`](Self::num_edges).
    pub fn load_weights(&mut self, weights: &[f64]) {
        assert_eq!(
            weights.len(),
            self.weights.len(),
            "Weight vector length mismatch: expected {}, got {}",
            self.weights.len(),
            weights.len()
        );
        self.weights.copy_from_slice(weights);
    }

    /// Length of the state vector: memory and output of every wired node.
    #[must_use]
    pub fn state_len(&self) -> usize {
        2 * self.nodes.len()
    }

    /// Every wired node's memory, followed by every wired node's output.
    #[must_use]
    pub fn save_state(&self) -> Vec<f64> {
        let nodes: Vec<&dyn Node> = self.nodes.iter().filter_map(|&id| self.node(id)).collect();
        let mut state = Vec::with_capacity(2 * nodes.len());
        state.extend(nodes.iter().map(|n| n.memory()));
        state.extend(nodes.iter().map(|n| n.output()));
        state
    }

    /// Restore a vector produced by [`save_state`](Self::save_state).
    ///
    /// Derived channels such as the LSTM peephole are recomputed by the nodes.
    ///
    /// # Panics
    ///
    /// Panics if `state.len()` differs from [`state_len`](Self::state_len).
    pub fn load_state(&mut self, state: &[f64]) {
        assert_eq!(
            state.len(),
            self.state_len(),
            "State vector length mismatch: expected {}, got {}",
            self.state_len(),
            state.len()
        );
        let (memory, output) = state.split_at(self.nodes.len());
        for (i, id) in self.nodes.iter().enumerate() {
            if let Some(Participant::Node(node)) = self.participants.get_mut(*id) {
                node.restore(memory[i], output[i]);
            }
        }
    }

    /// Weights and state together.
    #[must_use]
    pub fn save_snapshot(&self) -> Snapshot {
        Snapshot {
            weights: self.save_weights(),
            state: self.save_state(),
        }
    }

    /// Restore weights and state together.
    ///
    /// # Panics
    ///
    /// Panics if either vector does not fit this topology.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) {
        self.load_weights(&snapshot.weights);
        self.load_state(&snapshot.state);
    }
}
