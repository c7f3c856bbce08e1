//! The capability contract every graph node implements.

use std::fmt;

use crate::error::NodeProtocolError;
use crate::port::{Channel, Direction};
use crate::topology::TickInputs;

/// A computing participant of a [`Topology`](crate::Topology).
///
/// A node declares its channels through [`capabilities`](Node::capabilities);
/// the topology only wires declared channels in their declared direction.
/// Each tick the topology calls [`activate`](Node::activate) once, handing the
/// node a [`TickInputs`] it uses to read the weighted sum arriving at each of
/// its sink channels.
///
/// Nodes also expose a two-scalar internal state (persistent memory and last
/// output) so a trainer can snapshot and restore them.
pub trait Node: fmt::Debug {
    /// Short name of the node kind, used in error messages.
    fn kind(&self) -> &'static str;

    /// Declared channels and their directions.
    fn capabilities(&self) -> &'static [(Channel, Direction)];

    /// Direction of `channel`, or `None` if it is not declared.
    fn direction(&self, channel: Channel) -> Option<Direction> {
        self.capabilities()
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|&(_, d)| d)
    }

    /// Run one tick of the node's update.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError`] if the node asks for an undeclared channel.
    fn activate(&mut self, inputs: &TickInputs<'_>) -> Result<(), NodeProtocolError>;

    /// Current value of a declared channel.
    ///
    /// # Errors
    ///
    /// Returns [`NodeProtocolError::UndeclaredChannel`] for any other channel.
    fn read(&self, channel: Channel) -> Result<f64, NodeProtocolError>;

    /// Persistent internal memory.
    fn memory(&self) -> f64;

    /// Last computed output.
    fn output(&self) -> f64;

    /// Overwrite memory and output; derived channels are recomputed from them.
    fn restore(&mut self, memory: f64, output: f64);

    /// Clone into a new box.
    fn box_clone(&self) -> Box<dyn Node>;
}

impl Clone for Box<dyn Node> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
