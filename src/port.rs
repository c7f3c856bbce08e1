//! Wiring vocabulary: participants, channels, ports and edges.
//!
//! - [`ParticipantId`]: arena key for a node or terminal inside a [`Topology`](crate::Topology)
//! - [`Port`]: a `(participant, channel)` pair, one end of an edge
//! - [`Edge`]: an ordered `(source, sink)` pair of ports
//!
//! Participants are never removed, so arena keys order by creation. Ports and
//! edges derive `Ord` from them, which gives the stable edge enumeration the
//! weight vector is laid out in.

use std::fmt;
use std::str::FromStr;

use slotmap::new_key_type;

use crate::error::StructuralError;

new_key_type! {
    /// Creation-ordered identity of a node or terminal within a topology.
    pub struct ParticipantId;
}

/// Whether a channel receives signal (sink) or emits it (source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Destination of a connection.
    Sink = 0,
    /// Origin of a connection.
    Source = 1,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sink => f.write_str("sink"),
            Self::Source => f.write_str("source"),
        }
    }
}

/// Named signal channel of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Cell input.
    Input,
    /// Input gate.
    InputGate,
    /// Forget gate.
    ForgetGate,
    /// Output gate.
    OutputGate,
    /// Gated cell output.
    Output,
    /// Ungated, squashed cell memory.
    Peephole,
    /// The single value of an input or output terminal.
    Terminal,
}

impl Channel {
    /// Every channel, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Input,
        Self::InputGate,
        Self::ForgetGate,
        Self::OutputGate,
        Self::Output,
        Self::Peephole,
        Self::Terminal,
    ];

    /// Wire name of the channel.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::InputGate => "inputGate",
            Self::ForgetGate => "forgetGate",
            Self::OutputGate => "outputGate",
            Self::Output => "output",
            Self::Peephole => "peephole",
            Self::Terminal => "terminal",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = StructuralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| StructuralError::UnknownChannelName(s.to_owned()))
    }
}

/// One end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Port {
    /// Node or terminal the port belongs to.
    pub participant: ParticipantId,
    /// Channel on that participant.
    pub channel: Channel,
}

impl Port {
    /// Create a port.
    #[must_use]
    pub const fn new(participant: ParticipantId, channel: Channel) -> Self {
        Self {
            participant,
            channel,
        }
    }

    /// The port of an input or output terminal.
    #[must_use]
    pub const fn terminal(participant: ParticipantId) -> Self {
        Self::new(participant, Channel::Terminal)
    }
}

/// A weighted link from a source port to a sink port.
///
/// The weight itself lives in the topology's weight vector, at the edge's rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    /// Port signal is read from.
    pub source: Port,
    /// Port signal is delivered to.
    pub sink: Port,
}

impl Edge {
    /// Create an edge.
    #[must_use]
    pub const fn new(source: Port, sink: Port) -> Self {
        Self { source, sink }
    }
}

/// Boundary value holder: an input written by the caller, or an output sampled
/// at the end of each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Terminal {
    /// Current value.
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_channel_names_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(channel.name().parse::<Channel>(), Ok(channel));
        }
        assert_eq!(
            "cellState".parse::<Channel>(),
            Err(StructuralError::UnknownChannelName("cellState".into()))
        );
    }

    #[test]
    fn test_ports_order_by_creation() {
        let mut arena: SlotMap<ParticipantId, ()> = SlotMap::with_key();
        let first = arena.insert(());
        let second = arena.insert(());

        let a = Port::new(first, Channel::Output);
        let b = Port::new(second, Channel::Input);
        assert!(a < b);

        let e1 = Edge::new(a, b);
        let e2 = Edge::new(Port::new(first, Channel::Peephole), b);
        assert!(e1 < e2, "same participant orders by channel");
    }
}
