//! Long short-term memory node.
//!
//! Sinks: `input`, `inputGate`, `forgetGate`, `outputGate`.
//! Sources: `output`, `peephole`.
//!
//! One tick, in order:
//!
//! 1. `input = 4·σ(Σ input) − 2`
//! 2. `inputGate = σ(Σ inputGate)`
//! 3. `CEC += input · inputGate`
//! 4. `forgetGate = σ(Σ forgetGate)`; `CEC *= forgetGate`
//! 5. `peephole = σ(CEC)`
//! 6. `outputGate = σ(Σ outputGate)`
//! 7. `output = peephole · outputGate`
//!
//! The output gate is summed after step 5, so a peephole wired back into the
//! node's own output gate sees the memory of this tick, not the last one.

use crate::activation::{sigmoid, squash_input};
use crate::error::NodeProtocolError;
use crate::node::Node;
use crate::port::{Channel, Direction};
use crate::topology::TickInputs;

const CAPABILITIES: [(Channel, Direction); 6] = [
    (Channel::Input, Direction::Sink),
    (Channel::InputGate, Direction::Sink),
    (Channel::ForgetGate, Direction::Sink),
    (Channel::OutputGate, Direction::Sink),
    (Channel::Output, Direction::Source),
    (Channel::Peephole, Direction::Source),
];

/// A gated memory cell with a constant error carousel (CEC).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LstmNode {
    /// Persistent cell memory.
    pub cec: f64,
    input: f64,
    input_gate: f64,
    forget_gate: f64,
    output_gate: f64,
    output: f64,
    peephole: f64,
}

impl LstmNode {
    /// A node with zero memory. The peephole starts at `σ(0) = 0.5`.
    #[must_use]
    pub fn new() -> Self {
        let mut node = Self::default();
        node.restore(0.0, 0.0);
        node
    }
}

impl Node for LstmNode {
    fn kind(&self) -> &'static str {
        "LSTM_Node"
    }

    fn capabilities(&self) -> &'static [(Channel, Direction)] {
        &CAPABILITIES
    }

    fn activate(&mut self, inputs: &TickInputs<'_>) -> Result<(), NodeProtocolError> {
        self.input = squash_input(inputs.weighted_sum(Channel::Input, &*self)?);
        self.input_gate = sigmoid(inputs.weighted_sum(Channel::InputGate, &*self)?);
        self.cec += self.input * self.input_gate;

        self.forget_gate = sigmoid(inputs.weighted_sum(Channel::ForgetGate, &*self)?);
        self.cec *= self.forget_gate;

        self.peephole = sigmoid(self.cec);
        self.output_gate = sigmoid(inputs.weighted_sum(Channel::OutputGate, &*self)?);
        self.output = self.peephole * self.output_gate;
        Ok(())
    }

    fn read(&self, channel: Channel) -> Result<f64, NodeProtocolError> {
        match channel {
            Channel::Input => Ok(self.input),
            Channel::InputGate => Ok(self.input_gate),
            Channel::ForgetGate => Ok(self.forget_gate),
            Channel::OutputGate => Ok(self.output_gate),
            Channel::Output => Ok(self.output),
            Channel::Peephole => Ok(self.peephole),
            Channel::Terminal => Err(NodeProtocolError::UndeclaredChannel {
                kind: self.kind(),
                channel,
            }),
        }
    }

    fn memory(&self) -> f64 {
        self.cec
    }

    fn output(&self) -> f64 {
        self.output
    }

    fn restore(&mut self, memory: f64, output: f64) {
        self.cec = memory;
        self.output = output;
        self.peephole = sigmoid(memory);
    }

    fn box_clone(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let node = LstmNode::new();
        assert_eq!(node.direction(Channel::Input), Some(Direction::Sink));
        assert_eq!(node.direction(Channel::OutputGate), Some(Direction::Sink));
        assert_eq!(node.direction(Channel::Output), Some(Direction::Source));
        assert_eq!(node.direction(Channel::Peephole), Some(Direction::Source));
        assert_eq!(node.direction(Channel::Terminal), None);
    }

    #[test]
    fn test_read_undeclared_channel() {
        let node = LstmNode::new();
        assert_eq!(
            node.read(Channel::Terminal),
            Err(NodeProtocolError::UndeclaredChannel {
                kind: "LSTM_Node",
                channel: Channel::Terminal,
            })
        );
    }

    #[test]
    fn test_restore_derives_peephole() {
        let mut node = LstmNode::new();
        assert!((node.read(Channel::Peephole).unwrap() - 0.5).abs() < 1e-12);

        node.restore(2.0, 0.25);
        assert_eq!(node.memory(), 2.0);
        assert_eq!(node.output(), 0.25);
        assert_eq!(node.read(Channel::Peephole).unwrap(), sigmoid(2.0));
    }
}
