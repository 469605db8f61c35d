//! Reference model of emitter buffering.
//!
//! The model is the obviously-correct version of the ready gate: a flag, a
//! queue and a delivery log. Property tests drive the model and a real
//! [`paywall_core::emitter::Emitter`] with the same [`Operation`] sequence
//! and require identical observations.

use std::collections::VecDeque;

/// One step applied to both the model and the real emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Host sends message number `n`
    Send(u16),
    /// Surface announces readiness
    Handshake,
    /// Surface announces readiness from a foreign origin
    ForeignHandshake,
    /// Surface posts an undecodable event
    Garbage,
}

/// Reference emitter.
#[derive(Debug, Clone, Default)]
pub struct EmitterModel {
    ready: bool,
    buffer: VecDeque<u16>,
    delivered: Vec<u16>,
}

impl EmitterModel {
    /// Apply `operation`.
    pub fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::Send(n) if self.ready => self.delivered.push(*n),
            Operation::Send(n) => self.buffer.push_back(*n),
            Operation::Handshake => {
                self.ready = true;
                self.delivered.extend(self.buffer.drain(..));
            },
            Operation::ForeignHandshake | Operation::Garbage => {},
        }
    }

    /// Whether the peer is ready.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Messages waiting for readiness.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Messages delivered to the peer, in delivery order.
    pub fn delivered(&self) -> &[u16] {
        &self.delivered
    }
}
