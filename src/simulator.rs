//! In-memory network simulator for deterministic testing.
//!
//! A [`Simulator`] stands in for one direction of an unreliable link.  It
//! holds segments in a queue and injects faults as they are put on it, so
//! retransmission and reassembly can be driven hard without a network:
//!
//! | Fault        | Description                                          |
//! |--------------|------------------------------------------------------|
//! | Loss         | Drop a segment with probability `loss_rate`.         |
//! | Duplication  | Enqueue a segment twice with `duplicate_rate`.       |
//! | Reordering   | Insert at a random queue position, `reorder_rate`.   |
//!
//! All randomness comes from a `StdRng` seeded from the config, so a failing
//! run can be replayed exactly.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::segment::Segment;

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that a segment is silently dropped.
    pub loss_rate: f64,
    /// Probability that a surviving segment is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that a segment overtakes, or falls behind, queued ones.
    pub reorder_rate: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // Transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

/// One direction of a lossy link.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    in_transit: VecDeque<Segment>,
    dropped: u64,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            in_transit: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Put `seg` on the link, subject to the fault model.
    pub fn transmit(&mut self, seg: Segment) {
        if self.rng.random_bool(self.config.loss_rate) {
            log::trace!("[sim] drop seq={}", seg.header.seqno);
            self.dropped += 1;
            return;
        }
        if self.rng.random_bool(self.config.duplicate_rate) {
            log::trace!("[sim] duplicate seq={}", seg.header.seqno);
            self.enqueue(seg.clone());
        }
        self.enqueue(seg);
    }

    /// Take everything currently on the link, in delivery order.
    pub fn deliver(&mut self) -> Vec<Segment> {
        self.in_transit.drain(..).collect()
    }

    /// Number of segments waiting on the link.
    pub fn in_transit(&self) -> usize {
        self.in_transit.len()
    }

    /// Number of segments lost so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn enqueue(&mut self, seg: Segment) {
        if !self.in_transit.is_empty() && self.rng.random_bool(self.config.reorder_rate) {
            let at = self.rng.random_range(0..self.in_transit.len());
            log::trace!("[sim] reorder seq={} to slot {at}", seg.header.seqno);
            self.in_transit.insert(at, seg);
        } else {
            self.in_transit.push_back(seg);
        }
    }
}
