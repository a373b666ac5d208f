//! Synthetic waveform construction
//!
//! [`SyntheticSignal`] is an append-only output waveform: the writer owns a
//! monotonically advancing sample position and records level transitions as
//! it goes. It is never read back by its writer; consumers obtain a
//! [`Capture`] or drain edges for streaming.
//!
//! [`ClockGenerator`] converts bit periods into sample counts with a
//! fractional-error accumulator so long runs stay aligned even when
//! `sample_rate / bit_rate` is not an integer.

use super::cursor::Capture;
use super::{BitLevel, Edge};

/// Converts bit-period counts into whole sample counts.
///
/// Carries the rounding remainder from call to call, so the accumulated
/// sample count over many periods tracks the exact value to within half a
/// sample.
#[derive(Debug, Clone)]
pub struct ClockGenerator {
    samples_per_period: f64,
    error: f64,
}

impl ClockGenerator {
    /// Create a generator for a given bit rate and sample rate.
    pub fn new(bit_rate: u32, sample_rate_hz: u32) -> Self {
        Self {
            samples_per_period: f64::from(sample_rate_hz) / f64::from(bit_rate),
            error: 0.0,
        }
    }

    /// Samples to advance for `periods` bit periods, absorbing rounding
    /// error into subsequent calls.
    pub fn advance_by_periods(&mut self, periods: f64) -> u64 {
        let exact = periods * self.samples_per_period + self.error;
        let whole = exact.round();
        self.error = exact - whole;
        whole as u64
    }
}

/// Append-only synthetic waveform.
///
/// Starts at sample 0 with a given initial level; the writer advances the
/// position and records transitions. Edges can be drained incrementally
/// (for streaming producers) or snapshotted as a [`Capture`].
#[derive(Debug, Clone)]
pub struct SyntheticSignal {
    edges: Vec<Edge>,
    position: u64,
    level: BitLevel,
    drained: usize,
}

impl SyntheticSignal {
    /// Create an empty signal at sample 0 with the given initial level.
    pub fn new(initial_level: BitLevel) -> Self {
        Self {
            edges: vec![Edge::new(initial_level, 0)],
            position: 0,
            level: initial_level,
            drained: 0,
        }
    }

    /// Current write position (one past the last described sample).
    pub fn current_sample(&self) -> u64 {
        self.position
    }

    /// Current output level.
    pub fn current_level(&self) -> BitLevel {
        self.level
    }

    /// Advance the write position without changing level.
    pub fn advance(&mut self, samples: u64) {
        self.position += samples;
    }

    /// Toggle the output level at the current position.
    pub fn transition(&mut self) {
        self.level = self.level.toggled();
        self.edges.push(Edge::new(self.level, self.position));
    }

    /// Set the output level at the current position, transitioning only if
    /// it differs from the current level.
    pub fn transition_if_needed(&mut self, level: BitLevel) {
        if self.level != level {
            self.transition();
        }
    }

    /// Edges appended since the previous drain (initial-level edge
    /// included on the first call).
    pub fn drain_edges(&mut self) -> Vec<Edge> {
        let new = self.edges[self.drained..].to_vec();
        self.drained = self.edges.len();
        new
    }

    /// Snapshot the whole waveform as an owned [`Capture`].
    pub fn capture(&self) -> Capture {
        Capture::new(self.edges.clone(), self.position)
    }
}
