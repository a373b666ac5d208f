//! Core signal types for sampled binary waveforms

pub mod cursor;
pub mod synth;

pub use cursor::{Capture, CaptureCursor, CursorState, SignalCursor, StreamCursor};
pub use synth::{ClockGenerator, SyntheticSignal};

use std::fmt;

/// Logic level of a sampled binary signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitLevel {
    Low,
    High,
}

impl BitLevel {
    /// The opposite level
    pub fn toggled(self) -> Self {
        match self {
            BitLevel::Low => BitLevel::High,
            BitLevel::High => BitLevel::Low,
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, BitLevel::High)
    }
}

impl fmt::Display for BitLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BitLevel::Low => write!(f, "low"),
            BitLevel::High => write!(f, "high"),
        }
    }
}

/// Edge sample of a binary waveform
///
/// This is a run-length encoded representation that carries only level
/// changes. The level remains constant from `position` until the next
/// edge's `position`. The first edge of a stream states the initial level
/// rather than a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Channel level from this sample onward
    pub level: BitLevel,
    /// Sample index at which this level starts
    pub position: u64,
}

impl Edge {
    /// Create a new edge sample
    pub fn new(level: BitLevel, position: u64) -> Self {
        Self { level, position }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Edge[{} @ {}]", self.level, self.position)
    }
}
