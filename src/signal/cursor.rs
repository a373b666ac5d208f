//! Forward-only cursors over sampled binary waveforms
//!
//! [`SignalCursor`] is the seam between the decode engine and whatever owns
//! the waveform. A cursor advances strictly forward, one writer per signal;
//! it never seeks backward. Two implementations are provided:
//!
//! - [`CaptureCursor`] walks an owned, fully recorded [`Capture`].
//! - [`StreamCursor`] walks a live edge stream arriving over a channel
//!   [`Receiver`], persisting its position between `work()` calls via an
//!   externally owned [`CursorState`].

use super::{BitLevel, Edge};
use crate::runtime::errors::{WorkError, WorkResult};
use crate::runtime::receiver::Receiver;

/// Read-side view of a sampled binary signal.
///
/// End of signal is reported as `WorkError::Shutdown`; bounding a decode is
/// the signal owner's responsibility, not the decoder's.
pub trait SignalCursor {
    /// Current sample index. Monotonically non-decreasing.
    fn current_sample(&self) -> u64;

    /// Level at the current sample.
    fn current_level(&self) -> BitLevel;

    /// Advance to the next level transition.
    fn advance_to_next_edge(&mut self) -> WorkResult<()>;

    /// Advance by exactly `samples` samples, consuming any transitions
    /// passed over.
    fn advance(&mut self, samples: u64) -> WorkResult<()>;

    /// Narrowest pulse (distance between consecutive transitions) consumed
    /// so far, in samples. Returns 0 if fewer than two transitions have
    /// been seen.
    fn min_pulse_width_so_far(&self) -> u64;
}

/// Position/level/pulse-statistic state shared by cursor implementations.
///
/// Held outside [`StreamCursor`] so a decoder node can keep it across
/// `work()` calls while the cursor (which borrows a transient channel
/// receiver) is rebuilt per call.
#[derive(Debug, Clone)]
pub struct CursorState {
    pub(crate) position: u64,
    pub(crate) level: BitLevel,
    last_transition: Option<u64>,
    min_pulse: Option<u64>,
    pub(crate) primed: bool,
}

impl CursorState {
    pub fn new() -> Self {
        Self {
            position: 0,
            level: BitLevel::High,
            last_transition: None,
            min_pulse: None,
            primed: false,
        }
    }

    /// Consume one transition edge: update level, position and the
    /// shortest-pulse statistic.
    fn apply_transition(&mut self, edge: &Edge) {
        if let Some(prev) = self.last_transition {
            let width = edge.position.saturating_sub(prev);
            if width > 0 {
                self.min_pulse = Some(match self.min_pulse {
                    Some(m) => m.min(width),
                    None => width,
                });
            }
        }
        self.last_transition = Some(edge.position);
        self.level = edge.level;
        self.position = edge.position;
    }

    fn min_pulse_width(&self) -> u64 {
        self.min_pulse.unwrap_or(0)
    }
}

impl Default for CursorState {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Capture — owned recorded waveform
// ────────────────────────────────────────────────────────────────────────────

/// A fully recorded waveform: an edge list plus a total sample length.
///
/// The first edge states the initial level; each subsequent edge is a
/// transition. Cursors created with [`Capture::cursor`] are independent, so
/// a capture can be decoded repeatedly (e.g. after a bit-rate rerun).
#[derive(Debug, Clone)]
pub struct Capture {
    edges: Vec<Edge>,
    num_samples: u64,
}

impl Capture {
    /// Create a capture from an edge list and its total length in samples.
    pub fn new(edges: Vec<Edge>, num_samples: u64) -> Self {
        Self { edges, num_samples }
    }

    /// Total number of samples in the capture.
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    /// Number of recorded edges (including the initial-level edge).
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// All recorded edges, initial-level edge first.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// A fresh cursor positioned at the start of the capture.
    pub fn cursor(&self) -> CaptureCursor<'_> {
        let mut state = CursorState::new();
        let mut index = 0;
        if let Some(first) = self.edges.first() {
            state.level = first.level;
            state.position = first.position;
            state.primed = true;
            index = 1;
        }
        CaptureCursor {
            capture: self,
            index,
            state,
        }
    }
}

/// Cursor over an owned [`Capture`].
pub struct CaptureCursor<'a> {
    capture: &'a Capture,
    index: usize,
    state: CursorState,
}

impl SignalCursor for CaptureCursor<'_> {
    fn current_sample(&self) -> u64 {
        self.state.position
    }

    fn current_level(&self) -> BitLevel {
        self.state.level
    }

    fn advance_to_next_edge(&mut self) -> WorkResult<()> {
        let edge = self
            .capture
            .edges
            .get(self.index)
            .copied()
            .ok_or(WorkError::Shutdown)?;
        self.index += 1;
        self.state.apply_transition(&edge);
        Ok(())
    }

    fn advance(&mut self, samples: u64) -> WorkResult<()> {
        let target = self.state.position + samples;
        if target >= self.capture.num_samples {
            // end of capture
            return Err(WorkError::Shutdown);
        }
        while let Some(edge) = self.capture.edges.get(self.index) {
            if edge.position > target {
                break;
            }
            let edge = *edge;
            self.index += 1;
            self.state.apply_transition(&edge);
        }
        self.state.position = target;
        Ok(())
    }

    fn min_pulse_width_so_far(&self) -> u64 {
        self.state.min_pulse_width()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StreamCursor — live edge stream over a channel
// ────────────────────────────────────────────────────────────────────────────

/// Cursor over a live [`Edge`] stream arriving on a channel.
///
/// The stream's first edge states the initial level; it is consumed once
/// when the cursor is first constructed over an unprimed [`CursorState`].
/// When the stream ends mid-`advance`, the last level is taken to extend to
/// the target; the following `advance_to_next_edge` then reports
/// `Shutdown`.
pub struct StreamCursor<'a> {
    rx: Receiver<'a, Edge>,
    state: &'a mut CursorState,
}

impl<'a> StreamCursor<'a> {
    /// Wrap a receiver, consuming the initial-level edge on first use.
    pub fn new(mut rx: Receiver<'a, Edge>, state: &'a mut CursorState) -> WorkResult<Self> {
        if !state.primed {
            let first = rx.recv()?;
            state.level = first.level;
            state.position = first.position;
            state.primed = true;
        }
        Ok(Self { rx, state })
    }
}

impl SignalCursor for StreamCursor<'_> {
    fn current_sample(&self) -> u64 {
        self.state.position
    }

    fn current_level(&self) -> BitLevel {
        self.state.level
    }

    fn advance_to_next_edge(&mut self) -> WorkResult<()> {
        let edge = self.rx.recv()?;
        debug_assert!(edge.level != self.state.level, "edge stream must alternate");
        self.state.apply_transition(&edge);
        Ok(())
    }

    fn advance(&mut self, samples: u64) -> WorkResult<()> {
        let target = self.state.position + samples;
        loop {
            let next_position = match self.rx.peek() {
                Ok(edge) => Some(edge.position),
                Err(WorkError::Shutdown) => None,
                Err(e) => return Err(e),
            };
            match next_position {
                Some(p) if p <= target => {
                    let edge = self.rx.recv()?;
                    self.state.apply_transition(&edge);
                }
                _ => break,
            }
        }
        self.state.position = target;
        Ok(())
    }

    fn min_pulse_width_so_far(&self) -> u64 {
        self.state.min_pulse_width()
    }
}
