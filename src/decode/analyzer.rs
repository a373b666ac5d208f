//! Whole-capture analysis with bit-rate rerun
//!
//! Drives the frame decoder over an owned [`Capture`] until exhaustion.
//! When auto-baud is enabled, the rerun advisor is consulted after each
//! pass; a corrected bit rate discards the pass's output and redecodes from
//! the start. The configuration only ever changes between passes, so timing
//! stays consistent within any single decode run.

use crate::config::SerialConfig;
use crate::decode::baud::{self, RerunDecision};
use crate::decode::frame::{BitMarker, CollectSink, DataRecord, FrameDecoder, HubFrame};
use crate::runtime::errors::WorkError;
use crate::signal::{Capture, SignalCursor};
use crate::HubError;
use tracing::info;

/// Safety bound on advisor-triggered redecodes.
const MAX_RERUNS: u32 = 3;

/// Result of analyzing a capture.
#[derive(Debug)]
pub struct CaptureAnalysis {
    /// Decoded frames in order
    pub frames: Vec<HubFrame>,
    /// Committed data records across all frames
    pub records: Vec<DataRecord>,
    /// All emitted bit markers
    pub markers: Vec<BitMarker>,
    /// Bit rate the final pass decoded at
    pub final_bit_rate: u32,
    /// Number of advisor-triggered redecodes
    pub reruns: u32,
}

/// Decode a capture to exhaustion, rerunning with a corrected bit rate when
/// the advisor demands it.
pub fn analyze_capture(
    capture: &Capture,
    config: &SerialConfig,
    sample_rate_hz: u32,
) -> Result<CaptureAnalysis, HubError> {
    let mut config = config.clone();
    let mut reruns = 0;

    loop {
        let decoder = FrameDecoder::new(&config, sample_rate_hz)?;
        let mut sink = CollectSink::new();
        let mut cursor = capture.cursor();
        let mut frames = Vec::new();

        let mut run = || -> Result<(), WorkError> {
            decoder.align_to_idle(&mut cursor)?;
            loop {
                frames.push(decoder.decode_frame(&mut cursor, &mut sink)?);
            }
        };
        match run() {
            // End of capture is the expected exit
            Err(WorkError::Shutdown) => {}
            Err(e) => return Err(HubError::Decode(e.to_string())),
            Ok(()) => unreachable!("decode loop only exits by error"),
        }

        if config.auto_baud && reruns < MAX_RERUNS {
            match baud::evaluate(&config, sample_rate_hz, cursor.min_pulse_width_so_far())? {
                decision @ RerunDecision::Rerun { corrected_bit_rate } => {
                    info!(
                        "redecoding: configured bit rate {} corrected to {}",
                        config.bit_rate, corrected_bit_rate
                    );
                    decision.apply(&mut config);
                    reruns += 1;
                    continue;
                }
                RerunDecision::NoRerun => {}
            }
        }

        return Ok(CaptureAnalysis {
            frames,
            records: sink.records,
            markers: sink.markers,
            final_bit_rate: config.bit_rate,
            reruns,
        });
    }
}
