//! Streaming decoder and simulation waveform generator for the REV Hub
//! RS-485/UART serial protocol (RHSP).
//!
//! The decode path walks a sampled binary waveform, recovers bit timing
//! from start edges, and parses the hub protocol's fixed frame layout
//! (sync bytes, little-endian length, addressing and sequence fields,
//! packet type, payload, checksum byte). The encode path synthesizes
//! sampled waveforms from unit values (start bit, configurable bit count
//! and order, optional parity, stop bits, optional inversion) that the
//! decode path consumes exactly under matching settings.
//!
//! # Architecture
//!
//! - **Signal layer**: run-length [`Edge`] streams with forward-only
//!   cursors over recorded captures or live channels
//! - **Decode engine**: frame and unit decoders over any [`SignalCursor`],
//!   plus a bit-rate rerun advisor
//! - **Simulation**: append-only synthetic waveform generation
//! - **Streaming runtime**: thread-per-node pipeline with crossbeam
//!   channels and cooperative, per-frame cancellation
//!
//! # Example
//!
//! ```
//! use rhsp::{analyze_capture, SerialConfig, SimulationGenerator};
//!
//! let config = SerialConfig { bit_rate: 9600, ..Default::default() };
//! let mut generator = SimulationGenerator::new(&config, 96_000)?;
//! generator.append_frame(&[
//!     0x44, 0x4B, 0x0C, 0x00, 0x01, 0x02, 0x03, 0x04, 0x01, 0x7F, 0xAB, 0x5C,
//! ]);
//!
//! let analysis = analyze_capture(&generator.capture(), &config, 96_000)?;
//! assert_eq!(analysis.frames.len(), 1);
//! assert_eq!(analysis.frames[0].payload, vec![0xAB]);
//! # Ok::<(), rhsp::HubError>(())
//! ```

use thiserror::Error;

pub mod config;
pub mod decode;
pub mod nodes;
pub mod runtime;
pub mod signal;
pub mod sim;

// Re-export configuration types
pub use config::{BitTiming, FramingMode, ParityMode, SerialConfig, SETTINGS_SCHEMA};

// Re-export signal types
pub use signal::{
    BitLevel, Capture, CaptureCursor, ClockGenerator, CursorState, Edge, SignalCursor,
    StreamCursor, SyntheticSignal,
};

// Re-export the decode engine
pub use decode::{
    analyze_capture, known_packet_type_name, BitExtractor, BitMarker, BitOrder, CaptureAnalysis,
    CollectSink, DataRecord, DecodedUnit, FrameDecoder, HubFrame, MarkerKind, RecordKind,
    RerunDecision, ResultSink, UnitReader, WordBuilder,
};

// Re-export the simulation generator
pub use sim::SimulationGenerator;

// Re-export streaming nodes
pub use nodes::{CaptureSource, HubDecoder, SimulationSource};

// Re-export streaming runtime components
pub use runtime::{
    register_type, ConnectionError, InputPort, OutputPort, Pipeline, PortDirection, PortSchema,
    ProcessNode, Scheduler, WorkError, WorkResult,
};

/// Crate-level error for configuration, settings and analysis failures.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings schema mismatch: expected '{expected}', got '{found}'")]
    SchemaMismatch { expected: String, found: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Settings parsing error: {0}")]
    ParseError(String),

    #[error("Timing anomaly: {0}")]
    Timing(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, HubError>;
