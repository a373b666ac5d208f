//! Decode path: bit primitives, frame and unit decoders, bit-rate advisor

pub mod analyzer;
pub mod baud;
pub mod bits;
pub mod frame;
pub mod unit;

pub use analyzer::{analyze_capture, CaptureAnalysis};
pub use baud::RerunDecision;
pub use bits::{BitExtractor, BitOrder, WordBuilder};
pub use frame::{
    known_packet_type_name, BitMarker, CollectSink, DataRecord, FrameDecoder, HubFrame,
    MarkerKind, RecordKind, ResultSink,
};
pub use unit::{DecodedUnit, UnitReader};
