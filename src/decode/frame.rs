//! Hub protocol frame decoder
//!
//! Walks a sampled serial waveform one frame at a time: seek the start
//! edge, offset to the first data-bit center, read the fixed header, stream
//! the payload, record the checksum, commit, resynchronize. Each iteration
//! re-seeks a fresh start edge, so a malformed frame never poisons the next
//! one.
//!
//! Frame layout on the wire (all multi-byte fields little-endian):
//! sync0, sync1, length(u16), dest, src, msg_num, ref_num,
//! packet_type(u16), payload[length - 11], checksum.

use crate::config::{BitTiming, SerialConfig};
use crate::decode::bits::{BitOrder, WordBuilder};
use crate::runtime::errors::{WorkError, WorkResult};
use crate::signal::{BitLevel, SignalCursor};
use crate::HubError;
use tracing::{debug, trace, warn};

/// First sync byte of a hub protocol frame
pub const SYNC0: u8 = 0x44;
/// Second sync byte of a hub protocol frame
pub const SYNC1: u8 = 0x4B;

/// Fixed byte count of a frame outside the payload: two sync bytes, the
/// two-byte length, four address/sequence bytes, the two-byte packet type
/// and the checksum. The length field counts the whole frame, so
/// `payload_len = length - 11`.
pub const MIN_FRAME_LEN: u16 = 11;

/// Which protocol field a data record was read as
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Sync0,
    Sync1,
    Length,
    DestAddr,
    SrcAddr,
    MsgNum,
    RefNum,
    PacketType,
    Payload,
    Checksum,
}

/// One decoded field value with the sample range it was read from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataRecord {
    /// Sample of the field's first bit center
    pub start_sample: u64,
    /// Last sample of the field's span (strictly before the next record's
    /// start)
    pub end_sample: u64,
    pub value: u64,
    pub kind: RecordKind,
}

/// Marker shape for diagnostic visualization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// A bit was sampled at this position
    Dot,
    /// A framing problem was detected at this position
    ErrorX,
}

/// Per-bit timing marker, decoupled from the record stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitMarker {
    pub sample: u64,
    pub kind: MarkerKind,
    pub channel: usize,
}

/// One decoded protocol frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubFrame {
    /// Sample of the start-bit edge this frame was synchronized on
    pub start_sample: u64,
    /// Last sample of the frame's decoded span
    pub end_sample: u64,
    pub sync0: u8,
    pub sync1: u8,
    pub length: u16,
    pub dest: u8,
    pub src: u8,
    pub msg_num: u8,
    pub ref_num: u8,
    pub packet_type: u16,
    pub payload: Vec<u8>,
    /// Trailing checksum byte; recorded but not validated. None when the
    /// frame was cut short by a framing error.
    pub checksum: Option<u8>,
    /// Set when the length field implies a negative payload
    pub framing_error: bool,
}

impl HubFrame {
    /// Whether the sync bytes carry the hub protocol's `0x44 0x4B` prefix.
    pub fn has_hub_sync(&self) -> bool {
        self.sync0 == SYNC0 && self.sync1 == SYNC1
    }
}

/// Display name for the core hub packet types.
pub fn known_packet_type_name(packet_type: u16) -> Option<&'static str> {
    match packet_type {
        0x7F01 => Some("ACK"),
        0x7F02 => Some("NACK"),
        0x7F03 => Some("GetModuleStatus"),
        0x7F04 => Some("KeepAlive"),
        0x7F05 => Some("FailSafe"),
        0x7F06 => Some("SetNewModuleAddress"),
        0x7F07 => Some("QueryInterface"),
        0x7F0C => Some("SetModuleLEDPattern"),
        0x7F0D => Some("GetModuleLEDPattern"),
        0x7F0E => Some("DebugLogLevel"),
        0x7F0F => Some("Discovery"),
        _ => None,
    }
}

/// Sink for decode output.
///
/// Records accumulate until `commit()` publishes the batch atomically, once
/// per frame; markers are observational and flow through immediately.
pub trait ResultSink {
    fn add_record(&mut self, record: DataRecord);
    fn add_marker(&mut self, marker: BitMarker);
    fn commit(&mut self);
}

/// In-memory sink with commit-gated record visibility.
#[derive(Debug, Default)]
pub struct CollectSink {
    pending: Vec<DataRecord>,
    /// Committed records, in decode order
    pub records: Vec<DataRecord>,
    /// All markers, in emission order
    pub markers: Vec<BitMarker>,
    /// Number of commit() calls observed
    pub commits: usize,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for CollectSink {
    fn add_record(&mut self, record: DataRecord) {
        self.pending.push(record);
    }

    fn add_marker(&mut self, marker: BitMarker) {
        self.markers.push(marker);
    }

    fn commit(&mut self) {
        self.records.append(&mut self.pending);
        self.commits += 1;
    }
}

/// The frame decode engine, stateless across frames.
///
/// Byte cells are read LSB-first (the hub protocol's wire order), eight
/// continuous bit cells at a time; a frame is one start edge followed by
/// its bytes back-to-back.
pub struct FrameDecoder {
    timing: BitTiming,
    channel: usize,
}

impl FrameDecoder {
    /// Build a decoder for a configuration and capture sample rate.
    pub fn new(config: &SerialConfig, sample_rate_hz: u32) -> Result<Self, HubError> {
        let timing = config.bit_timing(sample_rate_hz)?;
        Ok(Self {
            timing,
            channel: config.input_channel,
        })
    }

    /// Ensure decoding starts from idle: if the signal is currently at the
    /// active (low) level, skip ahead to the next edge. Called once before
    /// the first frame so the start-edge seek never lands mid-byte.
    pub fn align_to_idle<S: SignalCursor>(&self, signal: &mut S) -> WorkResult<()> {
        if signal.current_level() == BitLevel::Low {
            signal.advance_to_next_edge()?;
        }
        Ok(())
    }

    /// Decode one frame: seek the next start edge, read header, payload and
    /// checksum, commit the batch, then resynchronize to idle.
    ///
    /// A frame whose length field is below [`MIN_FRAME_LEN`] is flagged
    /// with `framing_error` and cut short; decoding then re-seeks the next
    /// start edge as usual.
    pub fn decode_frame<S, K>(&self, signal: &mut S, sink: &mut K) -> WorkResult<HubFrame>
    where
        S: SignalCursor,
        K: ResultSink + ?Sized,
    {
        // Frame start: next falling edge, then offset to the center of the
        // first data bit (half a start bit plus one full bit period).
        signal.advance_to_next_edge()?;
        let start_sample = signal.current_sample();
        signal.advance(self.timing.samples_to_first_center)?;

        let sync0 = self.read_field(signal, sink, 1, RecordKind::Sync0)?.value as u8;
        let sync1 = self.read_field(signal, sink, 1, RecordKind::Sync1)?.value as u8;
        let length = self.read_field(signal, sink, 2, RecordKind::Length)?.value as u16;

        if length < MIN_FRAME_LEN {
            warn!(
                "frame at sample {} has length {} below the fixed overhead {}",
                start_sample, length, MIN_FRAME_LEN
            );
            sink.add_marker(BitMarker {
                sample: signal.current_sample(),
                kind: MarkerKind::ErrorX,
                channel: self.channel,
            });
            let end_sample = signal.current_sample().saturating_sub(1);
            sink.commit();
            self.resync(signal)?;
            return Ok(HubFrame {
                start_sample,
                end_sample,
                sync0,
                sync1,
                length,
                dest: 0,
                src: 0,
                msg_num: 0,
                ref_num: 0,
                packet_type: 0,
                payload: Vec::new(),
                checksum: None,
                framing_error: true,
            });
        }
        let payload_len = length - MIN_FRAME_LEN;

        let dest = self.read_field(signal, sink, 1, RecordKind::DestAddr)?.value as u8;
        let src = self.read_field(signal, sink, 1, RecordKind::SrcAddr)?.value as u8;
        let msg_num = self.read_field(signal, sink, 1, RecordKind::MsgNum)?.value as u8;
        let ref_num = self.read_field(signal, sink, 1, RecordKind::RefNum)?.value as u8;
        let packet_type = self.read_field(signal, sink, 2, RecordKind::PacketType)?.value as u16;

        // Payload bytes are streamed one record at a time; they are never
        // folded into a single accumulated integer (a payload longer than
        // eight bytes cannot be one value).
        let mut payload = Vec::with_capacity(usize::from(payload_len));
        for _ in 0..payload_len {
            let record = self.read_field(signal, sink, 1, RecordKind::Payload)?;
            payload.push(record.value as u8);
        }

        let checksum = self.read_field(signal, sink, 1, RecordKind::Checksum)?.value as u8;

        let end_sample = signal.current_sample().saturating_sub(1);
        sink.commit();
        debug!(
            "frame [{}..{}] dest={:#04x} src={:#04x} type={:#06x} payload={}B",
            start_sample,
            end_sample,
            dest,
            src,
            packet_type,
            payload.len()
        );

        self.resync(signal)?;

        Ok(HubFrame {
            start_sample,
            end_sample,
            sync0,
            sync1,
            length,
            dest,
            src,
            msg_num,
            ref_num,
            packet_type,
            payload,
            checksum: Some(checksum),
            framing_error: false,
        })
    }

    /// Return to idle after a frame: if the signal sits at the active
    /// level, skip to the next edge. Tolerates the capture ending here,
    /// since the frame just decoded is already committed.
    fn resync<S: SignalCursor>(&self, signal: &mut S) -> WorkResult<()> {
        if signal.current_level() == BitLevel::Low {
            match signal.advance_to_next_edge() {
                Ok(()) | Err(WorkError::Shutdown) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read one field of `num_bytes` continuous byte cells, marking every
    /// sampled bit, and emit one record for the accumulated value.
    fn read_field<S, K>(
        &self,
        signal: &mut S,
        sink: &mut K,
        num_bytes: u8,
        kind: RecordKind,
    ) -> WorkResult<DataRecord>
    where
        S: SignalCursor,
        K: ResultSink + ?Sized,
    {
        let start_sample = signal.current_sample();
        let mut value: u64 = 0;

        for byte_index in 0..num_bytes {
            let mut builder = WordBuilder::new(8, BitOrder::LsbFirst);
            for _ in 0..8 {
                builder.add_bit(signal.current_level());
                // Dot exactly where this bit was sampled
                sink.add_marker(BitMarker {
                    sample: signal.current_sample(),
                    kind: MarkerKind::Dot,
                    channel: self.channel,
                });
                signal.advance(self.timing.samples_per_bit)?;
            }
            // Multi-byte fields assemble least-significant byte first
            value |= builder.value() << (8 * u32::from(byte_index));
            trace!("byte {:#04x} for {:?}", builder.value(), kind);
        }

        let record = DataRecord {
            start_sample,
            end_sample: signal.current_sample().saturating_sub(1),
            value,
            kind,
        };
        sink.add_record(record);
        Ok(record)
    }
}
