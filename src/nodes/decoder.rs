//! Hub protocol decoder node
//!
//! Drives the frame decode engine over a live edge stream. One frame is
//! decoded per `work()` call, so the scheduler's stop signal is honored
//! within a frame's worth of latency. Records buffer inside the sink and
//! flush as one batch at the frame's commit point; markers flow through
//! immediately, decoupled from the record stream.

use crate::config::SerialConfig;
use crate::decode::frame::{BitMarker, DataRecord, FrameDecoder, HubFrame, ResultSink};
use crate::runtime::node::{InputPort, OutputPort, ProcessNode, WorkError, WorkResult};
use crate::runtime::ports::{PortDirection, PortSchema};
use crate::runtime::sender::Sender;
use crate::signal::{CursorState, Edge, StreamCursor};
use crate::HubError;
use std::collections::VecDeque;
use tracing::trace;

/// Sink that forwards decode output to the node's output ports.
///
/// Records are held back until `commit()` so consumers observe whole
/// frames atomically. Unconnected outputs discard silently; a send failure
/// (all consumers gone) is latched and surfaced after the frame.
struct PortSink {
    pending: Vec<DataRecord>,
    records: Option<Sender<DataRecord>>,
    markers: Option<Sender<BitMarker>>,
    send_failed: bool,
}

impl PortSink {
    fn new(records: Option<Sender<DataRecord>>, markers: Option<Sender<BitMarker>>) -> Self {
        Self {
            pending: Vec::new(),
            records,
            markers,
            send_failed: false,
        }
    }

    fn finish(self) -> WorkResult<()> {
        if self.send_failed {
            Err(WorkError::SendError(
                "downstream consumer disconnected".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl ResultSink for PortSink {
    fn add_record(&mut self, record: DataRecord) {
        self.pending.push(record);
    }

    fn add_marker(&mut self, marker: BitMarker) {
        if let Some(tx) = &self.markers {
            if tx.send(marker).is_err() {
                self.send_failed = true;
            }
        }
    }

    fn commit(&mut self) {
        trace!("committing {} records", self.pending.len());
        for record in self.pending.drain(..) {
            if let Some(tx) = &self.records {
                if tx.send(record).is_err() {
                    self.send_failed = true;
                }
            }
        }
    }
}

/// Streaming hub protocol decoder.
///
/// Input: `serial` edge stream. Outputs: `records` (per-field data
/// records), `markers` (per-bit timing markers), `frames` (one per decoded
/// frame). All outputs are optional.
pub struct HubDecoder {
    name: String,
    decoder: FrameDecoder,
    edge_buffer: VecDeque<Edge>,
    cursor_state: CursorState,
    aligned: bool,
    frames_decoded: u64,
}

impl HubDecoder {
    /// Create a decoder node for a configuration and stream sample rate.
    pub fn new(config: &SerialConfig, sample_rate_hz: u32) -> Result<Self, HubError> {
        Ok(Self {
            name: "hub_decoder".to_string(),
            decoder: FrameDecoder::new(config, sample_rate_hz)?,
            edge_buffer: VecDeque::new(),
            cursor_state: CursorState::new(),
            aligned: false,
            frames_decoded: 0,
        })
    }

    /// Set custom name (builder pattern)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Frames decoded so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl ProcessNode for HubDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        3
    }

    fn input_schema(&self) -> Vec<PortSchema> {
        vec![PortSchema::new::<Edge>("serial", 0, PortDirection::Input)]
    }

    fn output_schema(&self) -> Vec<PortSchema> {
        vec![
            PortSchema::new::<DataRecord>("records", 0, PortDirection::Output),
            PortSchema::new::<BitMarker>("markers", 1, PortDirection::Output),
            PortSchema::new::<HubFrame>("frames", 2, PortDirection::Output),
        ]
    }

    fn work(&mut self, inputs: &[InputPort], outputs: &[OutputPort]) -> WorkResult<usize> {
        let Self {
            decoder,
            edge_buffer,
            cursor_state,
            aligned,
            frames_decoded,
            ..
        } = self;

        let receiver = inputs
            .first()
            .and_then(|port| port.get::<Edge>(edge_buffer))
            .ok_or_else(|| WorkError::NodeError("Missing serial input".to_string()))?;
        let mut cursor = StreamCursor::new(receiver, cursor_state)?;

        if !*aligned {
            decoder.align_to_idle(&mut cursor)?;
            *aligned = true;
        }

        let mut sink = PortSink::new(
            outputs.first().and_then(|port| port.get::<DataRecord>()),
            outputs.get(1).and_then(|port| port.get::<BitMarker>()),
        );

        let frame = decoder.decode_frame(&mut cursor, &mut sink)?;
        sink.finish()?;

        if let Some(frames_tx) = outputs.get(2).and_then(|port| port.get::<HubFrame>()) {
            frames_tx.send(frame)?;
        }

        *frames_decoded += 1;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::CaptureSource;
    use crate::runtime::pipeline::Pipeline;
    use crate::sim::SimulationGenerator;
    use std::sync::{Arc, Mutex};

    /// Sink node collecting decoded frames for assertions.
    struct FrameCollector {
        frames: Arc<Mutex<Vec<HubFrame>>>,
        buffer: VecDeque<HubFrame>,
    }

    impl ProcessNode for FrameCollector {
        fn name(&self) -> &str {
            "frame_collector"
        }

        fn num_inputs(&self) -> usize {
            1
        }

        fn num_outputs(&self) -> usize {
            0
        }

        fn input_schema(&self) -> Vec<PortSchema> {
            vec![PortSchema::new::<HubFrame>("frames", 0, PortDirection::Input)]
        }

        fn work(&mut self, inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
            let mut input = inputs
                .first()
                .and_then(|port| port.get::<HubFrame>(&mut self.buffer))
                .ok_or_else(|| WorkError::NodeError("Missing frames input".to_string()))?;
            let frame = input.recv()?;
            self.frames.lock().unwrap().push(frame);
            Ok(1)
        }
    }

    #[test]
    fn test_pipeline_decodes_streamed_frames() {
        let config = SerialConfig {
            bit_rate: 9600,
            ..Default::default()
        };
        let sample_rate = 96_000;

        let frame_a: [u8; 13] = [
            0x44, 0x4B, 0x0D, 0x00, 0x01, 0x02, 0x10, 0x20, 0x01, 0x7F, 0x99, 0x88, 0x77,
        ];
        let frame_b: [u8; 11] = [
            0x44, 0x4B, 0x0B, 0x00, 0x02, 0x01, 0x11, 0x10, 0x04, 0x7F, 0x2A,
        ];

        let mut generator = SimulationGenerator::new(&config, sample_rate).unwrap();
        generator.append_frame(&frame_a);
        generator.append_frame(&frame_b);
        let capture = generator.capture();

        let collected = Arc::new(Mutex::new(Vec::new()));

        let mut pipeline = Pipeline::new();
        pipeline
            .add_process("source", CaptureSource::new(&capture))
            .unwrap();
        pipeline
            .add_process("decoder", HubDecoder::new(&config, sample_rate).unwrap())
            .unwrap();
        pipeline
            .add_process(
                "collector",
                FrameCollector {
                    frames: Arc::clone(&collected),
                    buffer: VecDeque::new(),
                },
            )
            .unwrap();

        pipeline.connect("source", "serial", "decoder", "serial").unwrap();
        pipeline.connect("decoder", "frames", "collector", "frames").unwrap();

        let scheduler = pipeline.build().unwrap();
        scheduler.wait();

        let frames = collected.lock().unwrap();
        assert_eq!(frames.len(), 2);

        assert!(frames[0].has_hub_sync());
        assert_eq!(frames[0].payload, vec![0x99, 0x88]);
        assert_eq!(frames[0].packet_type, 0x7F01);
        assert_eq!(frames[0].checksum, Some(0x77));

        assert_eq!(frames[1].length, 11);
        assert!(frames[1].payload.is_empty());
        assert_eq!(frames[1].packet_type, 0x7F04);
        assert_eq!(frames[1].checksum, Some(0x2A));
    }
}
