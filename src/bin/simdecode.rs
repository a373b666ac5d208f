//! Demo: synthesize a hub protocol capture and decode it back
//!
//! Frames mode (default) builds a synthetic capture of hub frames, streams
//! it through the decoder pipeline and prints every decoded frame:
//!
//!   cargo run --bin simdecode -- --frames 5 --payload-len 4
//!
//! Units mode exercises the per-unit generator/reader round trip instead:
//!
//!   cargo run --bin simdecode -- --units -n 16

use clap::Parser;
use rhsp::{
    known_packet_type_name, CaptureSource, HubDecoder, HubFrame, InputPort, OutputPort, Pipeline,
    PortDirection, PortSchema, ProcessNode, SerialConfig, SimulationGenerator, UnitReader,
    WorkError, WorkResult,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bit rate in bits per second
    #[arg(long, default_value = "460800")]
    bit_rate: u32,

    /// Sample rate in Hz (defaults to 10x the bit rate)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Number of frames to synthesize
    #[arg(long, default_value = "5")]
    frames: usize,

    /// Payload bytes per frame
    #[arg(long, default_value = "4")]
    payload_len: u8,

    /// Round-trip generator units instead of protocol frames
    #[arg(long)]
    units: bool,

    /// Number of units in units mode
    #[arg(short, default_value = "16")]
    n: usize,
}

/// Sink node that prints decoded frames
struct FramePrinter {
    count: usize,
    buffer: std::collections::VecDeque<HubFrame>,
}

impl ProcessNode for FramePrinter {
    fn name(&self) -> &str {
        "frame_printer"
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
        self.count += 1;

        let type_name =
            known_packet_type_name(frame.packet_type).unwrap_or("?");
        info!(
            "frame #{} [{}..{}] sync={} dest={:#04x} src={:#04x} msg={:#04x} ref={:#04x} \
             type={:#06x} ({}) payload={:02X?} checksum={:02X?}",
            self.count,
            frame.start_sample,
            frame.end_sample,
            if frame.has_hub_sync() { "ok" } else { "??" },
            frame.dest,
            frame.src,
            frame.msg_num,
            frame.ref_num,
            frame.packet_type,
            type_name,
            frame.payload,
            frame.checksum,
        );
        Ok(1)
    }
}

/// Build one synthetic frame's bytes: sync, length, addressing, a known
/// packet type, counter payload and a trailing sum byte.
fn build_frame(msg_num: u8, payload_len: u8) -> Vec<u8> {
    let length = 11 + u16::from(payload_len);
    let packet_type: u16 = 0x7F01 + u16::from(msg_num % 4);

    let mut bytes = vec![
        0x44,
        0x4B,
        (length & 0xFF) as u8,
        (length >> 8) as u8,
        0x01,
        0x02,
        msg_num,
        0x00,
        (packet_type & 0xFF) as u8,
        (packet_type >> 8) as u8,
    ];
    for i in 0..payload_len {
        bytes.push(msg_num.wrapping_add(i));
    }
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    bytes.push(sum);
    bytes
}

fn run_frames(args: &Args, config: &SerialConfig, sample_rate: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut generator = SimulationGenerator::new(config, sample_rate)?;
    for i in 0..args.frames {
        generator.append_frame(&build_frame(i as u8, args.payload_len));
    }
    let capture = generator.capture();
    info!(
        "synthesized {} frames over {} samples ({} edges)",
        args.frames,
        capture.num_samples(),
        capture.num_edges()
    );

    let mut pipeline = Pipeline::new();
    pipeline.add_process("source", CaptureSource::new(&capture))?;
    pipeline.add_process("decoder", HubDecoder::new(config, sample_rate)?)?;
    pipeline.add_process(
        "printer",
        FramePrinter {
            count: 0,
            buffer: std::collections::VecDeque::new(),
        },
    )?;
    pipeline.connect("source", "serial", "decoder", "serial")?;
    pipeline.connect("decoder", "frames", "printer", "frames")?;

    let scheduler = pipeline.build()?;
    scheduler.wait();
    Ok(())
}

fn run_units(args: &Args, config: &SerialConfig, sample_rate: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut generator = SimulationGenerator::new(config, sample_rate)?;
    for value in 0..args.n as u64 {
        generator.append_unit(value);
    }
    let capture = generator.capture();

    let reader = UnitReader::new(config, sample_rate)?;
    let mut cursor = capture.cursor();
    for _ in 0..args.n {
        let unit = reader.read_unit(&mut cursor)?;
        info!(
            "unit [{}..{}] value={:#04x} parity_err={} framing_err={}",
            unit.start_sample, unit.end_sample, unit.value, unit.parity_error, unit.framing_error
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SerialConfig {
        bit_rate: args.bit_rate,
        ..Default::default()
    };
    let sample_rate = args
        .sample_rate
        .unwrap_or_else(|| args.bit_rate.saturating_mul(10));
    info!(
        "bit rate {} bits/s, sample rate {} Hz (minimum {})",
        config.bit_rate,
        sample_rate,
        config.minimum_sample_rate_hz()
    );

    if args.units {
        run_units(&args, &config, sample_rate)
    } else {
        run_frames(&args, &config, sample_rate)
    }
}
