//! Simulation waveform generator
//!
//! The inverse of the decode path: encodes unit values (start bit, data
//! bits in the configured order, optional parity, stop bits, idle gap) into
//! an append-only synthetic waveform. Successive `generate` calls extend
//! the previously produced signal rather than restarting it, and the
//! waveform is decodable by the unit reader (and, for frame bursts, by the
//! frame decoder) under matching settings.

use crate::config::{FramingMode, SerialConfig};
use crate::decode::bits::{low_bits_mask, parity_bit, BitExtractor, BitOrder};
use crate::signal::{BitLevel, Capture, ClockGenerator, Edge, SyntheticSignal};
use crate::HubError;
use tracing::debug;

/// Idle gap inserted between generated units, in bit periods.
pub const IDLE_GAP_BIT_PERIODS: f64 = 10.0;

/// Stateful synthetic-signal producer.
///
/// Single-writer: owns its output signal and a rolling unit counter.
pub struct SimulationGenerator {
    config: SerialConfig,
    sample_rate_hz: u32,
    clock: ClockGenerator,
    signal: SyntheticSignal,
    next_value: u64,
    num_bits: u8,
}

impl SimulationGenerator {
    /// Create a generator producing at `sample_rate_hz`.
    ///
    /// The signal starts at idle (high) with one idle gap before the first
    /// unit.
    pub fn new(config: &SerialConfig, sample_rate_hz: u32) -> Result<Self, HubError> {
        // Same timing validation as the decode side: a bit rate the sample
        // rate cannot express is a configuration error here too
        config.bit_timing(sample_rate_hz)?;

        let mut clock = ClockGenerator::new(config.bit_rate, sample_rate_hz);
        let mut signal = SyntheticSignal::new(BitLevel::High);
        signal.advance(clock.advance_by_periods(IDLE_GAP_BIT_PERIODS));

        let extra = u8::from(config.framing == FramingMode::MultiDrop);
        Ok(Self {
            config: config.clone(),
            sample_rate_hz,
            clock,
            signal,
            next_value: 0,
            num_bits: config.bits_per_unit + extra,
        })
    }

    /// The generator's own sample rate.
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Current output position in samples.
    pub fn current_sample(&self) -> u64 {
        self.signal.current_sample()
    }

    /// Extend the signal with rolling-counter units until it reaches
    /// `up_to_sample` (expressed at `device_sample_rate_hz`), returning the
    /// newly appended edges.
    ///
    /// Repeated calls extend prior output; a target already reached
    /// produces nothing.
    pub fn generate(&mut self, up_to_sample: u64, device_sample_rate_hz: u32) -> Vec<Edge> {
        let target = adjust_target_sample(up_to_sample, device_sample_rate_hz, self.sample_rate_hz);

        while self.signal.current_sample() < target {
            let value = self.next_value;
            self.next_value = self.next_value.wrapping_add(1);
            self.append_unit(value);
            let gap = self.clock.advance_by_periods(IDLE_GAP_BIT_PERIODS);
            self.signal.advance(gap);
        }

        self.signal.drain_edges()
    }

    /// Append one framed unit: start bit, data bits, optional parity bit,
    /// forced-high stop.
    pub fn append_unit(&mut self, value: u64) {
        // Entering at idle: the start bit is a low-going transition
        self.signal.transition();
        let period = self.clock.advance_by_periods(1.0);
        self.signal.advance(period);

        let value = if self.config.inverted { !value } else { value };

        let mut extractor = BitExtractor::new(value, self.config.bit_order, self.num_bits);
        for _ in 0..self.num_bits {
            self.signal.transition_if_needed(extractor.next_bit());
            let period = self.clock.advance_by_periods(1.0);
            self.signal.advance(period);
        }

        // Parity covers the bits as transmitted
        if let Some(level) = parity_bit(value & low_bits_mask(self.num_bits), self.config.parity) {
            self.signal.transition_if_needed(level);
            let period = self.clock.advance_by_periods(1.0);
            self.signal.advance(period);
        }

        self.signal.transition_if_needed(BitLevel::High);
        let stop = self.clock.advance_by_periods(self.config.stop_bits);
        self.signal.advance(stop);
    }

    /// Append one protocol frame as a continuous burst: a single start
    /// edge, then every byte's eight bit cells back-to-back, LSB first,
    /// ending forced-high with a stop and an idle gap.
    ///
    /// This is the waveform shape the frame decoder consumes.
    pub fn append_frame(&mut self, bytes: &[u8]) {
        debug!("appending {}-byte frame burst", bytes.len());
        self.signal.transition();
        let period = self.clock.advance_by_periods(1.0);
        self.signal.advance(period);

        for &byte in bytes {
            let mut extractor = BitExtractor::new(u64::from(byte), BitOrder::LsbFirst, 8);
            for _ in 0..8 {
                self.signal.transition_if_needed(extractor.next_bit());
                let period = self.clock.advance_by_periods(1.0);
                self.signal.advance(period);
            }
        }

        self.signal.transition_if_needed(BitLevel::High);
        let stop = self.clock.advance_by_periods(self.config.stop_bits);
        self.signal.advance(stop);
        let gap = self.clock.advance_by_periods(IDLE_GAP_BIT_PERIODS);
        self.signal.advance(gap);
    }

    /// Snapshot everything generated so far as an owned [`Capture`].
    pub fn capture(&self) -> Capture {
        self.signal.capture()
    }
}

/// Scale a device-rate sample target into this generator's sample space.
fn adjust_target_sample(target: u64, device_sample_rate_hz: u32, sample_rate_hz: u32) -> u64 {
    if device_sample_rate_hz == sample_rate_hz || device_sample_rate_hz == 0 {
        target
    } else {
        (u128::from(target) * u128::from(sample_rate_hz) / u128::from(device_sample_rate_hz)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::unit::UnitReader;

    const SAMPLE_RATE: u32 = 96_000;

    fn config() -> SerialConfig {
        SerialConfig {
            bit_rate: 9600,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_extends_to_target() {
        let mut generator = SimulationGenerator::new(&config(), SAMPLE_RATE).unwrap();
        let edges = generator.generate(5_000, SAMPLE_RATE);
        assert!(!edges.is_empty());
        assert!(generator.current_sample() >= 5_000);

        // Initial-level edge leads the stream
        assert_eq!(edges[0], Edge::new(BitLevel::High, 0));
    }

    #[test]
    fn test_generate_is_incremental() {
        let mut generator = SimulationGenerator::new(&config(), SAMPLE_RATE).unwrap();
        let first = generator.generate(2_000, SAMPLE_RATE);
        let reached = generator.current_sample();

        // Same target again: nothing new
        assert!(generator.generate(2_000, SAMPLE_RATE).is_empty());

        // A further target extends, never regenerates
        let second = generator.generate(4_000, SAMPLE_RATE);
        assert!(!second.is_empty());
        assert!(second.first().unwrap().position >= first.last().unwrap().position);
        assert!(generator.current_sample() > reached);
    }

    #[test]
    fn test_generated_units_count_upward() {
        let mut generator = SimulationGenerator::new(&config(), SAMPLE_RATE).unwrap();
        generator.generate(20_000, SAMPLE_RATE);
        let capture = generator.capture();

        let reader = UnitReader::new(&config(), SAMPLE_RATE).unwrap();
        let mut cursor = capture.cursor();
        for expected in 0..8u64 {
            let unit = reader.read_unit(&mut cursor).unwrap();
            assert_eq!(unit.value, expected);
            assert!(!unit.framing_error);
        }
    }

    #[test]
    fn test_counter_wraps_at_unit_width() {
        let mut generator = SimulationGenerator::new(&config(), SAMPLE_RATE).unwrap();
        generator.next_value = 0xFE;
        generator.generate(generator.current_sample() + 1_000, SAMPLE_RATE);
        let capture = generator.capture();

        let reader = UnitReader::new(&config(), SAMPLE_RATE).unwrap();
        let mut cursor = capture.cursor();
        assert_eq!(reader.read_unit(&mut cursor).unwrap().value, 0xFE);
        assert_eq!(reader.read_unit(&mut cursor).unwrap().value, 0xFF);
        // 0x100 truncates to the configured eight bits
        assert_eq!(reader.read_unit(&mut cursor).unwrap().value, 0x00);
    }

    #[test]
    fn test_device_rate_target_adjustment() {
        // Device captures at double the simulation rate: a device target of
        // 4000 samples is 2000 samples here
        let mut generator = SimulationGenerator::new(&config(), SAMPLE_RATE).unwrap();
        generator.generate(4_000, SAMPLE_RATE * 2);
        assert!(generator.current_sample() >= 2_000);
        assert!(generator.current_sample() < 4_000);
    }

    #[test]
    fn test_idle_gap_between_units() {
        let spb = 10u64;
        let mut generator = SimulationGenerator::new(&config(), SAMPLE_RATE).unwrap();
        // Exactly two units: value 0 then value 1
        generator.generate(31 * spb, SAMPLE_RATE);
        let capture = generator.capture();

        // Unit 0 (all-low data) ends with its forced-high stop edge at
        // idle(10) + start(1) + 8 data periods; unit 1's start edge follows
        // after the stop period plus the 10-period idle gap
        let edges = capture.edges();
        let stop_edge = edges
            .iter()
            .find(|e| e.level == BitLevel::High && e.position > 0)
            .unwrap();
        assert_eq!(stop_edge.position, 19 * spb);
        let next_start = edges
            .iter()
            .find(|e| e.level == BitLevel::Low && e.position > stop_edge.position)
            .unwrap();
        assert_eq!(next_start.position, 30 * spb);
    }

    #[test]
    fn test_unit_waveform_shape() {
        // 0x0F LSB-first: four high bits then four low bits
        let mut generator = SimulationGenerator::new(&config(), SAMPLE_RATE).unwrap();
        generator.append_unit(0x0F);
        let capture = generator.capture();
        let spb = 10;

        assert_eq!(
            capture.edges(),
            &[
                Edge::new(BitLevel::High, 0),
                Edge::new(BitLevel::Low, 10 * spb),  // start bit
                Edge::new(BitLevel::High, 11 * spb), // data bits 0..3 high
                Edge::new(BitLevel::Low, 15 * spb),  // data bits 4..7 low
                Edge::new(BitLevel::High, 19 * spb), // forced-high stop
            ]
        );
    }

    #[test]
    fn test_inverted_unit_waveform() {
        let mut config = config();
        config.inverted = true;
        let mut generator = SimulationGenerator::new(&config, SAMPLE_RATE).unwrap();
        // 0xFF inverted is all-zero bits: the line stays low from the start
        // bit through all data bits
        generator.append_unit(0xFF);
        let capture = generator.capture();
        let spb = 10;

        assert_eq!(
            capture.edges(),
            &[
                Edge::new(BitLevel::High, 0),
                Edge::new(BitLevel::Low, 10 * spb),
                Edge::new(BitLevel::High, 19 * spb),
            ]
        );
    }

    #[test]
    fn test_rejects_unexpressable_bit_rate() {
        let bad = SerialConfig {
            bit_rate: 2_000_000,
            ..Default::default()
        };
        assert!(SimulationGenerator::new(&bad, 1_000_000).is_err());
    }
}
