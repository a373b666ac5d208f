//! Single-unit decode
//!
//! The inverse of the simulation generator's per-unit framing: seek a start
//! edge, sample the data bits in the configured order, undo inversion,
//! check the parity bit and the first stop bit. Where the frame decoder
//! consumes continuous byte bursts, this reader consumes one framed unit
//! per call. It is the path that closes the encode/decode round trip for
//! arbitrary bit counts, orders, parity and inversion.

use crate::config::{FramingMode, ParityMode, SerialConfig};
use crate::decode::bits::{low_bits_mask, parity_bit, BitOrder, WordBuilder};
use crate::runtime::errors::WorkResult;
use crate::signal::{BitLevel, SignalCursor};
use crate::HubError;

/// One decoded transfer unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedUnit {
    /// Data value, inversion undone, address bit stripped
    pub value: u64,
    /// Sample of the first data-bit center
    pub start_sample: u64,
    /// Last sample of the unit's data/parity span
    pub end_sample: u64,
    /// Multi-drop address/data indicator bit, when configured
    pub address_bit: Option<bool>,
    /// Parity bit disagreed with the sampled data
    pub parity_error: bool,
    /// First stop bit was not at idle level
    pub framing_error: bool,
}

/// Reads generator-framed units off a sampled waveform.
pub struct UnitReader {
    samples_per_bit: u64,
    samples_to_first_center: u64,
    bits_per_unit: u8,
    num_bits: u8,
    order: BitOrder,
    parity: ParityMode,
    inverted: bool,
}

impl UnitReader {
    /// Build a reader for a configuration and capture sample rate.
    pub fn new(config: &SerialConfig, sample_rate_hz: u32) -> Result<Self, HubError> {
        let timing = config.bit_timing(sample_rate_hz)?;
        let extra = u8::from(config.framing == FramingMode::MultiDrop);
        Ok(Self {
            samples_per_bit: timing.samples_per_bit,
            samples_to_first_center: timing.samples_to_first_center,
            bits_per_unit: config.bits_per_unit,
            num_bits: config.bits_per_unit + extra,
            order: config.bit_order,
            parity: config.parity,
            inverted: config.inverted,
        })
    }

    /// Decode the next unit: seek its start edge, sample the bits, verify
    /// parity and stop framing.
    pub fn read_unit<S: SignalCursor>(&self, signal: &mut S) -> WorkResult<DecodedUnit> {
        // Start-bit edge, then offset to the first data-bit center
        signal.advance_to_next_edge()?;
        signal.advance(self.samples_to_first_center)?;
        let start_sample = signal.current_sample();

        let mut builder = WordBuilder::new(self.num_bits, self.order);
        for _ in 0..self.num_bits {
            builder.add_bit(signal.current_level());
            signal.advance(self.samples_per_bit)?;
        }
        // The value as transmitted (still inverted if the line is inverted)
        let wire_value = builder.value();

        let mut parity_error = false;
        if self.parity != ParityMode::None {
            let sampled = signal.current_level();
            // Parity is computed over the transmitted bits, so it is checked
            // against the wire value before inversion is undone
            let expected = parity_bit(wire_value, self.parity).expect("parity mode checked above");
            parity_error = sampled != expected;
            signal.advance(self.samples_per_bit)?;
        }

        // The cursor now sits at the center of the first stop bit
        let framing_error = signal.current_level() != BitLevel::High;
        let end_sample = signal.current_sample().saturating_sub(1);

        let recovered = if self.inverted {
            !wire_value & low_bits_mask(self.num_bits)
        } else {
            wire_value
        };

        let (value, address_bit) = if self.num_bits > self.bits_per_unit {
            (
                recovered & low_bits_mask(self.bits_per_unit),
                Some((recovered >> self.bits_per_unit) & 1 == 1),
            )
        } else {
            (recovered, None)
        };

        Ok(DecodedUnit {
            value,
            start_sample,
            end_sample,
            address_bit,
            parity_error,
            framing_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulationGenerator;

    const SAMPLE_RATE: u32 = 96_000;

    fn config(f: impl FnOnce(&mut SerialConfig)) -> SerialConfig {
        let mut config = SerialConfig {
            bit_rate: 9600,
            ..Default::default()
        };
        f(&mut config);
        config
    }

    /// Encode the given values as units, then decode them back.
    fn round_trip(config: &SerialConfig, values: &[u64]) -> Vec<DecodedUnit> {
        let mut generator = SimulationGenerator::new(config, SAMPLE_RATE).unwrap();
        for &v in values {
            generator.append_unit(v);
        }
        let capture = generator.capture();
        let reader = UnitReader::new(config, SAMPLE_RATE).unwrap();
        let mut cursor = capture.cursor();
        values
            .iter()
            .map(|_| reader.read_unit(&mut cursor).unwrap())
            .collect()
    }

    #[test]
    fn test_round_trip_all_byte_values_lsb_first() {
        let config = config(|_| {});
        let values: Vec<u64> = (0..=255).collect();
        let decoded = round_trip(&config, &values);
        for (expected, unit) in values.iter().zip(&decoded) {
            assert_eq!(unit.value, *expected);
            assert!(!unit.parity_error);
            assert!(!unit.framing_error);
        }
    }

    #[test]
    fn test_round_trip_msb_first() {
        let config = config(|c| c.bit_order = BitOrder::MsbFirst);
        let values = [0x00u64, 0x01, 0x6A, 0x81, 0xA5, 0xFF];
        let decoded = round_trip(&config, &values);
        for (expected, unit) in values.iter().zip(&decoded) {
            assert_eq!(unit.value, *expected);
        }
    }

    #[test]
    fn test_mismatched_orders_only_agree_on_palindromes() {
        let encode_config = config(|_| {}); // LSB-first
        let decode_config = config(|c| c.bit_order = BitOrder::MsbFirst);

        let mut generator = SimulationGenerator::new(&encode_config, SAMPLE_RATE).unwrap();
        for v in [0x6Au64, 0x81, 0xFF, 0x00] {
            generator.append_unit(v);
        }
        let capture = generator.capture();
        let reader = UnitReader::new(&decode_config, SAMPLE_RATE).unwrap();
        let mut cursor = capture.cursor();

        // 0x6A bit-reverses to 0x56: the orders must not accidentally agree
        assert_eq!(reader.read_unit(&mut cursor).unwrap().value, 0x56);
        // Palindromic bit patterns survive the mismatch
        assert_eq!(reader.read_unit(&mut cursor).unwrap().value, 0x81);
        assert_eq!(reader.read_unit(&mut cursor).unwrap().value, 0xFF);
        assert_eq!(reader.read_unit(&mut cursor).unwrap().value, 0x00);
    }

    #[test]
    fn test_round_trip_inverted() {
        let config = config(|c| c.inverted = true);
        let values = [0x00u64, 0x42, 0xFF];
        let decoded = round_trip(&config, &values);
        for (expected, unit) in values.iter().zip(&decoded) {
            assert_eq!(unit.value, *expected);
        }
    }

    #[test]
    fn test_round_trip_with_parity() {
        for parity in [ParityMode::Even, ParityMode::Odd] {
            let config = config(|c| c.parity = parity);
            let values: Vec<u64> = (0..32).collect();
            let decoded = round_trip(&config, &values);
            for (expected, unit) in values.iter().zip(&decoded) {
                assert_eq!(unit.value, *expected);
                assert!(!unit.parity_error, "parity flagged for {:#04x}", expected);
                assert!(!unit.framing_error);
            }
        }
    }

    #[test]
    fn test_round_trip_inverted_with_parity() {
        let config = config(|c| {
            c.inverted = true;
            c.parity = ParityMode::Even;
        });
        let values = [0x07u64, 0x1C, 0xE3];
        for (expected, unit) in values.iter().zip(&round_trip(&config, &values)) {
            assert_eq!(unit.value, *expected);
            assert!(!unit.parity_error);
        }
    }

    #[test]
    fn test_corrupted_parity_bit_is_flagged() {
        use crate::signal::SyntheticSignal;

        let config = config(|c| c.parity = ParityMode::Even);
        // Hand-build a unit of 0x07 (three set bits -> parity bit must be
        // high) with a deliberately wrong low parity bit
        let spb = 10;
        let mut signal = SyntheticSignal::new(BitLevel::High);
        signal.advance(10 * spb);
        signal.transition(); // start bit
        signal.advance(spb);
        for bit in [1u8, 1, 1, 0, 0, 0, 0, 0] {
            signal.transition_if_needed(if bit == 1 { BitLevel::High } else { BitLevel::Low });
            signal.advance(spb);
        }
        signal.transition_if_needed(BitLevel::Low); // wrong parity level
        signal.advance(spb);
        signal.transition_if_needed(BitLevel::High); // stop
        signal.advance(4 * spb);

        let reader = UnitReader::new(&config, SAMPLE_RATE).unwrap();
        let binding = signal.capture();
        let mut cursor = binding.cursor();
        let unit = reader.read_unit(&mut cursor).unwrap();
        assert_eq!(unit.value, 0x07);
        assert!(unit.parity_error);
        assert!(!unit.framing_error);
    }

    #[test]
    fn test_multi_drop_address_bit() {
        let config = config(|c| c.framing = FramingMode::MultiDrop);
        // Bit 8 of the unit value is the address indicator
        let decoded = round_trip(&config, &[0x1AA, 0x055]);
        assert_eq!(decoded[0].value, 0xAA);
        assert_eq!(decoded[0].address_bit, Some(true));
        assert_eq!(decoded[1].value, 0x55);
        assert_eq!(decoded[1].address_bit, Some(false));
    }

    #[test]
    fn test_narrow_unit_width() {
        let config = config(|c| c.bits_per_unit = 5);
        let values = [0x00u64, 0x0B, 0x1F];
        for (expected, unit) in values.iter().zip(&round_trip(&config, &values)) {
            assert_eq!(unit.value, *expected);
        }
    }

    #[test]
    fn test_unit_sample_spans_monotonic() {
        let config = config(|_| {});
        let decoded = round_trip(&config, &[1, 2, 3, 4]);
        for pair in decoded.windows(2) {
            assert!(pair[1].start_sample > pair[0].end_sample);
        }
    }
}
