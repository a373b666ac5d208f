//! Analyzer configuration
//!
//! [`SerialConfig`] is a plain value struct supplied once per decode or
//! generation run; it is never mutated mid-run. The text settings archive
//! is a line-based `key = value` format led by a schema name that must
//! match before any field is accepted.

use crate::decode::bits::BitOrder;
use crate::HubError;
use std::fmt::Write as _;
use tracing::warn;

/// Schema name leading every settings archive produced by this analyzer.
pub const SETTINGS_SCHEMA: &str = "RhspSerialAnalyzer";

/// Configurable bit-rate bounds, in bits per second.
pub const MIN_BIT_RATE: u32 = 1;
pub const MAX_BIT_RATE: u32 = 100_000_000;

/// Parity bit handling for simulated and unit-decoded transfers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParityMode {
    None,
    Even,
    Odd,
}

impl ParityMode {
    fn as_str(self) -> &'static str {
        match self {
            ParityMode::None => "none",
            ParityMode::Even => "even",
            ParityMode::Odd => "odd",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(ParityMode::None),
            "even" => Some(ParityMode::Even),
            "odd" => Some(ParityMode::Odd),
            _ => None,
        }
    }
}

/// Unit framing mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramingMode {
    /// Plain start/data/stop framing
    Normal,
    /// Multi-drop bus framing: one address/data indicator bit follows the
    /// data bits of each unit
    MultiDrop,
}

impl FramingMode {
    fn as_str(self) -> &'static str {
        match self {
            FramingMode::Normal => "normal",
            FramingMode::MultiDrop => "multi-drop",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(FramingMode::Normal),
            "multi-drop" => Some(FramingMode::MultiDrop),
            _ => None,
        }
    }
}

impl BitOrder {
    fn as_str(self) -> &'static str {
        match self {
            BitOrder::LsbFirst => "lsb-first",
            BitOrder::MsbFirst => "msb-first",
        }
    }

    fn parse_setting(s: &str) -> Option<Self> {
        match s {
            "lsb-first" => Some(BitOrder::LsbFirst),
            "msb-first" => Some(BitOrder::MsbFirst),
            _ => None,
        }
    }
}

/// Derived per-run bit timing.
///
/// `samples_per_bit` uses the same integer division the decode loop paces
/// itself by; `samples_to_first_center` is the start-edge-to-first-data-bit
/// offset of 1.5 bit periods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitTiming {
    pub samples_per_bit: u64,
    pub samples_to_first_center: u64,
}

/// Complete analyzer configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SerialConfig {
    /// Input channel index on the capture device
    pub input_channel: usize,
    /// Bit rate in bits per second
    pub bit_rate: u32,
    /// Data bits per simulated/unit-decoded transfer
    pub bits_per_unit: u8,
    /// Transmission order of data bits
    pub bit_order: BitOrder,
    /// Parity bit mode
    pub parity: ParityMode,
    /// Stop-bit count in bit periods (1.0, 1.5, 2.0, ...)
    pub stop_bits: f64,
    /// Whether the signal is logically inverted
    pub inverted: bool,
    /// Unit framing mode
    pub framing: FramingMode,
    /// Whether the bit-rate rerun advisor may trigger a redecode
    pub auto_baud: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            input_channel: 0,
            bit_rate: 460_800,
            bits_per_unit: 8,
            bit_order: BitOrder::LsbFirst,
            parity: ParityMode::None,
            stop_bits: 1.0,
            inverted: false,
            framing: FramingMode::Normal,
            auto_baud: false,
        }
    }
}

impl SerialConfig {
    /// Check field ranges. Misconfiguration is fatal: decode never proceeds
    /// with corrupted parameters.
    pub fn validate(&self) -> Result<(), HubError> {
        if !(MIN_BIT_RATE..=MAX_BIT_RATE).contains(&self.bit_rate) {
            return Err(HubError::Config(format!(
                "bit rate {} outside [{}, {}]",
                self.bit_rate, MIN_BIT_RATE, MAX_BIT_RATE
            )));
        }
        if !(1..=64).contains(&self.bits_per_unit) {
            return Err(HubError::Config(format!(
                "bits per unit {} outside [1, 64]",
                self.bits_per_unit
            )));
        }
        if self.framing == FramingMode::MultiDrop && self.bits_per_unit >= 64 {
            return Err(HubError::Config(
                "multi-drop framing needs room for the address bit".to_string(),
            ));
        }
        if !self.stop_bits.is_finite() || self.stop_bits <= 0.0 {
            return Err(HubError::Config(format!(
                "stop bits {} must be positive",
                self.stop_bits
            )));
        }
        Ok(())
    }

    /// Derive bit timing for a sample rate, rejecting rates the timing
    /// cannot be recovered at.
    pub fn bit_timing(&self, sample_rate_hz: u32) -> Result<BitTiming, HubError> {
        self.validate()?;
        if sample_rate_hz == 0 {
            return Err(HubError::Config("sample rate is zero".to_string()));
        }
        let samples_per_bit = u64::from(sample_rate_hz) / u64::from(self.bit_rate);
        if samples_per_bit == 0 {
            return Err(HubError::Config(format!(
                "bit rate {} exceeds sample rate {}",
                self.bit_rate, sample_rate_hz
            )));
        }
        if sample_rate_hz < self.minimum_sample_rate_hz() {
            warn!(
                "sample rate {} Hz is below the recommended minimum {} Hz for bit rate {}",
                sample_rate_hz,
                self.minimum_sample_rate_hz(),
                self.bit_rate
            );
        }
        let samples_to_first_center =
            (1.5 * f64::from(sample_rate_hz) / f64::from(self.bit_rate)).round() as u64;
        Ok(BitTiming {
            samples_per_bit,
            samples_to_first_center,
        })
    }

    /// Sampling rate needed to reliably recover bit timing.
    pub fn minimum_sample_rate_hz(&self) -> u32 {
        self.bit_rate.saturating_mul(4)
    }

    /// Serialize to the settings archive format.
    pub fn save_settings(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "analyzer = {}", SETTINGS_SCHEMA);
        let _ = writeln!(out, "input channel = {}", self.input_channel);
        let _ = writeln!(out, "bit rate = {}", self.bit_rate);
        let _ = writeln!(out, "bits per unit = {}", self.bits_per_unit);
        let _ = writeln!(out, "bit order = {}", self.bit_order.as_str());
        let _ = writeln!(out, "parity = {}", self.parity.as_str());
        let _ = writeln!(out, "stop bits = {}", self.stop_bits);
        let _ = writeln!(out, "inverted = {}", self.inverted);
        let _ = writeln!(out, "framing = {}", self.framing.as_str());
        let _ = writeln!(out, "auto baud = {}", self.auto_baud);
        out
    }

    /// Parse a settings archive, rejecting archives belonging to another
    /// analyzer.
    pub fn load_settings(settings: &str) -> Result<Self, HubError> {
        let mut lines = settings.lines().map(str::trim).filter(|l| !l.is_empty());

        let schema = lines
            .next()
            .and_then(|l| l.strip_prefix("analyzer = "))
            .ok_or_else(|| HubError::MissingField("analyzer".to_string()))?;
        if schema != SETTINGS_SCHEMA {
            return Err(HubError::SchemaMismatch {
                expected: SETTINGS_SCHEMA.to_string(),
                found: schema.to_string(),
            });
        }

        let mut config = SerialConfig::default();
        let mut saw_channel = false;
        let mut saw_bit_rate = false;

        for line in lines {
            if let Some(value) = line.strip_prefix("input channel = ") {
                config.input_channel = value
                    .parse()
                    .map_err(|_| HubError::ParseError(format!("input channel: {}", value)))?;
                saw_channel = true;
            } else if let Some(value) = line.strip_prefix("bit rate = ") {
                config.bit_rate = value
                    .parse()
                    .map_err(|_| HubError::ParseError(format!("bit rate: {}", value)))?;
                saw_bit_rate = true;
            } else if let Some(value) = line.strip_prefix("bits per unit = ") {
                config.bits_per_unit = value
                    .parse()
                    .map_err(|_| HubError::ParseError(format!("bits per unit: {}", value)))?;
            } else if let Some(value) = line.strip_prefix("bit order = ") {
                config.bit_order = BitOrder::parse_setting(value)
                    .ok_or_else(|| HubError::ParseError(format!("bit order: {}", value)))?;
            } else if let Some(value) = line.strip_prefix("parity = ") {
                config.parity = ParityMode::parse(value)
                    .ok_or_else(|| HubError::ParseError(format!("parity: {}", value)))?;
            } else if let Some(value) = line.strip_prefix("stop bits = ") {
                config.stop_bits = value
                    .parse()
                    .map_err(|_| HubError::ParseError(format!("stop bits: {}", value)))?;
            } else if let Some(value) = line.strip_prefix("inverted = ") {
                config.inverted = value
                    .parse()
                    .map_err(|_| HubError::ParseError(format!("inverted: {}", value)))?;
            } else if let Some(value) = line.strip_prefix("framing = ") {
                config.framing = FramingMode::parse(value)
                    .ok_or_else(|| HubError::ParseError(format!("framing: {}", value)))?;
            } else if let Some(value) = line.strip_prefix("auto baud = ") {
                config.auto_baud = value
                    .parse()
                    .map_err(|_| HubError::ParseError(format!("auto baud: {}", value)))?;
            }
        }

        if !saw_channel {
            return Err(HubError::MissingField("input channel".to_string()));
        }
        if !saw_bit_rate {
            return Err(HubError::MissingField("bit rate".to_string()));
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SerialConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bit_rate, 460_800);
        assert_eq!(config.bits_per_unit, 8);
        assert_eq!(config.bit_order, BitOrder::LsbFirst);
        assert!(!config.auto_baud);
    }

    #[test]
    fn test_zero_bit_rate_rejected() {
        let config = SerialConfig {
            bit_rate: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HubError::Config(_))));
        assert!(matches!(config.bit_timing(1_000_000), Err(HubError::Config(_))));
    }

    #[test]
    fn test_bit_rate_above_sample_rate_rejected() {
        let config = SerialConfig {
            bit_rate: 2_000_000,
            ..Default::default()
        };
        // samples_per_bit would truncate to zero
        assert!(matches!(config.bit_timing(1_000_000), Err(HubError::Config(_))));
    }

    #[test]
    fn test_bit_timing_derivation() {
        let config = SerialConfig {
            bit_rate: 9600,
            ..Default::default()
        };
        let timing = config.bit_timing(96_000).unwrap();
        assert_eq!(timing.samples_per_bit, 10);
        assert_eq!(timing.samples_to_first_center, 15);
    }

    #[test]
    fn test_minimum_sample_rate() {
        let config = SerialConfig {
            bit_rate: 9600,
            ..Default::default()
        };
        assert_eq!(config.minimum_sample_rate_hz(), 38_400);
    }

    #[test]
    fn test_settings_round_trip() {
        let config = SerialConfig {
            input_channel: 3,
            bit_rate: 115_200,
            bits_per_unit: 7,
            bit_order: BitOrder::MsbFirst,
            parity: ParityMode::Odd,
            stop_bits: 1.5,
            inverted: true,
            framing: FramingMode::MultiDrop,
            auto_baud: true,
        };
        let archive = config.save_settings();
        let loaded = SerialConfig::load_settings(&archive).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_settings_schema_mismatch_is_fatal() {
        let archive = "analyzer = SomeOtherAnalyzer\ninput channel = 0\nbit rate = 9600\n";
        assert!(matches!(
            SerialConfig::load_settings(archive),
            Err(HubError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_settings_missing_required_field() {
        let archive = format!("analyzer = {}\nbit rate = 9600\n", SETTINGS_SCHEMA);
        assert!(matches!(
            SerialConfig::load_settings(&archive),
            Err(HubError::MissingField(_))
        ));
    }

    #[test]
    fn test_settings_bad_value() {
        let archive = format!(
            "analyzer = {}\ninput channel = 0\nbit rate = fast\n",
            SETTINGS_SCHEMA
        );
        assert!(matches!(
            SerialConfig::load_settings(&archive),
            Err(HubError::ParseError(_))
        ));
    }
}
