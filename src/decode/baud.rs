//! Bit-rate auto-detect / rerun advisor
//!
//! A pure function of the accumulated shortest-pulse statistic and the
//! current configuration: infer the actual bit rate from the narrowest
//! pulse seen on the signal and decide whether the configured rate is wrong
//! enough to warrant a full redecode. The caller applies a returned
//! correction only between decode runs, never mid-frame.

use crate::config::SerialConfig;
use crate::HubError;
use tracing::debug;

/// Relative error beyond which the configured bit rate is considered wrong.
const RERUN_ERROR_THRESHOLD: f64 = 0.1;

/// Advisor verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RerunDecision {
    /// The configured bit rate is trustworthy (or the signal is not)
    NoRerun,
    /// Redecode from the start with the corrected bit rate
    Rerun { corrected_bit_rate: u32 },
}

impl RerunDecision {
    /// Apply a correction to the configuration. Returns true when the
    /// configuration changed and the decode must restart.
    pub fn apply(&self, config: &mut SerialConfig) -> bool {
        match self {
            RerunDecision::Rerun { corrected_bit_rate } => {
                config.bit_rate = *corrected_bit_rate;
                true
            }
            RerunDecision::NoRerun => false,
        }
    }
}

/// Decide whether a decode should rerun with a corrected bit rate.
///
/// `shortest_pulse` is the narrowest pulse width observed on the signal so
/// far, in samples. Zero means the signal never transitioned, which a
/// completed decode cannot produce; that is an internal invariant
/// violation, reported as an error rather than silently divided by.
pub fn evaluate(
    config: &SerialConfig,
    sample_rate_hz: u32,
    shortest_pulse: u64,
) -> Result<RerunDecision, HubError> {
    if shortest_pulse == 0 {
        debug_assert!(false, "shortest pulse width was 0");
        return Err(HubError::Timing(
            "shortest pulse width is zero; the signal never transitioned".to_string(),
        ));
    }

    let implied_bit_rate = (f64::from(sample_rate_hz) / shortest_pulse as f64).round() as u32;

    if implied_bit_rate > sample_rate_hz {
        debug_assert!(false, "implied bit rate above sample rate");
        return Err(HubError::Timing(format!(
            "implied bit rate {} exceeds sample rate {}",
            implied_bit_rate, sample_rate_hz
        )));
    }

    // Pulses narrower than 4 samples per bit are too close to the sampling
    // limit to trust as a timing reference
    if implied_bit_rate > sample_rate_hz / 4 {
        return Ok(RerunDecision::NoRerun);
    }
    if implied_bit_rate == 0 {
        return Ok(RerunDecision::NoRerun);
    }

    let error = (f64::from(implied_bit_rate) - f64::from(config.bit_rate)).abs()
        / f64::from(config.bit_rate);
    debug!(
        "implied bit rate {} vs configured {} (error {:.1}%)",
        implied_bit_rate,
        config.bit_rate,
        error * 100.0
    );

    if error > RERUN_ERROR_THRESHOLD {
        Ok(RerunDecision::Rerun {
            corrected_bit_rate: implied_bit_rate,
        })
    } else {
        Ok(RerunDecision::NoRerun)
    }
}
