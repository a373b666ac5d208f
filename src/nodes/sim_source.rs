//! Simulation source node
//!
//! Wraps the simulation waveform generator as a streaming source: each
//! `work()` call extends the synthetic signal by one chunk and sends the
//! newly produced edges downstream. The output closes once the configured
//! target sample is reached.

use crate::config::SerialConfig;
use crate::runtime::node::{InputPort, OutputPort, ProcessNode, WorkError, WorkResult};
use crate::runtime::ports::{PortDirection, PortSchema};
use crate::signal::Edge;
use crate::sim::SimulationGenerator;
use crate::HubError;
use tracing::debug;

/// Source node producing the generator's rolling-counter units.
pub struct SimulationSource {
    name: String,
    generator: SimulationGenerator,
    target_sample: u64,
    chunk_samples: u64,
    done: bool,
}

impl SimulationSource {
    /// Create a source generating until `target_sample`.
    pub fn new(
        config: &SerialConfig,
        sample_rate_hz: u32,
        target_sample: u64,
    ) -> Result<Self, HubError> {
        Ok(Self {
            name: "sim_source".to_string(),
            generator: SimulationGenerator::new(config, sample_rate_hz)?,
            target_sample,
            chunk_samples: 65_536,
            done: false,
        })
    }

    /// Set custom name (builder pattern)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ProcessNode for SimulationSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.done
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn output_schema(&self) -> Vec<PortSchema> {
        vec![PortSchema::new::<Edge>("serial", 0, PortDirection::Output)]
    }

    fn work(&mut self, _inputs: &[InputPort], outputs: &[OutputPort]) -> WorkResult<usize> {
        let output = outputs
            .first()
            .and_then(|port| port.get::<Edge>())
            .ok_or_else(|| WorkError::NodeError("Missing serial output".to_string()))?;

        let rate = self.generator.sample_rate_hz();
        let next_target = self
            .generator
            .current_sample()
            .saturating_add(self.chunk_samples)
            .min(self.target_sample);

        let edges = self.generator.generate(next_target, rate);
        for edge in &edges {
            output.send(*edge)?;
        }

        if self.generator.current_sample() >= self.target_sample {
            debug!(
                "simulation target {} reached at sample {}",
                self.target_sample,
                self.generator.current_sample()
            );
            output.close();
            self.done = true;
        }

        Ok(edges.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::unit::UnitReader;
    use crate::runtime::sender::{ChannelMessage, Sender};
    use crate::signal::Capture;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_sim_source_produces_decodable_units() {
        let config = SerialConfig {
            bit_rate: 9600,
            ..Default::default()
        };
        let mut source = SimulationSource::new(&config, 96_000, 10_000).unwrap();

        let (tx, rx) = unbounded();
        let outputs = vec![OutputPort::new(Sender::<Edge>::new(vec![tx]))];

        while !source.should_stop() {
            source.work(&[], &outputs).unwrap();
        }

        let mut edges = Vec::new();
        let mut closed = false;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                ChannelMessage::Item(edge) => edges.push(edge),
                ChannelMessage::EndOfStream => closed = true,
            }
        }
        assert!(closed, "output must close at the target");
        assert!(edges.first().unwrap().position == 0);

        // The streamed edges decode back to the rolling counter
        let capture = Capture::new(edges, 10_000 + 96_000);
        let reader = UnitReader::new(&config, 96_000).unwrap();
        let mut cursor = capture.cursor();
        for expected in 0..4u64 {
            assert_eq!(reader.read_unit(&mut cursor).unwrap().value, expected);
        }
    }
}
