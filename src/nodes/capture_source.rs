//! Capture playback source
//!
//! Streams a recorded capture's edges to downstream consumers, closing the
//! output when the capture is exhausted.

use crate::runtime::node::{InputPort, OutputPort, ProcessNode, WorkError, WorkResult};
use crate::runtime::ports::{PortDirection, PortSchema};
use crate::signal::{Capture, Edge};
use tracing::debug;

/// Source node that replays an owned [`Capture`] as an edge stream.
pub struct CaptureSource {
    name: String,
    edges: Vec<Edge>,
    index: usize,
    batch: usize,
    done: bool,
}

impl CaptureSource {
    /// Create a source over a capture snapshot.
    pub fn new(capture: &Capture) -> Self {
        Self {
            name: "capture_source".to_string(),
            edges: capture.edges().to_vec(),
            index: 0,
            batch: 1024,
            done: false,
        }
    }

    /// Set custom name (builder pattern)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ProcessNode for CaptureSource {
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

        if self.index >= self.edges.len() {
            debug!("capture exhausted after {} edges", self.index);
            output.close();
            self.done = true;
            return Err(WorkError::Shutdown);
        }

        let end = (self.index + self.batch).min(self.edges.len());
        for edge in &self.edges[self.index..end] {
            output.send(*edge)?;
        }
        let sent = end - self.index;
        self.index = end;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::sender::{ChannelMessage, Sender};
    use crate::signal::BitLevel;
    use crossbeam_channel::bounded;

    #[test]
    fn test_capture_source_streams_all_edges() {
        let capture = Capture::new(
            vec![
                Edge::new(BitLevel::High, 0),
                Edge::new(BitLevel::Low, 50),
                Edge::new(BitLevel::High, 80),
            ],
            200,
        );
        let mut source = CaptureSource::new(&capture);

        let (tx, rx) = bounded(16);
        let outputs = vec![OutputPort::new(Sender::<Edge>::new(vec![tx]))];

        assert_eq!(source.work(&[], &outputs).unwrap(), 3);
        assert!(!source.should_stop());
        assert!(matches!(
            source.work(&[], &outputs),
            Err(WorkError::Shutdown)
        ));
        assert!(source.should_stop());

        let mut received = Vec::new();
        while let Ok(ChannelMessage::Item(edge)) = rx.try_recv() {
            received.push(edge);
        }
        assert_eq!(received, capture.edges());
    }
}
