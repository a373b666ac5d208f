//! Thread-per-node scheduler for streaming graphs
//!
//! Spawns a dedicated thread for each node and manages its lifecycle. The
//! scheduler thread calls `work()` repeatedly; the shared stop signal is
//! checked between calls, so a node that processes one protocol frame per
//! `work()` call honors a stop request within one frame of latency.

use super::node::{ProcessNode, WorkError};
use super::ports::{InputPort, OutputPort};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Runtime scheduler that executes a streaming graph
pub struct Scheduler {
    threads: Vec<(String, JoinHandle<()>)>,
    stop_signal: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Self {
            threads: Vec::new(),
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a process node in its own thread
    pub fn start_process(
        &mut self,
        mut node: Box<dyn ProcessNode>,
        inputs: Vec<InputPort>,
        outputs: Vec<OutputPort>,
    ) {
        let stop_signal = Arc::clone(&self.stop_signal);
        let name = node.name().to_string();
        let thread_name = name.clone();

        debug!("Starting process node: {}", name);

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut items_produced = 0usize;

                loop {
                    // Cooperative cancellation point: once per work() call
                    if stop_signal.load(Ordering::Relaxed) || node.should_stop() {
                        break;
                    }

                    match node.work(&inputs, &outputs) {
                        Ok(n) => {
                            items_produced += n;
                        }
                        Err(WorkError::Shutdown) => {
                            debug!("[{}] End of stream", thread_name);
                            break;
                        }
                        Err(e) => {
                            error!("[{}] Work error: {}", thread_name, e);
                            break;
                        }
                    }
                }

                info!("[{}] Shutdown. Produced {} items.", thread_name, items_produced);

                // Drop outputs/inputs/node to close channels
                drop(outputs);
                drop(inputs);
                drop(node);
            })
            .expect("Failed to spawn node thread");

        self.threads.push((name, handle));
    }

    /// Signal all nodes to stop
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::Relaxed);
    }

    /// Wait for all node threads to complete
    pub fn wait(self) {
        let total_threads = self.threads.len();
        info!("Waiting for {} threads to complete...", total_threads);

        for (name, handle) in self.threads {
            match handle.join() {
                Ok(_) => debug!("[{}] Thread completed", name),
                Err(e) => error!("[{}] Thread panicked: {:?}", name, e),
            }
        }

        info!("All {} threads completed", total_threads);
    }

    /// Get the number of running threads
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Get the names of all running threads
    pub fn thread_names(&self) -> Vec<String> {
        self.threads.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::node::{ProcessNode, WorkError, WorkResult};
    use crate::runtime::sender::Sender;
    use crossbeam_channel::bounded;
    use std::sync::Mutex;
    use std::time::Duration;

    struct TestSource {
        count: usize,
        max: usize,
    }

    impl ProcessNode for TestSource {
        fn name(&self) -> &str {
            "test_source"
        }

        fn should_stop(&self) -> bool {
            self.count >= self.max
        }

        fn num_inputs(&self) -> usize {
            0
        }

        fn num_outputs(&self) -> usize {
            1
        }

        fn work(&mut self, _inputs: &[InputPort], outputs: &[OutputPort]) -> WorkResult<usize> {
            let output = outputs[0]
                .get::<u32>()
                .ok_or_else(|| WorkError::NodeError("Missing output channel".to_string()))?;

            if self.count < self.max {
                output.send(self.count as u32)?;
                self.count += 1;
                Ok(1)
            } else {
                Ok(0)
            }
        }
    }

    struct TestSink {
        received: Arc<Mutex<Vec<u32>>>,
    }

    impl ProcessNode for TestSink {
        fn name(&self) -> &str {
            "test_sink"
        }

        fn num_inputs(&self) -> usize {
            1
        }

        fn num_outputs(&self) -> usize {
            0
        }

        fn work(&mut self, inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
            let mut input_buffer = std::collections::VecDeque::new();
            let mut input = inputs[0]
                .get::<u32>(&mut input_buffer)
                .ok_or_else(|| WorkError::NodeError("Missing input channel".to_string()))?;

            match input.recv_timeout(Duration::from_millis(100)) {
                Ok(value) => {
                    self.received.lock().unwrap().push(value);
                    Ok(1)
                }
                Err(_) => Err(WorkError::Shutdown),
            }
        }
    }

    #[test]
    fn test_scheduler_basic() {
        let mut scheduler = Scheduler::new();

        let (tx, rx) = bounded(10);

        let source = TestSource { count: 0, max: 5 };
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = TestSink {
            received: Arc::clone(&received),
        };

        let source_outputs = vec![OutputPort::new(Sender::new(vec![tx]))];
        scheduler.start_process(Box::new(source), vec![], source_outputs);

        let sink_inputs = vec![InputPort::new::<u32>(rx)];
        scheduler.start_process(Box::new(sink), sink_inputs, vec![]);

        thread::sleep(Duration::from_millis(200));

        let values = received.lock().unwrap();
        assert_eq!(*values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_scheduler_stop_signal() {
        let mut scheduler = Scheduler::new();

        // A source with no cap keeps producing into an unconnected output
        let source = TestSource {
            count: 0,
            max: usize::MAX,
        };
        scheduler.start_process(
            Box::new(source),
            vec![],
            vec![OutputPort::new(Sender::<u32>::new(vec![]))],
        );

        thread::sleep(Duration::from_millis(50));
        scheduler.stop();

        let start = std::time::Instant::now();
        scheduler.wait();
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "Scheduler took too long to stop"
        );
    }
}
