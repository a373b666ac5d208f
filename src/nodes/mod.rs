//! Streaming nodes for the pipeline runtime
//!
//! - Sources produce [`Edge`](crate::signal::Edge) streams: a recorded
//!   capture ([`CaptureSource`]) or the simulation generator
//!   ([`SimulationSource`]).
//! - [`HubDecoder`] consumes an edge stream and emits data records, bit
//!   markers and decoded frames, one frame per `work()` call.

pub mod capture_source;
pub mod decoder;
pub mod sim_source;

pub use capture_source::CaptureSource;
pub use decoder::HubDecoder;
pub use sim_source::SimulationSource;
