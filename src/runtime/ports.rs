//! Port-based API for ergonomic node connections
//!
//! InputPort and OutputPort are type-erased wrappers for channel endpoints,
//! assembled by the [`Pipeline`](super::pipeline::Pipeline) builder.

use std::any::TypeId;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::AtomicBool;

use crossbeam_channel::Receiver as CrossbeamReceiver;

use super::receiver::Receiver;
use super::sender::{ChannelMessage, Sender};

/// Direction of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Schema describing a port's metadata
#[derive(Debug, Clone)]
pub struct PortSchema {
    pub name: String,
    pub type_id: TypeId,
    pub index: usize,
    pub direction: PortDirection,
}

impl PortSchema {
    /// Create a new port schema with type information
    pub fn new<T: 'static>(
        name: impl Into<String>,
        index: usize,
        direction: PortDirection,
    ) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            index,
            direction,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Type-erased port wrappers
// ────────────────────────────────────────────────────────────────────────────

/// Type-erased input port wrapping a crossbeam receiver.
///
/// Owns the persistent end-of-stream flag so EOS survives across `work()`
/// calls even though each call constructs a fresh [`Receiver`].
pub struct InputPort {
    channel: Box<dyn std::any::Any + Send>,
    eos: AtomicBool,
}

impl InputPort {
    /// Create a new InputPort over a typed crossbeam receiver.
    pub fn new<T: Send + 'static>(receiver: CrossbeamReceiver<ChannelMessage<T>>) -> Self {
        Self {
            channel: Box::new(receiver),
            eos: AtomicBool::new(false),
        }
    }

    /// Create from type-erased box (for internal use by Pipeline).
    pub(crate) fn from_type_erased(channel: Box<dyn std::any::Any + Send>) -> Self {
        Self {
            channel,
            eos: AtomicBool::new(false),
        }
    }

    /// Get a [`Receiver`] over this port.
    ///
    /// The putback buffer is caller-owned so it can persist across `work()`
    /// calls in the node's own state.
    ///
    /// Returns None if the port doesn't carry items of type `T`.
    pub fn get<'a, T: Send + 'static>(
        &'a self,
        buffer: &'a mut VecDeque<T>,
    ) -> Option<Receiver<'a, T>> {
        let receiver = self
            .channel
            .downcast_ref::<CrossbeamReceiver<ChannelMessage<T>>>()?;
        Some(Receiver::new(receiver, buffer, &self.eos))
    }
}

/// Type-erased output port wrapping a broadcast [`Sender`].
pub struct OutputPort {
    channel: Box<dyn std::any::Any + Send>,
}

impl OutputPort {
    /// Create a new OutputPort over a typed sender.
    pub fn new<T: Send + Clone + 'static>(sender: Sender<T>) -> Self {
        Self {
            channel: Box::new(sender),
        }
    }

    /// Create from type-erased box (for internal use by Pipeline).
    pub(crate) fn from_type_erased(channel: Box<dyn std::any::Any + Send>) -> Self {
        Self { channel }
    }

    /// Get a Sender for this port (cheaply cloned from internal storage).
    ///
    /// Returns None if the port doesn't carry items of type `T`, in
    /// particular for unconnected optional outputs, which are backed by a
    /// dummy payload.
    pub fn get<T: Send + Clone + 'static>(&self) -> Option<Sender<T>> {
        self.channel.downcast_ref::<Sender<T>>().cloned()
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "OutputPort")
    }
}
