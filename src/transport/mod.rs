//! Transport module - delivery of whole text/binary events.
//!
//! The message layer only needs two things from a transport: a way to emit
//! an event to the remote side, and a way to tell whether the remote side
//! is attached at all. Inbound events are pushed by the adapter into the
//! connection's [`InboundSink`](crate::connection::InboundSink).
//!
//! Provided adapters:
//! - [`ChannelTransport`] - in-memory, backed by a tokio channel
//! - [`StreamTransport`] - tag + length prefixed events over any byte stream

mod channel;
mod stream;

pub use channel::{channel, ChannelTransport, EventReceiver};
pub use stream::{
    encode_event, spawn_reader, EventBuffer, StreamTransport, DEFAULT_MAX_EVENT_SIZE,
    EVENT_HEADER_SIZE, TAG_BINARY, TAG_TEXT,
};

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::Frame;

/// Outbound side of an event transport.
///
/// Events emitted through one transport must reach the remote side in the
/// order they were handed over.
pub trait Transport: Send + Sync + 'static {
    /// Whether the remote endpoint is currently attached.
    fn is_available(&self) -> bool;

    /// Hand one event to the transport.
    fn emit(&self, event: Frame) -> Result<()>;

    /// Hand over all events of one logical message.
    ///
    /// Either every event is accepted or none is: on `Err` nothing of the
    /// message may have reached the remote side.
    fn emit_message(&self, events: Vec<Frame>) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn emit(&self, event: Frame) -> Result<()> {
        (**self).emit(event)
    }

    fn emit_message(&self, events: Vec<Frame>) -> Result<()> {
        (**self).emit_message(events)
    }
}
