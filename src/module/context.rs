//! Responder passed to module command handlers.
//!
//! Provides methods for answering the request being handled:
//! - `reply` - send a message carrying the request id
//! - `print` - send a diagnostic line
//!
//! # Example
//!
//! ```ignore
//! fn floatsum(msg: &LogicalMessage, responder: &Responder<'_>) -> Result<()> {
//!     let sum: f32 = msg.frame(0).and_then(Frame::to_f32s).unwrap_or_default().iter().sum();
//!     responder.reply("floatsum", &json!({ "sum": sum }), Vec::<Frame>::new())
//! }
//! ```

use serde::Serialize;

use crate::error::{AmError, Result};
use crate::protocol::{encode_diagnostic, Frame, OutgoingMessage, RequestId};
use crate::transport::Transport;

/// Context passed to command handlers on the module side.
pub struct Responder<'a> {
    /// Transport back to the host.
    transport: &'a dyn Transport,
    /// Request id of the message being handled.
    request_id: RequestId,
    /// Frame limit for replies.
    max_frames: u32,
}

impl<'a> Responder<'a> {
    pub(crate) fn new(transport: &'a dyn Transport, request_id: RequestId, max_frames: u32) -> Self {
        Self {
            transport,
            request_id,
            max_frames,
        }
    }

    /// Request id replies will carry.
    #[inline]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Send a reply for the current request.
    pub fn reply<A, I, T>(&self, cmd: &str, args: &A, frames: I) -> Result<()>
    where
        A: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
        T: TryInto<Frame>,
        T::Error: Into<AmError>,
    {
        let message = OutgoingMessage::new(cmd, args, frames, self.max_frames)?;
        send_events(self.transport, message.into_events(self.request_id)?)
    }

    /// Send a diagnostic line to the host.
    pub fn print(&self, text: &str) -> Result<()> {
        print_to(self.transport, text)
    }
}

/// Emit a diagnostic line on `transport`.
pub(crate) fn print_to(transport: &dyn Transport, text: &str) -> Result<()> {
    if !transport.is_available() {
        return Err(AmError::TransportUnavailable);
    }
    transport.emit(Frame::Text(encode_diagnostic(text)?))
}

pub(crate) fn send_events(transport: &dyn Transport, events: Vec<Frame>) -> Result<()> {
    if !transport.is_available() {
        return Err(AmError::TransportUnavailable);
    }
    transport.emit_message(events)
}
