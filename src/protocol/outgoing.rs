//! Outgoing message builder.
//!
//! Turns `(cmd, args, frames)` into the event sequence put on the wire:
//! one JSON header event followed by each frame, in order.

use serde::Serialize;
use serde_json::Value;

use super::{collect_frames, Frame, Header, RequestId};
use crate::codec::JsonCodec;
use crate::error::{AmError, Result};

/// A validated message waiting for its request id.
///
/// Validation happens in [`OutgoingMessage::new`], so a value of this type
/// can always be turned into events.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    cmd: String,
    args: Value,
    frames: Vec<Frame>,
    max_frames: u32,
}

impl OutgoingMessage {
    /// Validate a message.
    ///
    /// Fails if any frame element is not text or binary, if `args` cannot be
    /// serialized, or if the header would be invalid.
    pub fn new<A, I, T>(cmd: &str, args: &A, frames: I, max_frames: u32) -> Result<Self>
    where
        A: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
        T: TryInto<Frame>,
        T::Error: Into<AmError>,
    {
        let frames = collect_frames(frames)?;
        let args = JsonCodec::to_value(args)?;
        let frame_count = u32::try_from(frames.len()).unwrap_or(u32::MAX);

        // Id 1 stands in for the real one, which is only allocated once the
        // message is known to be sendable.
        Header::new(cmd, frame_count, 1, Value::Null).validate(max_frames)?;

        Ok(Self {
            cmd: cmd.to_string(),
            args,
            frames,
            max_frames,
        })
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Build the header for `request` and serialize the full event list.
    pub fn into_events(self, request: RequestId) -> Result<Vec<Frame>> {
        let header = Header::new(self.cmd, self.frames.len() as u32, request, self.args);
        header.validate(self.max_frames)?;

        let mut events = Vec::with_capacity(1 + self.frames.len());
        events.push(Frame::Text(header.encode()?));
        events.extend(self.frames);
        Ok(events)
    }
}
