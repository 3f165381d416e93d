//! Message assembler - rebuilds logical messages from transport events.
//!
//! Implements a three-state machine:
//! - `AwaitingHeader`: the next text event is parsed as a JSON header
//! - `CollectingFrames`: header accepted, `remaining` more events belong to it
//! - `Skipping`: header declared more frames than allowed, `remaining` more
//!   events belong to it and are discarded
//!
//! Exactly one event is processed per [`MessageAssembler::push`]. A header
//! declaring zero frames completes within the same call.
//!
//! # Example
//!
//! ```
//! use amlink::protocol::{Assembled, Frame, MessageAssembler};
//!
//! let mut assembler = MessageAssembler::new();
//!
//! let header = Frame::from(r#"{"cmd":"floatsum","frames":1,"request":1}"#);
//! assert!(assembler.push(header).is_none());
//!
//! match assembler.push(Frame::from_f32s(&[1.0, 2.0])) {
//!     Some(Assembled::Message(msg)) => assert_eq!(msg.frame_count(), 1),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use super::wire_format::{Diagnostic, Header, ParsedHeader, DEFAULT_MAX_FRAMES, UNLIMITED_FRAMES};
use super::{Frame, LogicalMessage};
use crate::error::HeaderError;

/// State machine for message assembly.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a header event.
    AwaitingHeader,
    /// Header accepted, collecting its frames.
    CollectingFrames {
        remaining: u32,
        partial: LogicalMessage,
    },
    /// Oversized message, dropping its frames.
    Skipping { remaining: u32 },
}

/// Output of a single [`MessageAssembler::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// A complete logical message.
    Message(LogicalMessage),
    /// A diagnostic line; not part of request/response tracking.
    Diagnostic(Diagnostic),
}

/// Rebuilds logical messages from an ordered event sequence.
///
/// Malformed headers and stray binary events are logged and discarded; the
/// assembler never enters an error state.
#[derive(Debug)]
pub struct MessageAssembler {
    state: State,
    max_frames: u32,
}

impl MessageAssembler {
    /// Create an assembler accepting any frame count.
    pub fn new() -> Self {
        Self::with_max_frames(UNLIMITED_FRAMES)
    }

    /// Create an assembler rejecting headers that declare more than
    /// `max_frames` frames.
    pub fn with_max_frames(max_frames: u32) -> Self {
        Self {
            state: State::AwaitingHeader,
            max_frames,
        }
    }

    /// Consume one event.
    ///
    /// Returns `Some` when the event completes a logical message or carries a
    /// diagnostic line, `None` otherwise.
    pub fn push(&mut self, event: Frame) -> Option<Assembled> {
        match std::mem::replace(&mut self.state, State::AwaitingHeader) {
            State::AwaitingHeader => self.on_header(event),
            State::CollectingFrames {
                remaining,
                mut partial,
            } => {
                partial.frames.push(event);
                self.advance(remaining - 1, partial)
            }
            State::Skipping { remaining } => {
                if remaining > 1 {
                    self.state = State::Skipping {
                        remaining: remaining - 1,
                    };
                }
                None
            }
        }
    }

    fn on_header(&mut self, event: Frame) -> Option<Assembled> {
        let text = match event {
            Frame::Text(text) => text,
            Frame::Binary(b) => {
                tracing::warn!(len = b.len(), "Discarding binary event while awaiting header");
                return None;
            }
        };

        match Header::parse(&text, self.max_frames) {
            Ok(ParsedHeader::Diagnostic(diagnostic)) => Some(Assembled::Diagnostic(diagnostic)),
            Ok(ParsedHeader::Message(header)) => {
                let remaining = header.frames;
                let capacity = remaining.min(DEFAULT_MAX_FRAMES) as usize;
                let partial = LogicalMessage::new(header, Vec::with_capacity(capacity));
                self.advance(remaining, partial)
            }
            Err(HeaderError::TooManyFrames { declared, limit }) => {
                tracing::warn!(declared, limit, "Discarding oversized message");
                if declared > 0 {
                    self.state = State::Skipping {
                        remaining: declared,
                    };
                }
                None
            }
            Err(e) => {
                tracing::warn!("Discarding malformed header: {}", e);
                None
            }
        }
    }

    /// Complete the message if no frames remain, otherwise keep collecting.
    fn advance(&mut self, remaining: u32, partial: LogicalMessage) -> Option<Assembled> {
        if remaining == 0 {
            self.state = State::AwaitingHeader;
            return Some(Assembled::Message(partial));
        }
        self.state = State::CollectingFrames { remaining, partial };
        None
    }

    /// Whether the next event will be treated as a header.
    pub fn is_awaiting_header(&self) -> bool {
        matches!(self.state, State::AwaitingHeader)
    }

    /// Frames still expected for the message in progress.
    pub fn frames_remaining(&self) -> Option<u32> {
        match &self.state {
            State::AwaitingHeader => None,
            State::CollectingFrames { remaining, .. } | State::Skipping { remaining } => {
                Some(*remaining)
            }
        }
    }

    /// Drop any partial message and wait for a new header.
    pub fn reset(&mut self) {
        match &self.state {
            State::CollectingFrames { partial, remaining } => tracing::debug!(
                request = partial.request_id(),
                remaining,
                "Discarding partial message"
            ),
            State::Skipping { remaining } => {
                tracing::debug!(remaining, "Abandoning oversized message")
            }
            State::AwaitingHeader => {}
        }
        self.state = State::AwaitingHeader;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::AwaitingHeader => "AwaitingHeader",
            State::CollectingFrames { .. } => "CollectingFrames",
            State::Skipping { .. } => "Skipping",
        }
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}
