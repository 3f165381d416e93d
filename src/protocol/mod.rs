//! Protocol module - wire format, assembly, and message types.
//!
//! This module implements the message layer on top of whole transport events:
//! - JSON header encoding/decoding
//! - Message assembler rebuilding header + frames
//! - Outgoing message validation and serialization

mod assembler;
mod frame;
mod message;
mod outgoing;
mod wire_format;

pub use assembler::{Assembled, MessageAssembler};
pub use frame::{collect_frames, Frame};
pub use message::LogicalMessage;
pub use outgoing::OutgoingMessage;
pub use wire_format::{
    encode_diagnostic, Diagnostic, Header, ParsedHeader, RequestId, DEFAULT_MAX_FRAMES,
    PRINT_COMMAND, UNLIMITED_FRAMES,
};
