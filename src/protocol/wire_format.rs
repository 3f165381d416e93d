//! Header wire format.
//!
//! Every logical message starts with one text event holding a JSON object:
//!
//! ```text
//! {"cmd": "floatsum", "frames": 1, "request": 7, "args": {...}, ...extra}
//! ```
//!
//! - `cmd`: non-empty command name
//! - `frames`: number of frame events that follow (integer >= 0)
//! - `request`: request identifier (integer > 0)
//! - `args`: optional, arbitrary JSON
//!
//! Any other top-level field is preserved in [`Header::extra`].
//!
//! The reserved command [`PRINT_COMMAND`] carries a one-way diagnostic
//! line in its `print` field and has neither `frames` nor `request`.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::codec::JsonCodec;
use crate::error::{HeaderError, Result};

/// Request identifier type.
pub type RequestId = u64;

/// Reserved command for diagnostic log lines sent by the module.
pub const PRINT_COMMAND: &str = "NaClAMPrint";

/// Default maximum frames per logical message on the module side.
///
/// The reference module stores incoming frames in a fixed array of 16.
pub const DEFAULT_MAX_FRAMES: u32 = 16;

/// Frame limit that accepts any count; the host default.
pub const UNLIMITED_FRAMES: u32 = u32::MAX;

/// Decoded message header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    /// Command name.
    pub cmd: String,
    /// Number of frames that follow the header.
    pub frames: u32,
    /// Request identifier.
    pub request: RequestId,
    /// Command arguments.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub args: Value,
    /// Additional top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A diagnostic line sent with the reserved [`PRINT_COMMAND`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Text to log.
    pub text: String,
}

/// Outcome of parsing a header event.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedHeader {
    /// Start of a logical message.
    Message(Header),
    /// One-way diagnostic line.
    Diagnostic(Diagnostic),
}

impl Header {
    /// Create a header with no extra fields.
    pub fn new(cmd: impl Into<String>, frames: u32, request: RequestId, args: Value) -> Self {
        Self {
            cmd: cmd.into(),
            frames,
            request,
            args,
            extra: Map::new(),
        }
    }

    /// Parse a header event.
    ///
    /// Diagnostic headers are recognised before any request/response field
    /// is checked.
    ///
    /// # Example
    ///
    /// ```
    /// use amlink::protocol::{Header, ParsedHeader, DEFAULT_MAX_FRAMES};
    ///
    /// let parsed = Header::parse(r#"{"cmd":"reply","frames":0,"request":3}"#, DEFAULT_MAX_FRAMES).unwrap();
    /// match parsed {
    ///     ParsedHeader::Message(header) => assert_eq!(header.request, 3),
    ///     ParsedHeader::Diagnostic(_) => unreachable!(),
    /// }
    /// ```
    pub fn parse(text: &str, max_frames: u32) -> std::result::Result<ParsedHeader, HeaderError> {
        if text.is_empty() {
            return Err(HeaderError::Empty);
        }

        let root: Value =
            serde_json::from_str(text).map_err(|e| HeaderError::NotJson(e.to_string()))?;
        let Value::Object(mut map) = root else {
            return Err(HeaderError::NotAnObject);
        };

        let cmd = match map.remove("cmd") {
            None => return Err(HeaderError::MissingCmd),
            Some(Value::String(cmd)) => cmd,
            Some(_) => return Err(HeaderError::CmdNotString),
        };

        if cmd == PRINT_COMMAND {
            let text = match map.remove("print") {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            return Ok(ParsedHeader::Diagnostic(Diagnostic { text }));
        }

        let request = match map.remove("request") {
            None => return Err(HeaderError::MissingRequest),
            Some(v) => whole_number(&v)
                .filter(|&id| id > 0)
                .ok_or(HeaderError::RequestNotPositive)?,
        };

        let frames = match map.remove("frames") {
            None => return Err(HeaderError::MissingFrames),
            Some(v) => whole_number(&v)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or(HeaderError::FramesNotInteger)?,
        };

        if frames > max_frames {
            return Err(HeaderError::TooManyFrames {
                declared: frames,
                limit: max_frames,
            });
        }

        let args = map.remove("args").unwrap_or(Value::Null);

        Ok(ParsedHeader::Message(Header {
            cmd,
            frames,
            request,
            args,
            extra: map,
        }))
    }

    /// Check the header before it goes on the wire.
    pub fn validate(&self, max_frames: u32) -> std::result::Result<(), HeaderError> {
        if self.cmd.is_empty() {
            return Err(HeaderError::EmptyCmd);
        }
        if self.cmd == PRINT_COMMAND {
            return Err(HeaderError::ReservedCmd(self.cmd.clone()));
        }
        if self.request == 0 {
            return Err(HeaderError::RequestNotPositive);
        }
        if self.frames > max_frames {
            return Err(HeaderError::TooManyFrames {
                declared: self.frames,
                limit: max_frames,
            });
        }
        Ok(())
    }

    /// Serialize to the JSON text carried by the header event.
    pub fn encode(&self) -> Result<String> {
        JsonCodec::encode(self)
    }
}

/// Non-negative integer value, also accepting floats without a fraction
/// (`1.0`), which JavaScript senders produce.
fn whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// Serialize a diagnostic line as a header event.
pub fn encode_diagnostic(text: &str) -> Result<String> {
    JsonCodec::encode(&json!({ "cmd": PRINT_COMMAND, "print": text }))
}
