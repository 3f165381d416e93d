//! Frame type - one text or binary unit on the transport.
//!
//! A transport event and a message frame have the same shape, so the same
//! type is used for both. Binary payloads use `bytes::Bytes` for cheap
//! sharing.
//!
//! # Example
//!
//! ```
//! use amlink::protocol::Frame;
//!
//! let text = Frame::from("hello");
//! let binary = Frame::from(vec![1u8, 2, 3]);
//!
//! assert_eq!(text.as_text(), Some("hello"));
//! assert_eq!(binary.len(), 3);
//! ```

use bytes::Bytes;
use serde_json::Value;

use crate::codec::F32Codec;
use crate::error::AmError;

/// One unit of payload: raw text or a raw binary buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text.
    Text(String),
    /// Binary buffer.
    Binary(Bytes),
}

impl Frame {
    /// Build a binary frame holding packed little-endian `f32` values.
    pub fn from_f32s(values: &[f32]) -> Self {
        Frame::Binary(F32Codec::encode(values))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, Frame::Text(_))
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }

    /// Get the text, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(s) => Some(s),
            Frame::Binary(_) => None,
        }
    }

    /// Get the buffer, if this is a binary frame.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Frame::Binary(b) => Some(b),
            Frame::Text(_) => None,
        }
    }

    /// Raw bytes of either variant.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(s) => s.as_bytes(),
            Frame::Binary(b) => b,
        }
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interpret a binary frame as packed `f32` values.
    ///
    /// Returns `None` for text frames. Trailing bytes that do not form a
    /// whole float are ignored.
    pub fn to_f32s(&self) -> Option<Vec<f32>> {
        self.as_binary().map(|b| F32Codec::decode(b))
    }

    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
        }
    }
}

impl From<String> for Frame {
    fn from(s: String) -> Self {
        Frame::Text(s)
    }
}

impl From<&str> for Frame {
    fn from(s: &str) -> Self {
        Frame::Text(s.to_string())
    }
}

impl From<Bytes> for Frame {
    fn from(b: Bytes) -> Self {
        Frame::Binary(b)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(v: Vec<u8>) -> Self {
        Frame::Binary(Bytes::from(v))
    }
}

/// Dynamic frames: only JSON strings are valid.
impl TryFrom<Value> for Frame {
    type Error = AmError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(Frame::Text(s)),
            other => Err(AmError::InvalidFrame {
                index: 0,
                kind: json_kind(&other),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert a list of frame-like values, failing on the first invalid one.
///
/// The error carries the position of the offending element.
pub fn collect_frames<I, T>(frames: I) -> crate::error::Result<Vec<Frame>>
where
    I: IntoIterator<Item = T>,
    T: TryInto<Frame>,
    T::Error: Into<AmError>,
{
    frames
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            item.try_into().map_err(|e| {
                let err: AmError = e.into();
                match err {
                    AmError::InvalidFrame { kind, .. } => AmError::InvalidFrame { index, kind },
                    other => other,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_accessors() {
        let frame = Frame::from("abc");
        assert!(frame.is_text());
        assert!(!frame.is_binary());
        assert_eq!(frame.as_text(), Some("abc"));
        assert!(frame.as_binary().is_none());
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.kind(), "text");
    }

    #[test]
    fn test_binary_accessors() {
        let frame = Frame::from(Bytes::from_static(b"\x00\x01"));
        assert!(frame.is_binary());
        assert_eq!(frame.as_bytes(), b"\x00\x01");
        assert!(frame.as_text().is_none());
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_f32_frame() {
        let frame = Frame::from_f32s(&[1.0, 2.5]);
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.to_f32s(), Some(vec![1.0, 2.5]));
        assert_eq!(Frame::from("x").to_f32s(), None);
    }

    #[test]
    fn test_try_from_json() {
        assert_eq!(Frame::try_from(json!("s")).unwrap(), Frame::from("s"));
        assert!(matches!(
            Frame::try_from(json!(3)),
            Err(AmError::InvalidFrame { kind: "number", .. })
        ));
    }

    #[test]
    fn test_collect_frames_reports_index() {
        let result = collect_frames(vec![json!("a"), json!("b"), json!({"x": 1})]);
        assert!(matches!(
            result,
            Err(AmError::InvalidFrame {
                index: 2,
                kind: "object"
            })
        ));
    }

    #[test]
    fn test_collect_frames_infallible() {
        let frames = collect_frames(vec![Frame::from("a"), Frame::from(vec![1u8])]).unwrap();
        assert_eq!(frames.len(), 2);
    }
}
