//! Completed logical message.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Frame, Header, RequestId};
use crate::error::Result;

/// One header plus its declared frames, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalMessage {
    pub header: Header,
    pub frames: Vec<Frame>,
}

impl LogicalMessage {
    /// Create a message from a header and its frames.
    pub fn new(header: Header, frames: Vec<Frame>) -> Self {
        Self { header, frames }
    }

    #[inline]
    pub fn cmd(&self) -> &str {
        &self.header.cmd
    }

    #[inline]
    pub fn request_id(&self) -> RequestId {
        self.header.request
    }

    /// Number of frames actually collected.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Deserialize the `args` field.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.header.args)?)
    }

    /// Look up a named field in `args`, falling back to extra top-level
    /// header fields.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.header
            .args
            .get(name)
            .or_else(|| self.header.extra.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Sum {
        sum: f64,
    }

    #[test]
    fn test_accessors() {
        let msg = LogicalMessage::new(
            Header::new("sceneupdate", 1, 12, json!({"sum": 55.0})),
            vec![Frame::from_f32s(&[1.0])],
        );

        assert_eq!(msg.cmd(), "sceneupdate");
        assert_eq!(msg.request_id(), 12);
        assert_eq!(msg.frame_count(), 1);
        assert!(msg.frame(0).is_some());
        assert!(msg.frame(1).is_none());
        assert_eq!(msg.args::<Sum>().unwrap(), Sum { sum: 55.0 });
    }

    #[test]
    fn test_field_falls_back_to_extra() {
        let mut header = Header::new("reply", 0, 1, Value::Null);
        header.extra.insert("sceneobjectcount".into(), json!(4));
        let msg = LogicalMessage::new(header, Vec::new());

        assert_eq!(msg.field("sceneobjectcount"), Some(&json!(4)));
        assert_eq!(msg.field("missing"), None);
    }

    #[test]
    fn test_args_type_mismatch() {
        let msg = LogicalMessage::new(Header::new("x", 0, 1, json!("text")), Vec::new());
        assert!(msg.args::<Sum>().is_err());
    }
}
