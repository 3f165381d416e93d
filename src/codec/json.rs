//! JSON codec using `serde_json`.
//!
//! Headers travel as a single JSON text event; `args` is arbitrary JSON.
//!
//! # Example
//!
//! ```
//! use amlink::codec::JsonCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Scene {
//!     objects: u32,
//! }
//!
//! let encoded = JsonCodec::encode(&Scene { objects: 3 }).unwrap();
//! assert_eq!(encoded, r#"{"objects":3}"#);
//! let decoded: Scene = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, Scene { objects: 3 });
//! ```

use serde_json::Value;

use crate::error::Result;

/// JSON codec for headers and structured arguments.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized (e.g. a map with
    /// non-string keys).
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode JSON text to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the text cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert any serializable value to a dynamic JSON value.
    #[inline]
    pub fn to_value<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value> {
        Ok(serde_json::to_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_encode_is_compact() {
        let encoded = JsonCodec::encode(&json!({"cmd": "x", "frames": 0})).unwrap();
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_decode_error() {
        let result: Result<Value> = JsonCodec::decode("{broken");
        assert!(result.is_err());
    }

    #[test]
    fn test_non_string_map_keys_fail() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        assert!(JsonCodec::to_value(&map).is_err());
    }

    #[test]
    fn test_to_value_unit_is_null() {
        assert_eq!(JsonCodec::to_value(&()).unwrap(), Value::Null);
    }
}
