//! Codec module - serialization helpers for headers and frames.
//!
//! - [`JsonCodec`] - JSON text for headers and `args` (`serde_json`)
//! - [`F32Codec`] - packed little-endian `f32` arrays for binary frames
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//!
//! # Example
//!
//! ```
//! use amlink::codec::{F32Codec, JsonCodec};
//!
//! let encoded = JsonCodec::encode(&"hello").unwrap();
//! let decoded: String = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//!
//! let packed = F32Codec::encode(&[1.0, 2.0]);
//! assert_eq!(F32Codec::decode(&packed), vec![1.0, 2.0]);
//! ```

mod float;
mod json;

pub use float::F32Codec;
pub use json::JsonCodec;
