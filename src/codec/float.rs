//! Packed `f32` codec for binary frames.
//!
//! The module side reads binary frames as raw little-endian `f32` arrays
//! (a float buffer to sum, 4x4 transform matrices, ...). The layer itself
//! never interprets frames; this codec is for the code on either end.
//!
//! # Example
//!
//! ```
//! use amlink::codec::F32Codec;
//!
//! let values: Vec<f32> = (0..=10).map(|i| i as f32).collect();
//! let packed = F32Codec::encode(&values);
//! assert_eq!(packed.len(), 44);
//! assert_eq!(F32Codec::decode(&packed).iter().sum::<f32>(), 55.0);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Size of one packed value in bytes.
pub const F32_SIZE: usize = std::mem::size_of::<f32>();

/// Codec for little-endian `f32` arrays.
pub struct F32Codec;

impl F32Codec {
    /// Pack values into a new buffer.
    pub fn encode(values: &[f32]) -> Bytes {
        let mut buf = BytesMut::with_capacity(values.len() * F32_SIZE);
        for &v in values {
            buf.put_f32_le(v);
        }
        buf.freeze()
    }

    /// Unpack values; a trailing partial value is ignored.
    pub fn decode(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(F32_SIZE)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_little_endian() {
        let packed = F32Codec::encode(&[1.0]);
        assert_eq!(&packed[..], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_empty() {
        assert!(F32Codec::encode(&[]).is_empty());
        assert!(F32Codec::decode(&[]).is_empty());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = F32Codec::encode(&[2.5, -1.0]).to_vec();
        data.push(0xFF);
        assert_eq!(F32Codec::decode(&data), vec![2.5, -1.0]);
    }

    #[test]
    fn test_transform_matrix() {
        let identity: Vec<f32> = (0..16)
            .map(|i| if i % 5 == 0 { 1.0 } else { 0.0 })
            .collect();
        let decoded = F32Codec::decode(&F32Codec::encode(&identity));
        assert_eq!(decoded.len(), 16);
        assert_eq!(decoded, identity);
    }
}
