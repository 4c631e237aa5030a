//! MsgPack codec using `rmp-serde`.
//!
//! Used by methods registered with
//! [`HandlerRegistry::register_msgpack`](crate::handler::HandlerRegistry::register_msgpack),
//! for peers that would rather speak a self-describing format than the
//! packed native layout.
//!
//! Structs are always written with `to_vec_named` (struct-as-map), so a peer
//! can decode them by field name without knowing declaration order.
//!
//! # Example
//!
//! ```
//! use rpcwire::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Sample {
//!     sensor: u32,
//!     value: f64,
//! }
//!
//! let sample = Sample { sensor: 3, value: 0.5 };
//! let encoded = MsgPackCodec::encode(&sample).unwrap();
//! let decoded: Sample = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, sample);
//! ```

use crate::error::Result;

/// MessagePack codec for structured arguments and results.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Encode a value, appending to an existing buffer.
    #[inline]
    pub fn encode_into<T: serde::Serialize + ?Sized>(value: &T, out: &mut Vec<u8>) -> Result<()> {
        rmp_serde::encode::write_named(out, value)?;
        Ok(())
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Reading {
        channel: u16,
        label: String,
        valid: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = Reading {
            channel: 7,
            label: "temp".to_string(),
            valid: true,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: Reading = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_structs_are_maps() {
        let reading = Reading {
            channel: 1,
            label: "x".to_string(),
            valid: false,
        };

        let encoded = MsgPackCodec::encode(&reading).unwrap();

        // fixmap with 3 entries, not fixarray (0x93)
        assert_eq!(encoded[0], 0x83);
    }

    #[test]
    fn test_tuple_arguments_are_arrays() {
        let encoded = MsgPackCodec::encode(&(1i32, 2i32)).unwrap();
        assert_eq!(encoded[0], 0x92);

        let decoded: (i32, i32) = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, (1, 2));
    }

    #[test]
    fn test_encode_into_appends() {
        let mut out = vec![0xAA];
        MsgPackCodec::encode_into(&None::<u8>, &mut out).unwrap();
        assert_eq!(out, vec![0xAA, 0xc0]);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let err = MsgPackCodec::decode::<Reading>(b"not valid msgpack").unwrap_err();
        assert!(matches!(err, RpcError::MsgPackDecode(_)));
    }

    #[test]
    fn test_unit_result() {
        let encoded = MsgPackCodec::encode(&()).unwrap();
        MsgPackCodec::decode::<()>(&encoded).unwrap();
    }
}
