//! Codec module - argument and result encodings.
//!
//! Two encodings are available for method payloads:
//!
//! - [`PackedCodec`] - packed native layout (head + tail), the format spoken
//!   by the generated front ends
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (struct-as-map)
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//! The encoding is picked when a method is registered and never changes.
//!
//! # Example
//!
//! ```
//! use rpcwire::codec::{Direction, MsgPackCodec, PackedCodec};
//!
//! let packed = PackedCodec::encode(&(1i32, 2i32), Direction::Args).unwrap();
//! assert_eq!(packed.len(), 8);
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod msgpack;
mod packed;

pub use msgpack::MsgPackCodec;
pub use packed::{Direction, Pack, PackedCodec, Reader, RpcBuffer, RpcString, Unpack, Writer};
