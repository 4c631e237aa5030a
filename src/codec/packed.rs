//! Packed native layout for arguments and results.
//!
//! This is the layout spoken by the generated front ends: values are laid
//! out back to back in native byte order with no padding.
//!
//! ```text
//! ┌──────────────────────────────────────┬──────────────────────────┐
//! │ Head                                 │ Tail                     │
//! │ fixed-size fields in order;          │ data of every buffer and │
//! │ buffers/strings as a u16 size        │ string, in field order   │
//! └──────────────────────────────────────┴──────────────────────────┘
//! ```
//!
//! Strings travelling as call arguments carry a trailing NUL in the tail
//! (not counted in their size); strings in results do not.
//!
//! # Example
//!
//! ```
//! use rpcwire::codec::{Direction, PackedCodec, RpcString};
//!
//! let args = (7i32, RpcString::from("hi"));
//! let bytes = PackedCodec::encode(&args, Direction::Args).unwrap();
//! assert_eq!(bytes.len(), 4 + 2 + 3);
//!
//! let (n, s): (i32, RpcString) = PackedCodec::decode(&bytes, Direction::Args).unwrap();
//! assert_eq!(n, 7);
//! assert_eq!(s.as_str(), "hi");
//! ```

use std::fmt;
use std::ops::Deref;

use crate::error::{Result, RpcError};

/// Which half of a call a packed value travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Call arguments (request payload after the selector).
    Args,
    /// Call result (reply body).
    Result,
}

/// Cursor over packed bytes.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    direction: Direction,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8], direction: Direction) -> Self {
        Self {
            buf,
            pos: 0,
            direction,
        }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Bytes not consumed yet.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(RpcError::Decode(format!(
                "need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Consume exactly `N` bytes into an array.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// Cursor writing packed bytes into a pre-sized region.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
    direction: Direction,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8], direction: Direction) -> Self {
        Self {
            buf,
            pos: 0,
            direction,
        }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Append bytes; fails instead of writing past the region.
    pub fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(RpcError::Encode(format!(
                "{} bytes do not fit at offset {} of {}",
                bytes.len(),
                self.pos,
                self.buf.len()
            )));
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

/// A value that can be written in the packed layout.
pub trait Pack {
    /// Size of the fixed head part.
    fn head_len(&self) -> usize;

    /// Size of the variable tail part.
    fn tail_len(&self, _direction: Direction) -> usize {
        0
    }

    fn pack_head(&self, w: &mut Writer<'_>) -> Result<()>;

    fn pack_tail(&self, _w: &mut Writer<'_>) -> Result<()> {
        Ok(())
    }
}

/// A value that can be read from the packed layout.
///
/// Reading happens in two passes: every head first, then every tail, so a
/// buffer only learns where its data lives once all heads are consumed.
pub trait Unpack: Sized {
    fn unpack_head(r: &mut Reader<'_>) -> Result<Self>;

    fn unpack_tail(&mut self, _r: &mut Reader<'_>) -> Result<()> {
        Ok(())
    }
}

/// Codec for the packed layout.
pub struct PackedCodec;

impl PackedCodec {
    /// Total encoded size of a value.
    #[inline]
    pub fn encoded_len<T: Pack + ?Sized>(value: &T, direction: Direction) -> usize {
        value.head_len() + value.tail_len(direction)
    }

    /// Encode into a region of exactly [`PackedCodec::encoded_len`] bytes.
    pub fn encode_into<T: Pack + ?Sized>(
        value: &T,
        out: &mut [u8],
        direction: Direction,
    ) -> Result<()> {
        let head_len = value.head_len();
        if out.len() < head_len {
            return Err(RpcError::Encode(format!(
                "head of {} bytes does not fit in {}",
                head_len,
                out.len()
            )));
        }
        let (head, tail) = out.split_at_mut(head_len);
        value.pack_head(&mut Writer::new(head, direction))?;
        value.pack_tail(&mut Writer::new(tail, direction))
    }

    /// Encode into a fresh vector.
    pub fn encode<T: Pack + ?Sized>(value: &T, direction: Direction) -> Result<Vec<u8>> {
        let mut out = vec![0u8; Self::encoded_len(value, direction)];
        Self::encode_into(value, &mut out, direction)?;
        Ok(out)
    }

    /// Decode a value. Trailing bytes are ignored.
    pub fn decode<T: Unpack>(bytes: &[u8], direction: Direction) -> Result<T> {
        let mut reader = Reader::new(bytes, direction);
        let mut value = T::unpack_head(&mut reader)?;
        value.unpack_tail(&mut reader)?;
        if reader.remaining() > 0 {
            tracing::trace!(trailing = reader.remaining(), "ignoring trailing bytes");
        }
        Ok(value)
    }
}

macro_rules! packed_primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl Pack for $ty {
            #[inline]
            fn head_len(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            #[inline]
            fn pack_head(&self, w: &mut Writer<'_>) -> Result<()> {
                w.put(&self.to_ne_bytes())
            }
        }

        impl Unpack for $ty {
            #[inline]
            fn unpack_head(r: &mut Reader<'_>) -> Result<Self> {
                Ok(<$ty>::from_ne_bytes(r.take_array()?))
            }
        }
    )*};
}

packed_primitive!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl Pack for bool {
    fn head_len(&self) -> usize {
        1
    }

    fn pack_head(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&[*self as u8])
    }
}

impl Unpack for bool {
    fn unpack_head(r: &mut Reader<'_>) -> Result<Self> {
        Ok(r.take_array::<1>()?[0] != 0)
    }
}

impl Pack for () {
    fn head_len(&self) -> usize {
        0
    }

    fn pack_head(&self, _w: &mut Writer<'_>) -> Result<()> {
        Ok(())
    }
}

impl Unpack for () {
    fn unpack_head(_r: &mut Reader<'_>) -> Result<Self> {
        Ok(())
    }
}

macro_rules! packed_tuple {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Pack),+> Pack for ($($name,)+) {
            fn head_len(&self) -> usize {
                0 $(+ self.$idx.head_len())+
            }

            fn tail_len(&self, direction: Direction) -> usize {
                0 $(+ self.$idx.tail_len(direction))+
            }

            fn pack_head(&self, w: &mut Writer<'_>) -> Result<()> {
                $(self.$idx.pack_head(w)?;)+
                Ok(())
            }

            fn pack_tail(&self, w: &mut Writer<'_>) -> Result<()> {
                $(self.$idx.pack_tail(w)?;)+
                Ok(())
            }
        }

        impl<$($name: Unpack),+> Unpack for ($($name,)+) {
            fn unpack_head(r: &mut Reader<'_>) -> Result<Self> {
                Ok(($($name::unpack_head(r)?,)+))
            }

            fn unpack_tail(&mut self, r: &mut Reader<'_>) -> Result<()> {
                $(self.$idx.unpack_tail(r)?;)+
                Ok(())
            }
        }
    };
}

packed_tuple!(A 0);
packed_tuple!(A 0, B 1);
packed_tuple!(A 0, B 1, C 2);
packed_tuple!(A 0, B 1, C 2, D 3);
packed_tuple!(A 0, B 1, C 2, D 3, E 4);
packed_tuple!(A 0, B 1, C 2, D 3, E 4, F 5);

/// Size field of buffers and strings.
fn encode_size(len: usize) -> Result<[u8; 2]> {
    u16::try_from(len)
        .map(u16::to_ne_bytes)
        .map_err(|_| RpcError::Encode(format!("{} bytes exceed the u16 size field", len)))
}

/// Opaque byte buffer with a `u16` size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcBuffer(Vec<u8>);

impl RpcBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for RpcBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RpcBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl From<&[u8]> for RpcBuffer {
    fn from(data: &[u8]) -> Self {
        Self(data.to_vec())
    }
}

impl Pack for RpcBuffer {
    fn head_len(&self) -> usize {
        2
    }

    fn tail_len(&self, _direction: Direction) -> usize {
        self.0.len()
    }

    fn pack_head(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&encode_size(self.0.len())?)
    }

    fn pack_tail(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&self.0)
    }
}

impl Unpack for RpcBuffer {
    fn unpack_head(r: &mut Reader<'_>) -> Result<Self> {
        let size = u16::from_ne_bytes(r.take_array()?) as usize;
        Ok(Self(vec![0; size]))
    }

    fn unpack_tail(&mut self, r: &mut Reader<'_>) -> Result<()> {
        let data = r.take(self.0.len())?;
        self.0.copy_from_slice(data);
        Ok(())
    }
}

/// UTF-8 string with a `u16` length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RpcString(String);

impl RpcString {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for RpcString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RpcString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RpcString {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for RpcString {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl Pack for RpcString {
    fn head_len(&self) -> usize {
        2
    }

    fn tail_len(&self, direction: Direction) -> usize {
        match direction {
            Direction::Args => self.0.len() + 1,
            Direction::Result => self.0.len(),
        }
    }

    fn pack_head(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(&encode_size(self.0.len())?)
    }

    fn pack_tail(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put(self.0.as_bytes())?;
        if w.direction() == Direction::Args {
            w.put(&[0])?;
        }
        Ok(())
    }
}

impl Unpack for RpcString {
    fn unpack_head(r: &mut Reader<'_>) -> Result<Self> {
        let size = u16::from_ne_bytes(r.take_array()?) as usize;
        // NUL characters are valid UTF-8; the placeholder only records the size.
        Ok(Self("\0".repeat(size)))
    }

    fn unpack_tail(&mut self, r: &mut Reader<'_>) -> Result<()> {
        let data = r.take(self.0.len())?;
        let text = std::str::from_utf8(data)
            .map_err(|e| RpcError::Decode(format!("string is not UTF-8: {}", e)))?;
        self.0 = text.to_string();
        if r.direction() == Direction::Args {
            let [terminator] = r.take_array::<1>()?;
            if terminator != 0 {
                return Err(RpcError::Decode(
                    "string argument is not NUL-terminated".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Implement [`Pack`] and [`Unpack`] for a struct with named fields.
///
/// Fields are laid out in the order listed, which must be the declaration
/// order the peer expects.
///
/// ```
/// use rpcwire::impl_packed;
/// use rpcwire::codec::{Direction, PackedCodec};
///
/// #[derive(Debug, PartialEq)]
/// struct Point3i {
///     x: i32,
///     y: i32,
///     z: i32,
/// }
///
/// impl_packed!(Point3i { x, y, z });
///
/// let p = Point3i { x: 1, y: 2, z: 3 };
/// let bytes = PackedCodec::encode(&p, Direction::Result).unwrap();
/// assert_eq!(bytes.len(), 12);
/// assert_eq!(PackedCodec::decode::<Point3i>(&bytes, Direction::Result).unwrap(), p);
/// ```
#[macro_export]
macro_rules! impl_packed {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::codec::Pack for $ty {
            fn head_len(&self) -> usize {
                0 $(+ $crate::codec::Pack::head_len(&self.$field))+
            }

            fn tail_len(&self, direction: $crate::codec::Direction) -> usize {
                0 $(+ $crate::codec::Pack::tail_len(&self.$field, direction))+
            }

            fn pack_head(&self, w: &mut $crate::codec::Writer<'_>) -> $crate::Result<()> {
                $($crate::codec::Pack::pack_head(&self.$field, w)?;)+
                Ok(())
            }

            fn pack_tail(&self, w: &mut $crate::codec::Writer<'_>) -> $crate::Result<()> {
                $($crate::codec::Pack::pack_tail(&self.$field, w)?;)+
                Ok(())
            }
        }

        impl $crate::codec::Unpack for $ty {
            fn unpack_head(r: &mut $crate::codec::Reader<'_>) -> $crate::Result<Self> {
                Ok(Self {
                    $($field: $crate::codec::Unpack::unpack_head(r)?,)+
                })
            }

            fn unpack_tail(&mut self, r: &mut $crate::codec::Reader<'_>) -> $crate::Result<()> {
                $($crate::codec::Unpack::unpack_tail(&mut self.$field, r)?;)+
                Ok(())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point3i {
        x: i32,
        y: i32,
        z: i32,
    }

    crate::impl_packed!(Point3i { x, y, z });

    #[derive(Debug, PartialEq)]
    struct Named {
        id: u16,
        label: RpcString,
        blob: RpcBuffer,
    }

    crate::impl_packed!(Named { id, label, blob });

    #[test]
    fn test_primitives_are_native_and_unpadded() {
        let bytes = PackedCodec::encode(&(1u8, 0x0203u16, -1i32), Direction::Args).unwrap();
        let mut expected = vec![1u8];
        expected.extend_from_slice(&0x0203u16.to_ne_bytes());
        expected.extend_from_slice(&(-1i32).to_ne_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_struct_layout_matches_fields() {
        let p = Point3i { x: 1, y: -2, z: 3 };
        let bytes = PackedCodec::encode(&p, Direction::Result).unwrap();
        assert_eq!(&bytes[0..4], &1i32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &(-2i32).to_ne_bytes());
        assert_eq!(&bytes[8..12], &3i32.to_ne_bytes());
    }

    #[test]
    fn test_buffers_go_to_the_tail() {
        let args = (RpcBuffer::from(&b"xyz"[..]), 9u8, RpcBuffer::from(&b"q"[..]));
        let bytes = PackedCodec::encode(&args, Direction::Args).unwrap();

        // head: size(3) | 9 | size(1), tail: "xyz" "q"
        let mut expected = 3u16.to_ne_bytes().to_vec();
        expected.push(9);
        expected.extend_from_slice(&1u16.to_ne_bytes());
        expected.extend_from_slice(b"xyzq");
        assert_eq!(bytes, expected);

        let decoded: (RpcBuffer, u8, RpcBuffer) =
            PackedCodec::decode(&bytes, Direction::Args).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_argument_strings_are_nul_terminated() {
        let bytes = PackedCodec::encode(&RpcString::from("abc"), Direction::Args).unwrap();
        let mut expected = 3u16.to_ne_bytes().to_vec();
        expected.extend_from_slice(b"abc\0");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_result_strings_are_not_terminated() {
        let bytes = PackedCodec::encode(&RpcString::from("abc"), Direction::Result).unwrap();
        let mut expected = 3u16.to_ne_bytes().to_vec();
        expected.extend_from_slice(b"abc");
        assert_eq!(bytes, expected);

        let decoded: RpcString = PackedCodec::decode(&bytes, Direction::Result).unwrap();
        assert_eq!(decoded.as_str(), "abc");
    }

    #[test]
    fn test_missing_terminator_rejected() {
        let mut bytes = 2u16.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"hiX");
        let err = PackedCodec::decode::<RpcString>(&bytes, Direction::Args).unwrap_err();
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut bytes = 1u16.to_ne_bytes().to_vec();
        bytes.push(0xFF);
        let err = PackedCodec::decode::<RpcString>(&bytes, Direction::Result).unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }

    #[test]
    fn test_nested_struct_with_tail() {
        let value = Named {
            id: 5,
            label: RpcString::from("cpu"),
            blob: RpcBuffer::from(vec![1, 2]),
        };
        let bytes = PackedCodec::encode(&value, Direction::Args).unwrap();
        assert_eq!(bytes.len(), 2 + 2 + 2 + 4 + 2);
        let decoded: Named = PackedCodec::decode(&bytes, Direction::Args).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let bytes = 1i32.to_ne_bytes();
        let err = PackedCodec::decode::<(i32, i32)>(&bytes, Direction::Args).unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }

    #[test]
    fn test_truncated_tail_is_decode_error() {
        let mut bytes = 4u16.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"ab");
        assert!(PackedCodec::decode::<RpcBuffer>(&bytes, Direction::Args).is_err());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = 7u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let value: u32 = PackedCodec::decode(&bytes, Direction::Args).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_oversized_buffer_rejected() {
        let big = RpcBuffer::from(vec![0u8; u16::MAX as usize + 1]);
        let err = PackedCodec::encode(&big, Direction::Result).unwrap_err();
        assert!(matches!(err, RpcError::Encode(_)));
    }

    #[test]
    fn test_unit_is_empty() {
        assert!(PackedCodec::encode(&(), Direction::Result).unwrap().is_empty());
        PackedCodec::decode::<()>(&[], Direction::Args).unwrap();
    }

    #[test]
    fn test_bool_and_floats() {
        let bytes = PackedCodec::encode(&(true, 1.5f64, false), Direction::Args).unwrap();
        assert_eq!(bytes.len(), 10);
        let (a, b, c): (bool, f64, bool) = PackedCodec::decode(&bytes, Direction::Args).unwrap();
        assert!(a);
        assert_eq!(b, 1.5);
        assert!(!c);
    }

    #[test]
    fn test_writer_refuses_overrun() {
        let mut region = [0u8; 2];
        let mut w = Writer::new(&mut region, Direction::Result);
        assert!(w.put(&[1, 2, 3]).is_err());
        w.put(&[1, 2]).unwrap();
        assert_eq!(w.position(), 2);
    }
}
