//! Wire format encoding and decoding.
//!
//! Request and reply frames:
//! ```text
//! Request: ┌──────────┬─────────────────────────────┐
//!          │ Length L │ Payload                     │
//!          │ 4 bytes  │ L bytes (selector + args)   │
//!          └──────────┴─────────────────────────────┘
//! Reply:   ┌──────────┬────────┬────────────────────┐
//!          │ Length R │ Status │ Body               │
//!          │ 4 bytes  │ 1 byte │ R-1 bytes (if OK)  │
//!          └──────────┴────────┴────────────────────┘
//! ```
//!
//! All multi-byte integers use the native byte order of the host, the peers
//! are expected to run on the same machine.

use crate::error::{Result, RpcError};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the status byte in the reply envelope.
pub const STATUS_SIZE: usize = 1;

/// Length prefix plus status byte.
pub const REPLY_HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + STATUS_SIZE;

/// Default input buffer capacity (1 MiB).
pub const DEFAULT_INPUT_CAPACITY: usize = 1 << 20;

/// Default response buffer capacity (1 KiB).
pub const DEFAULT_RESPONSE_CAPACITY: usize = 1 << 10;

/// Default maximum request size (1 GiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 1 << 30;

/// Largest body that still leaves room for the status byte in a `u32` length.
pub const MAX_RESPONSE_SIZE: usize = (u32::MAX - 1) as usize;

/// Reply status carried in the byte after the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Handler succeeded, body follows.
    Ok = 0,
    /// Dispatch or handler failed, no body.
    Error = 1,
}

impl Status {
    /// The byte written on the wire.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a status byte. Unknown values are rejected.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Status::Ok),
            1 => Some(Status::Error),
            _ => None,
        }
    }
}

/// Encode a length prefix.
#[inline]
pub fn encode_length(len: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    len.to_ne_bytes()
}

/// Decode a length prefix.
///
/// Returns `None` if the buffer is too short.
#[inline]
pub fn decode_length(buf: &[u8]) -> Option<u32> {
    let bytes = buf.get(..LENGTH_PREFIX_SIZE)?;
    Some(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decoded reply envelope (length prefix + status byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    /// Length covering the status byte and the body.
    pub length: u32,
    /// Reply status.
    pub status: Status,
}

impl ReplyHeader {
    /// Header for a reply with the given status and body length.
    ///
    /// Error replies never carry a body, so `body_len` is ignored for them.
    pub fn for_body(status: Status, body_len: usize) -> Result<Self> {
        let body_len = match status {
            Status::Ok => body_len,
            Status::Error => 0,
        };
        let length = u32::try_from(body_len)
            .ok()
            .and_then(|len| len.checked_add(STATUS_SIZE as u32))
            .ok_or(RpcError::ResponseTooLarge(body_len))?;
        Ok(Self { length, status })
    }

    /// Number of body bytes following the header.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.length.saturating_sub(STATUS_SIZE as u32) as usize
    }

    /// Encode the envelope to bytes.
    pub fn encode(&self) -> [u8; REPLY_HEADER_SIZE] {
        let mut buf = [0u8; REPLY_HEADER_SIZE];
        buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&encode_length(self.length));
        buf[LENGTH_PREFIX_SIZE] = self.status.as_byte();
        buf
    }

    /// Decode the envelope from bytes.
    ///
    /// Checks that the length covers the status byte, the status is known and
    /// error replies carry no body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let length = decode_length(buf)
            .ok_or_else(|| RpcError::Decode("reply shorter than length prefix".to_string()))?;
        if length < STATUS_SIZE as u32 {
            return Err(RpcError::Decode(
                "reply length does not cover the status byte".to_string(),
            ));
        }
        let byte = *buf
            .get(LENGTH_PREFIX_SIZE)
            .ok_or_else(|| RpcError::Decode("reply missing status byte".to_string()))?;
        let status = Status::from_byte(byte)
            .ok_or_else(|| RpcError::Decode(format!("unknown status byte {}", byte)))?;
        if status == Status::Error && length != STATUS_SIZE as u32 {
            return Err(RpcError::Decode(
                "error reply must not carry a body".to_string(),
            ));
        }
        Ok(Self { length, status })
    }
}

/// Width of the method selector at the start of every request payload.
///
/// The width is the smallest unsigned integer able to number every
/// registered method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorWidth {
    U8,
    U16,
    U32,
}

impl SelectorWidth {
    /// Width for a table of `count` methods.
    pub fn for_count(count: usize) -> Self {
        if count < 0x100 {
            SelectorWidth::U8
        } else if count < 0x1_0000 {
            SelectorWidth::U16
        } else {
            SelectorWidth::U32
        }
    }

    /// Width with the given size in bytes, if it is one of 1, 2 or 4.
    pub fn from_size(size: usize) -> Option<Self> {
        match size {
            1 => Some(SelectorWidth::U8),
            2 => Some(SelectorWidth::U16),
            4 => Some(SelectorWidth::U32),
            _ => None,
        }
    }

    /// Size in bytes.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            SelectorWidth::U8 => 1,
            SelectorWidth::U16 => 2,
            SelectorWidth::U32 => 4,
        }
    }

    /// Read a selector from the front of a payload.
    ///
    /// Returns `None` if the payload is shorter than the selector.
    pub fn decode(self, buf: &[u8]) -> Option<u32> {
        let bytes = buf.get(..self.size())?;
        Some(match self {
            SelectorWidth::U8 => bytes[0] as u32,
            SelectorWidth::U16 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u32,
            SelectorWidth::U32 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        })
    }

    /// Append a selector to a payload being built.
    pub fn encode_into(self, selector: u32, out: &mut Vec<u8>) -> Result<()> {
        let too_wide = || RpcError::Encode(format!("selector {} does not fit {:?}", selector, self));
        match self {
            SelectorWidth::U8 => out.push(u8::try_from(selector).map_err(|_| too_wide())?),
            SelectorWidth::U16 => out.extend_from_slice(
                &u16::try_from(selector).map_err(|_| too_wide())?.to_ne_bytes(),
            ),
            SelectorWidth::U32 => out.extend_from_slice(&selector.to_ne_bytes()),
        }
        Ok(())
    }
}

/// Build a complete request frame (length prefix + payload).
pub fn build_request(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| RpcError::Encode(format!("request of {} bytes", payload.len())))?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&encode_length(len));
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Build a complete reply frame (envelope + body for successful replies).
pub fn build_reply(status: Status, body: &[u8]) -> Result<Vec<u8>> {
    let header = ReplyHeader::for_body(status, body.len())?;
    let mut frame = Vec::with_capacity(REPLY_HEADER_SIZE + header.body_len());
    frame.extend_from_slice(&header.encode());
    if status == Status::Ok {
        frame.extend_from_slice(body);
    }
    Ok(frame)
}
