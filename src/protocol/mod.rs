//! Protocol module - wire format and buffer management.
//!
//! This module implements the framing used on the byte stream:
//! - 4-byte length prefix for requests
//! - 4-byte length prefix + status byte for replies
//! - method selector at the start of every request payload
//! - growable buffers reused across transactions

mod grow_buffer;
mod wire_format;

pub use grow_buffer::GrowBuffer;
pub use wire_format::{
    build_reply, build_request, decode_length, encode_length, ReplyHeader, SelectorWidth, Status,
    DEFAULT_INPUT_CAPACITY, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_RESPONSE_CAPACITY,
    LENGTH_PREFIX_SIZE, MAX_RESPONSE_SIZE, REPLY_HEADER_SIZE, STATUS_SIZE,
};
