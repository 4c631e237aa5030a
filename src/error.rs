//! Error types for rpcwire.

use std::fmt;

use thiserror::Error;

/// Which part of a frame was being received when a read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    /// The 4-byte length prefix.
    Length,
    /// The payload (request) or the status/body (reply).
    Payload,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStage::Length => f.write_str("length prefix"),
            ReadStage::Payload => f.write_str("payload"),
        }
    }
}

/// Main error type for all rpcwire operations.
///
/// Transport errors (`Read`, `Write`, `MessageTooLarge`, and `Alloc` when it
/// comes from the input buffer) abort the current `poll` and are returned to
/// the caller. Everything raised while the backend handles a message is
/// reported to the peer through the status byte instead.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The connection returned zero bytes before the frame part was complete.
    #[error("read failed in {stage} after {received} of {expected} bytes")]
    Read {
        stage: ReadStage,
        received: usize,
        expected: usize,
    },

    /// The connection accepted zero bytes before the reply was complete.
    #[error("write failed after {written} of {expected} bytes")]
    Write { written: usize, expected: usize },

    /// A buffer could not be grown to the requested size.
    #[error("failed to allocate {size} bytes")]
    Alloc { size: usize },

    /// No method is registered for the selector.
    #[error("unimplemented call: selector {0}")]
    UnimplCall(u32),

    /// A handler reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// The announced message length exceeds the configured maximum.
    #[error("message size {len} exceeds maximum {max}")]
    MessageTooLarge { len: u32, max: u32 },

    /// The response body does not fit into a reply frame.
    #[error("response size {0} does not fit in a reply frame")]
    ResponseTooLarge(usize),

    /// Message bytes do not match the expected layout.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value cannot be represented in the packed layout.
    #[error("encode error: {0}")]
    Encode(String),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// JSON serialization error (schema output).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The remote side answered with a failure status.
    #[error("remote call failed")]
    Remote,
}

impl RpcError {
    /// Shorthand for a handler-level failure.
    pub fn backend(message: impl Into<String>) -> Self {
        RpcError::Backend(message.into())
    }

    /// True when the peer closed the stream cleanly between frames.
    ///
    /// This is still a `Read` error; it only tells a graceful shutdown apart
    /// from a stream that died in the middle of a frame.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(
            self,
            RpcError::Read {
                stage: ReadStage::Length,
                received: 0,
                ..
            }
        )
    }

    /// True for errors that abandon the transaction on the stream itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RpcError::Read { .. }
                | RpcError::Write { .. }
                | RpcError::Alloc { .. }
                | RpcError::MessageTooLarge { .. }
        )
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_stream_only_at_frame_start() {
        let clean = RpcError::Read {
            stage: ReadStage::Length,
            received: 0,
            expected: 4,
        };
        assert!(clean.is_end_of_stream());

        let torn_prefix = RpcError::Read {
            stage: ReadStage::Length,
            received: 2,
            expected: 4,
        };
        assert!(!torn_prefix.is_end_of_stream());

        let torn_payload = RpcError::Read {
            stage: ReadStage::Payload,
            received: 0,
            expected: 10,
        };
        assert!(!torn_payload.is_end_of_stream());
    }

    #[test]
    fn test_transport_classification() {
        assert!(RpcError::Write {
            written: 0,
            expected: 5
        }
        .is_transport());
        assert!(RpcError::Alloc { size: 1 }.is_transport());
        assert!(!RpcError::UnimplCall(7).is_transport());
        assert!(!RpcError::backend("boom").is_transport());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            RpcError::UnimplCall(3).to_string(),
            "unimplemented call: selector 3"
        );
        assert_eq!(
            RpcError::MessageTooLarge { len: 10, max: 5 }.to_string(),
            "message size 10 exceeds maximum 5"
        );
        let read = RpcError::Read {
            stage: ReadStage::Payload,
            received: 1,
            expected: 8,
        };
        assert_eq!(read.to_string(), "read failed in payload after 1 of 8 bytes");
    }
}
