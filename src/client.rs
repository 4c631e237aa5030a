//! Calling side of the protocol.
//!
//! The [`Client`] speaks the same framing as the [`Server`](crate::Server)
//! from the other end of the connection:
//! 1. Prefix the arguments with the method selector
//! 2. Send `[length][payload]`
//! 3. Read `[length][status]` and, on success, the body
//!
//! A failure status comes back as [`RpcError::Remote`]; the server never
//! says more than that.
//!
//! # Example
//!
//! ```
//! use rpcwire::client::Client;
//! use rpcwire::connection::StdioConnection;
//! use rpcwire::protocol::{build_reply, SelectorWidth, Status};
//!
//! // Canned reply: status 0, body = 5i32
//! let reply = build_reply(Status::Ok, &5i32.to_ne_bytes()).unwrap();
//! let conn = StdioConnection::new(reply.as_slice(), Vec::new());
//!
//! let mut client = Client::new(conn, SelectorWidth::U8);
//! let sum: i32 = client.call(0, &(2i32, 3i32)).unwrap();
//! assert_eq!(sum, 5);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Direction, MsgPackCodec, Pack, PackedCodec, Unpack};
use crate::connection::{read_exact, write_all, Connection};
use crate::error::{ReadStage, Result, RpcError};
use crate::handler::Schema;
use crate::handler::PROTOCOL_VERSION;
use crate::protocol::{
    build_request, decode_length, GrowBuffer, ReplyHeader, SelectorWidth, Status,
    DEFAULT_MAX_MESSAGE_SIZE, LENGTH_PREFIX_SIZE, REPLY_HEADER_SIZE, STATUS_SIZE,
};

/// Blocking RPC client over one connection.
pub struct Client<Conn> {
    conn: Conn,
    width: SelectorWidth,
    /// Body of the last reply, reused across calls.
    reply: GrowBuffer,
    /// Largest accepted reply length.
    max_reply_size: u32,
}

impl<Conn: Connection> Client<Conn> {
    /// Create a client for a server whose selectors are `width` wide.
    pub fn new(conn: Conn, width: SelectorWidth) -> Self {
        Self {
            conn,
            width,
            reply: GrowBuffer::new(),
            max_reply_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Set the largest reply length accepted from the server.
    ///
    /// Default: 1 GiB
    pub fn max_reply_size(mut self, max: u32) -> Self {
        self.max_reply_size = max;
        self
    }

    /// Create a client matching a server's published schema.
    ///
    /// Fails with `Decode` if the schema describes another wire generation
    /// or an unsupported selector width.
    pub fn from_schema(conn: Conn, schema: &Schema) -> Result<Self> {
        if schema.version != PROTOCOL_VERSION {
            return Err(RpcError::Decode(format!(
                "schema is for protocol {}, expected {}",
                schema.version, PROTOCOL_VERSION
            )));
        }
        let width = SelectorWidth::from_size(schema.selector_width).ok_or_else(|| {
            RpcError::Decode(format!(
                "unsupported selector width {}",
                schema.selector_width
            ))
        })?;
        Ok(Self::new(conn, width))
    }

    #[inline]
    pub fn selector_width(&self) -> SelectorWidth {
        self.width
    }

    /// Call a packed-layout method.
    pub fn call<A, R>(&mut self, selector: u32, args: &A) -> Result<R>
    where
        A: Pack + ?Sized,
        R: Unpack,
    {
        let args_len = PackedCodec::encoded_len(args, Direction::Args);
        let mut payload = Vec::with_capacity(self.width.size() + args_len);
        self.width.encode_into(selector, &mut payload)?;

        let start = payload.len();
        payload.resize(start + args_len, 0);
        PackedCodec::encode_into(args, &mut payload[start..], Direction::Args)?;

        let body = self.transact(&payload)?;
        PackedCodec::decode(body, Direction::Result)
    }

    /// Call a MsgPack method.
    pub fn call_msgpack<A, R>(&mut self, selector: u32, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut payload = Vec::new();
        self.width.encode_into(selector, &mut payload)?;
        MsgPackCodec::encode_into(args, &mut payload)?;

        let body = self.transact(&payload)?;
        MsgPackCodec::decode(body)
    }

    /// Call a method with pre-encoded argument bytes and return the raw body.
    pub fn call_raw(&mut self, selector: u32, args: &[u8]) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(self.width.size() + args.len());
        self.width.encode_into(selector, &mut payload)?;
        payload.extend_from_slice(args);

        Ok(self.transact(&payload)?.to_vec())
    }

    /// Send an empty request; the server answers with an empty success.
    pub fn ping(&mut self) -> Result<()> {
        let body = self.transact(&[])?;
        if !body.is_empty() {
            return Err(RpcError::Decode(format!(
                "ping answered with {} body bytes",
                body.len()
            )));
        }
        Ok(())
    }

    /// Give back the connection.
    pub fn into_inner(self) -> Conn {
        self.conn
    }

    /// One request/reply exchange; returns the reply body.
    ///
    /// # Errors
    ///
    /// - `Write`/`Read` if the connection fails mid-exchange
    /// - `Remote` if the server answered with a failure status
    /// - `MessageTooLarge` if the announced reply exceeds the limit; the body
    ///   is left unread and the stream must be considered desynchronised
    /// - `Alloc` if the reply buffer cannot grow
    /// - `Decode` for a malformed envelope; its announced body is read and
    ///   discarded so the next call starts on a frame boundary
    fn transact(&mut self, payload: &[u8]) -> Result<&[u8]> {
        write_all(&mut self.conn, &build_request(payload)?)?;

        let mut head = [0u8; REPLY_HEADER_SIZE];
        let (prefix, status) = head.split_at_mut(LENGTH_PREFIX_SIZE);
        read_exact(&mut self.conn, prefix, ReadStage::Length)?;
        read_exact(&mut self.conn, status, ReadStage::Payload)?;

        let length = decode_length(&head).unwrap_or_default();
        if length > self.max_reply_size {
            tracing::warn!(length, max = self.max_reply_size, "reply too large");
            return Err(RpcError::MessageTooLarge {
                len: length,
                max: self.max_reply_size,
            });
        }

        let header = match ReplyHeader::decode(&head) {
            Ok(header) => header,
            Err(e) => {
                self.skip_body(length);
                return Err(e);
            }
        };
        if header.status == Status::Error {
            tracing::debug!("remote call failed");
            return Err(RpcError::Remote);
        }

        let len = header.body_len();
        let body = self.reply.grow_to(len)?;
        read_exact(&mut self.conn, body, ReadStage::Payload)?;
        tracing::trace!(len, "reply received");
        Ok(self.reply.prefix(len))
    }

    /// Consume the body announced by a rejected envelope.
    fn skip_body(&mut self, length: u32) {
        let len = length.saturating_sub(STATUS_SIZE as u32) as usize;
        let drained = self
            .reply
            .grow_to(len)
            .and_then(|body| read_exact(&mut self.conn, body, ReadStage::Payload));
        if let Err(e) = drained {
            tracing::debug!("could not skip rejected reply: {}", e);
        }
    }
}
