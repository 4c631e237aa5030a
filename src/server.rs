//! Server framing and poll loop.
//!
//! The [`Server`] owns the connection binding, the input buffer, the
//! [`Backend`] and the context handed to handlers. Each [`Server::poll`] is
//! one transaction:
//! 1. Read the 4-byte length prefix
//! 2. Grow the input buffer if needed and read the payload
//! 3. Dispatch to the backend
//! 4. Write `[length][status]` and, on success, the body
//!
//! Handler failures are reported to the peer with status 1 and do not fail
//! `poll`. Transport failures abandon the transaction and are returned.
//!
//! # Example
//!
//! ```
//! use rpcwire::connection::StdioConnection;
//! use rpcwire::server::ServerBuilder;
//!
//! struct Ctx {
//!     working: bool,
//! }
//!
//! // One ping frame (length 0), then end of stream
//! let input: &[u8] = &0u32.to_ne_bytes();
//! let conn = StdioConnection::new(input, Vec::new());
//!
//! let mut server = ServerBuilder::new()
//!     .method("stop", |ctx: &mut Ctx, (): ()| {
//!         ctx.working = false;
//!         Ok(())
//!     })
//!     .build(conn, Ctx { working: true })
//!     .unwrap();
//!
//! server.serve_while(|ctx| ctx.working).unwrap();
//!
//! let (conn, _) = server.into_parts();
//! let (_, output) = conn.into_inner();
//! assert_eq!(output, [1u32.to_ne_bytes().as_slice(), &[0]].concat());
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::Backend;
use crate::codec::{Pack, Unpack};
use crate::connection::{read_exact, write_all, Connection};
use crate::error::{ReadStage, Result, RpcError};
use crate::handler::{HandlerRegistry, Response};
use crate::protocol::{
    GrowBuffer, ReplyHeader, Status, DEFAULT_INPUT_CAPACITY, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_RESPONSE_CAPACITY, LENGTH_PREFIX_SIZE,
};

/// Buffer sizes and limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Initial input buffer capacity. Default: 1 MiB
    pub input_capacity: usize,
    /// Initial response buffer capacity. Default: 1 KiB
    pub response_capacity: usize,
    /// Largest accepted request payload. Default: 1 GiB
    pub max_message_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            input_capacity: DEFAULT_INPUT_CAPACITY,
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Request/response server over one connection.
pub struct Server<Conn, Ctx> {
    conn: Conn,
    input: GrowBuffer,
    backend: Backend<Ctx>,
    ctx: Ctx,
    max_message_size: u32,
}

impl<Conn: Connection, Ctx> Server<Conn, Ctx> {
    /// Create a server with default buffer sizes.
    pub fn new(conn: Conn, registry: HandlerRegistry<Ctx>, ctx: Ctx) -> Result<Self> {
        Self::with_config(conn, registry, ctx, ServerConfig::default())
    }

    /// Create a server with explicit buffer sizes.
    pub fn with_config(
        conn: Conn,
        registry: HandlerRegistry<Ctx>,
        ctx: Ctx,
        config: ServerConfig,
    ) -> Result<Self> {
        // The input buffer must at least hold a length prefix.
        let input = GrowBuffer::with_capacity(config.input_capacity.max(LENGTH_PREFIX_SIZE))?;
        let backend = Backend::with_capacity(registry, config.response_capacity)?;

        tracing::debug!(
            methods = backend.registry().len(),
            input_capacity = input.capacity(),
            "server created"
        );

        Ok(Self {
            conn,
            input,
            backend,
            ctx,
            max_message_size: config.max_message_size,
        })
    }

    /// Perform exactly one request/response transaction.
    ///
    /// # Errors
    ///
    /// - `Read` if the connection delivers zero bytes before the request is
    ///   complete; nothing is written
    /// - `MessageTooLarge` if the announced length exceeds the limit; the
    ///   payload is left unread
    /// - `Alloc` if the input buffer cannot grow; it keeps its old size
    /// - `Write` if the connection accepts zero bytes of the reply
    pub fn poll(&mut self) -> Result<()> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        read_exact(&mut self.conn, &mut prefix, ReadStage::Length)?;
        let len = u32::from_ne_bytes(prefix);

        if len > self.max_message_size {
            tracing::warn!(len, max = self.max_message_size, "message too large");
            return Err(RpcError::MessageTooLarge {
                len,
                max: self.max_message_size,
            });
        }

        let payload = self.input.grow_to(len as usize)?;
        read_exact(&mut self.conn, payload, ReadStage::Payload)?;
        tracing::trace!(len, "request received");

        let (status, body) = match self.backend.handle(&mut self.ctx, payload) {
            Ok(body) => (Status::Ok, body),
            Err(e) => {
                tracing::debug!("call failed: {}", e);
                (Status::Error, &[][..])
            }
        };

        let header = match ReplyHeader::for_body(status, body.len()) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!("reply not representable: {}", e);
                ReplyHeader::for_body(Status::Error, 0)?
            }
        };

        write_all(&mut self.conn, &header.encode())?;
        write_all(&mut self.conn, &body[..header.body_len()])?;
        tracing::trace!(len = header.length, status = ?header.status, "reply sent");
        Ok(())
    }

    /// Serve until the peer closes the stream or a transport error occurs.
    pub fn serve(&mut self) -> Result<()> {
        self.serve_while(|_| true)
    }

    /// Serve while `keep_going` holds for the context.
    ///
    /// The predicate is checked before every transaction. A clean close
    /// between frames ends the loop with `Ok`.
    pub fn serve_while<P>(&mut self, mut keep_going: P) -> Result<()>
    where
        P: FnMut(&Ctx) -> bool,
    {
        while keep_going(&self.ctx) {
            match self.poll() {
                Ok(()) => {}
                Err(e) if e.is_end_of_stream() => {
                    tracing::debug!("peer closed the stream");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!("transaction abandoned: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn context(&self) -> &Ctx {
        &self.ctx
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut Ctx {
        &mut self.ctx
    }

    /// Current input buffer capacity.
    #[inline]
    pub fn input_capacity(&self) -> usize {
        self.input.capacity()
    }

    #[inline]
    pub fn backend(&self) -> &Backend<Ctx> {
        &self.backend
    }

    /// Give back the connection and the context.
    pub fn into_parts(self) -> (Conn, Ctx) {
        (self.conn, self.ctx)
    }
}

/// Builder for configuring and creating a [`Server`].
///
/// Methods get selectors in the order they are added.
pub struct ServerBuilder<Ctx> {
    registry: HandlerRegistry<Ctx>,
    config: ServerConfig,
}

impl<Ctx> ServerBuilder<Ctx> {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: ServerConfig::default(),
        }
    }

    /// Register a method using the packed layout.
    pub fn method<F, A, R>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut Ctx, A) -> Result<R> + Send + Sync + 'static,
        A: Unpack + 'static,
        R: Pack + 'static,
    {
        self.registry.register(name, handler);
        self
    }

    /// Register a method using MsgPack.
    pub fn method_msgpack<F, A, R>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut Ctx, A) -> Result<R> + Send + Sync + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        self.registry.register_msgpack(name, handler);
        self
    }

    /// Register a method working on raw bytes.
    pub fn method_raw<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut Ctx, &[u8], &mut Response<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.registry.register_raw(name, handler);
        self
    }

    /// Set the initial input buffer capacity.
    ///
    /// Default: 1 MiB
    pub fn input_capacity(mut self, capacity: usize) -> Self {
        self.config.input_capacity = capacity;
        self
    }

    /// Set the initial response buffer capacity.
    ///
    /// Default: 1 KiB
    pub fn response_capacity(mut self, capacity: usize) -> Self {
        self.config.response_capacity = capacity;
        self
    }

    /// Set the largest accepted request payload.
    ///
    /// Default: 1 GiB
    pub fn max_message_size(mut self, max: u32) -> Self {
        self.config.max_message_size = max;
        self
    }

    /// The registry built so far.
    pub fn registry(&self) -> &HandlerRegistry<Ctx> {
        &self.registry
    }

    /// Bind to a connection and a context.
    pub fn build<Conn: Connection>(self, conn: Conn, ctx: Ctx) -> Result<Server<Conn, Ctx>> {
        Server::with_config(conn, self.registry, ctx, self.config)
    }
}

impl<Ctx> Default for ServerBuilder<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
