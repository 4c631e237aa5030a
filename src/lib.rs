//! # rpcwire
//!
//! Length-prefixed request/response transport with a table-driven
//! dispatcher.
//!
//! A host supplies a byte-stream [`Connection`](connection::Connection)
//! (stdin/stdout of a child process, a socket, ...). The [`Server`] turns it
//! into discrete transactions, the [`Backend`] decodes each payload into a
//! call of a registered method and writes the result into a reusable
//! response buffer.
//!
//! ## Wire format
//!
//! ```text
//! Request:  [u32 length L][L bytes: selector | arguments]
//! Response: [u32 length R][u8 status][R-1 bytes body]   (body only if status == 0)
//! ```
//!
//! Integers are in native byte order; both ends run on the same host.
//!
//! ## Example
//!
//! ```no_run
//! use rpcwire::connection::StdioConnection;
//! use rpcwire::ServerBuilder;
//!
//! struct Ctx {
//!     working: bool,
//! }
//!
//! fn main() -> rpcwire::Result<()> {
//!     let mut server = ServerBuilder::new()
//!         .method("add", |_: &mut Ctx, (a, b): (i32, i32)| Ok(a + b))
//!         .method("stop", |ctx: &mut Ctx, (): ()| {
//!             ctx.working = false;
//!             Ok(())
//!         })
//!         .build(StdioConnection::std(), Ctx { working: true })?;
//!
//!     server.serve_while(|ctx| ctx.working)
//! }
//! ```

pub mod backend;
pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod server;

pub use backend::Backend;
pub use client::Client;
pub use error::{Result, RpcError};
pub use handler::{HandlerRegistry, Response};
pub use server::{Server, ServerBuilder, ServerConfig};
