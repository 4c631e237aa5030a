//! Handler module - method table and dispatch targets.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps selectors and names to handlers
//! - [`Response`] - lets handlers fill the reply body
//! - [`Schema`] - JSON description of the method table
//!
//! # Example
//!
//! ```
//! use rpcwire::handler::{HandlerRegistry, Response};
//!
//! struct Ctx;
//!
//! let mut registry = HandlerRegistry::<Ctx>::new();
//!
//! // Packed layout: arguments and result in native byte order
//! registry.register("square", |_: &mut Ctx, n: u32| Ok(n * n));
//!
//! // Raw bytes in, raw bytes out
//! registry.register_raw("echo", |_: &mut Ctx, args: &[u8], response: &mut Response<'_>| {
//!     response.write(args)
//! });
//! ```

mod registry;
mod response;
mod schema;

pub use registry::{Handler, HandlerRegistry, MsgPackHandler, PackedHandler, RawHandler};
pub use response::Response;
pub(crate) use response::alloc_in;
pub use schema::{Encoding, MethodSchema, Schema, PROTOCOL_VERSION};
