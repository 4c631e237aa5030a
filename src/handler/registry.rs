//! Handler registry for dispatching calls by selector.
//!
//! The registry maps method names to handlers and assigns selectors.
//! Selectors are assigned sequentially starting from 0 in registration
//! order, so appending methods never renumbers older ones.
//!
//! # Example
//!
//! ```
//! use rpcwire::handler::HandlerRegistry;
//!
//! struct Counter {
//!     total: i64,
//! }
//!
//! let mut registry = HandlerRegistry::<Counter>::new();
//!
//! registry.register("add", |ctx: &mut Counter, n: i32| {
//!     ctx.total += n as i64;
//!     Ok(ctx.total)
//! });
//! registry.register("reset", |ctx: &mut Counter, (): ()| {
//!     ctx.total = 0;
//!     Ok(())
//! });
//!
//! assert_eq!(registry.selector("reset"), Some(1));
//! let schema = registry.build_schema();
//! assert_eq!(schema.selector_width, 1);
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Encoding, Response, Schema};
use crate::codec::{Direction, MsgPackCodec, Pack, PackedCodec, Unpack};
use crate::error::Result;
use crate::protocol::SelectorWidth;

/// Trait for method handlers.
pub trait Handler<Ctx>: Send + Sync {
    /// Handle one call with the argument bytes that follow the selector.
    fn call(&self, ctx: &mut Ctx, args: &[u8], response: &mut Response<'_>) -> Result<()>;
}

/// Wrapper that unpacks arguments and packs the result in the native layout.
pub struct PackedHandler<F, A, R> {
    handler: F,
    _phantom: PhantomData<fn(A) -> R>,
}

impl<F, A, R> PackedHandler<F, A, R> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<Ctx, F, A, R> Handler<Ctx> for PackedHandler<F, A, R>
where
    F: Fn(&mut Ctx, A) -> Result<R> + Send + Sync + 'static,
    A: Unpack + 'static,
    R: Pack + 'static,
{
    fn call(&self, ctx: &mut Ctx, args: &[u8], response: &mut Response<'_>) -> Result<()> {
        let parsed: A = PackedCodec::decode(args, Direction::Args)?;
        let result = (self.handler)(ctx, parsed)?;

        let region = response.alloc(PackedCodec::encoded_len(&result, Direction::Result))?;
        PackedCodec::encode_into(&result, region, Direction::Result)
    }
}

/// Wrapper that speaks MsgPack for arguments and result.
pub struct MsgPackHandler<F, A, R> {
    handler: F,
    _phantom: PhantomData<fn(A) -> R>,
}

impl<F, A, R> MsgPackHandler<F, A, R> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<Ctx, F, A, R> Handler<Ctx> for MsgPackHandler<F, A, R>
where
    F: Fn(&mut Ctx, A) -> Result<R> + Send + Sync + 'static,
    A: DeserializeOwned + 'static,
    R: Serialize + 'static,
{
    fn call(&self, ctx: &mut Ctx, args: &[u8], response: &mut Response<'_>) -> Result<()> {
        let parsed: A = MsgPackCodec::decode(args)?;
        let result = (self.handler)(ctx, parsed)?;
        response.write(&MsgPackCodec::encode(&result)?)
    }
}

/// Wrapper for handlers that work on the bytes directly.
pub struct RawHandler<F> {
    handler: F,
}

impl<F> RawHandler<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<Ctx, F> Handler<Ctx> for RawHandler<F>
where
    F: Fn(&mut Ctx, &[u8], &mut Response<'_>) -> Result<()> + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Ctx, args: &[u8], response: &mut Response<'_>) -> Result<()> {
        (self.handler)(ctx, args, response)
    }
}

/// Entry for a registered method.
struct MethodEntry<Ctx> {
    name: String,
    encoding: Encoding,
    handler: Box<dyn Handler<Ctx>>,
}

/// Registry mapping selectors and names to handlers.
pub struct HandlerRegistry<Ctx> {
    /// Methods in selector order.
    methods: Vec<MethodEntry<Ctx>>,
    /// Selector by method name.
    selectors: HashMap<String, u32>,
}

impl<Ctx> HandlerRegistry<Ctx> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            selectors: HashMap::new(),
        }
    }

    /// Register a method using the packed layout.
    ///
    /// Single-argument methods take the argument directly; several arguments
    /// arrive as a tuple in declaration order.
    pub fn register<F, A, R>(&mut self, name: &str, handler: F) -> u32
    where
        F: Fn(&mut Ctx, A) -> Result<R> + Send + Sync + 'static,
        A: Unpack + 'static,
        R: Pack + 'static,
    {
        self.insert(name, Encoding::Packed, Box::new(PackedHandler::new(handler)))
    }

    /// Register a method whose arguments and result are MsgPack.
    pub fn register_msgpack<F, A, R>(&mut self, name: &str, handler: F) -> u32
    where
        F: Fn(&mut Ctx, A) -> Result<R> + Send + Sync + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        self.insert(name, Encoding::MsgPack, Box::new(MsgPackHandler::new(handler)))
    }

    /// Register a method that reads argument bytes and fills the response itself.
    pub fn register_raw<F>(&mut self, name: &str, handler: F) -> u32
    where
        F: Fn(&mut Ctx, &[u8], &mut Response<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(name, Encoding::Raw, Box::new(RawHandler::new(handler)))
    }

    /// Add or replace a method, returning its selector.
    pub fn insert(&mut self, name: &str, encoding: Encoding, handler: Box<dyn Handler<Ctx>>) -> u32 {
        if let Some(&selector) = self.selectors.get(name) {
            tracing::debug!(name, selector, "replacing handler");
            let entry = &mut self.methods[selector as usize];
            entry.encoding = encoding;
            entry.handler = handler;
            return selector;
        }

        let selector = self.methods.len() as u32;
        self.methods.push(MethodEntry {
            name: name.to_string(),
            encoding,
            handler,
        });
        self.selectors.insert(name.to_string(), selector);
        selector
    }

    /// Get a handler by selector.
    pub fn get_handler_by_selector(&self, selector: u32) -> Option<&dyn Handler<Ctx>> {
        self.methods
            .get(selector as usize)
            .map(|e| e.handler.as_ref())
    }

    /// Get a handler by method name.
    pub fn get_handler(&self, name: &str) -> Option<&dyn Handler<Ctx>> {
        self.selector(name)
            .and_then(|selector| self.get_handler_by_selector(selector))
    }

    /// Get selector by method name.
    pub fn selector(&self, name: &str) -> Option<u32> {
        self.selectors.get(name).copied()
    }

    /// Get method name by selector.
    pub fn name(&self, selector: u32) -> Option<&str> {
        self.methods
            .get(selector as usize)
            .map(|e| e.name.as_str())
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Selector width needed to number every registered method.
    pub fn selector_width(&self) -> SelectorWidth {
        SelectorWidth::for_count(self.methods.len())
    }

    /// Build a [`Schema`] from the registered methods.
    pub fn build_schema(&self) -> Schema {
        let mut schema = Schema::new(self.selector_width().size());
        for (selector, entry) in self.methods.iter().enumerate() {
            schema.add_method(&entry.name, selector as u32, entry.encoding);
        }
        schema
    }
}

impl<Ctx> Default for HandlerRegistry<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
