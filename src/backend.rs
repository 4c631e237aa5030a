//! Backend dispatcher.
//!
//! The backend turns one request payload into one reply body:
//!
//! ```text
//! ┌──────────────────────┬─────────────────────────────┐
//! │ selector (1/2/4 B)   │ arguments (method encoding) │
//! └──────────────────────┴─────────────────────────────┘
//! ```
//!
//! The selector width is the smallest of 1, 2 or 4 bytes that can number
//! every registered method. The body is written into a response buffer owned
//! by the backend and reused across calls; it only ever grows.
//!
//! An empty payload is a ping and succeeds with an empty body.

use crate::error::{Result, RpcError};
use crate::handler::{alloc_in, HandlerRegistry, Response};
use crate::protocol::{GrowBuffer, SelectorWidth, DEFAULT_RESPONSE_CAPACITY};

/// Decodes payloads into method calls and owns the response buffer.
pub struct Backend<Ctx> {
    registry: HandlerRegistry<Ctx>,
    response: GrowBuffer,
}

impl<Ctx> Backend<Ctx> {
    /// Create a backend with the default response capacity (1 KiB).
    pub fn new(registry: HandlerRegistry<Ctx>) -> Result<Self> {
        Self::with_capacity(registry, DEFAULT_RESPONSE_CAPACITY)
    }

    /// Create a backend with a preallocated response buffer.
    pub fn with_capacity(registry: HandlerRegistry<Ctx>, response_capacity: usize) -> Result<Self> {
        Ok(Self {
            registry,
            response: GrowBuffer::with_capacity(response_capacity)?,
        })
    }

    /// Region of exactly `size` bytes in the response buffer.
    ///
    /// Reuses the buffer when it is large enough; otherwise a new buffer is
    /// allocated before the old one is released, so on failure the previous
    /// buffer stays valid.
    ///
    /// # Errors
    ///
    /// - `ResponseTooLarge` if `size` cannot be framed in a reply
    ///   (above `u32::MAX - 1`); nothing is allocated
    /// - `Alloc` if the allocation itself fails
    ///
    /// Both are allocation failures of the response buffer and leave it as
    /// it was.
    pub fn alloc_response(&mut self, size: usize) -> Result<&mut [u8]> {
        alloc_in(&mut self.response, size)
    }

    /// Current response buffer capacity.
    #[inline]
    pub fn response_capacity(&self) -> usize {
        self.response.capacity()
    }

    #[inline]
    pub fn registry(&self) -> &HandlerRegistry<Ctx> {
        &self.registry
    }

    #[inline]
    pub fn selector_width(&self) -> SelectorWidth {
        self.registry.selector_width()
    }

    /// Dispatch one payload and return the reply body.
    ///
    /// # Errors
    ///
    /// - `Decode` if the payload is shorter than a selector or the arguments
    ///   do not match the method
    /// - `UnimplCall` if no method has the selector
    /// - whatever the handler returns
    pub fn handle(&mut self, ctx: &mut Ctx, message: &[u8]) -> Result<&[u8]> {
        if message.is_empty() {
            tracing::trace!("ping");
            return Ok(&[]);
        }

        let width = self.registry.selector_width();
        let selector = width.decode(message).ok_or_else(|| {
            RpcError::Decode(format!(
                "message of {} bytes is shorter than a {}-byte selector",
                message.len(),
                width.size()
            ))
        })?;

        let handler = self
            .registry
            .get_handler_by_selector(selector)
            .ok_or(RpcError::UnimplCall(selector))?;

        let mut response = Response::new(&mut self.response);
        if let Err(e) = handler.call(ctx, &message[width.size()..], &mut response) {
            tracing::debug!(
                selector,
                method = self.registry.name(selector).unwrap_or_default(),
                "handler failed: {}",
                e
            );
            return Err(e);
        }

        let len = response.len();
        Ok(self.response.prefix(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Direction, PackedCodec};

    #[derive(Default)]
    struct Ctx {
        seen: Vec<i32>,
    }

    fn backend() -> Backend<Ctx> {
        let mut registry = HandlerRegistry::new();
        registry.register("record", |ctx: &mut Ctx, n: i32| {
            ctx.seen.push(n);
            Ok(())
        });
        registry.register("double", |_: &mut Ctx, n: i32| Ok(n * 2));
        registry.register("fail", |_: &mut Ctx, (): ()| -> Result<()> {
            Err(RpcError::backend("refused"))
        });
        Backend::new(registry).unwrap()
    }

    fn request(selector: u8, args: &[u8]) -> Vec<u8> {
        let mut message = vec![selector];
        message.extend_from_slice(args);
        message
    }

    #[test]
    fn test_default_response_capacity() {
        assert_eq!(backend().response_capacity(), 1024);
    }

    #[test]
    fn test_alloc_response_never_shrinks() {
        let mut backend = backend();
        assert_eq!(backend.alloc_response(100).unwrap().len(), 100);
        assert_eq!(backend.alloc_response(5000).unwrap().len(), 5000);
        assert_eq!(backend.alloc_response(100).unwrap().len(), 100);
        assert_eq!(backend.response_capacity(), 5000);
    }

    #[test]
    fn test_unframeable_response_keeps_buffer() {
        let mut backend = backend();
        backend.alloc_response(16).unwrap().copy_from_slice(b"0123456789abcdef");

        let err = backend.alloc_response(usize::MAX).unwrap_err();
        assert!(matches!(err, RpcError::ResponseTooLarge(size) if size == usize::MAX));
        assert_eq!(backend.response_capacity(), 1024);
        assert_eq!(backend.alloc_response(16).unwrap(), b"0123456789abcdef");
    }

    /// Compiles only if dispatch places no bound on the context type.
    fn body_len_for_any<C>(backend: &mut Backend<C>, ctx: &mut C, message: &[u8]) -> Result<usize> {
        backend.handle(ctx, message).map(|body| body.len())
    }

    #[test]
    fn test_dispatch_is_generic_over_context() {
        let mut backend = backend();
        let mut ctx = Ctx::default();
        let doubled = request(1, &3i32.to_ne_bytes());
        assert_eq!(body_len_for_any(&mut backend, &mut ctx, &doubled).unwrap(), 4);
        assert_eq!(body_len_for_any(&mut backend, &mut ctx, &[]).unwrap(), 0);
    }

    #[test]
    fn test_ping() {
        let mut backend = backend();
        let mut ctx = Ctx::default();
        assert!(backend.handle(&mut ctx, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_by_selector() {
        let mut backend = backend();
        let mut ctx = Ctx::default();

        let body = backend
            .handle(&mut ctx, &request(1, &21i32.to_ne_bytes()))
            .unwrap();
        assert_eq!(body, 42i32.to_ne_bytes());

        let body = backend
            .handle(&mut ctx, &request(0, &7i32.to_ne_bytes()))
            .unwrap();
        assert!(body.is_empty());
        assert_eq!(ctx.seen, vec![7]);
    }

    #[test]
    fn test_unknown_selector() {
        let mut backend = backend();
        let mut ctx = Ctx::default();
        let err = backend.handle(&mut ctx, &[3]).unwrap_err();
        assert!(matches!(err, RpcError::UnimplCall(3)));
    }

    #[test]
    fn test_handler_failure_is_returned() {
        let mut backend = backend();
        let mut ctx = Ctx::default();
        let err = backend.handle(&mut ctx, &[2]).unwrap_err();
        assert!(matches!(err, RpcError::Backend(_)));
    }

    #[test]
    fn test_truncated_arguments() {
        let mut backend = backend();
        let mut ctx = Ctx::default();
        let err = backend.handle(&mut ctx, &request(0, &[1, 2])).unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
        assert!(ctx.seen.is_empty());
    }

    #[test]
    fn test_wide_selectors() {
        let mut registry = HandlerRegistry::<Ctx>::new();
        for i in 0..300 {
            registry.register(&format!("m{}", i), move |_: &mut Ctx, (): ()| Ok(i as u16));
        }
        let mut backend = Backend::new(registry).unwrap();
        assert_eq!(backend.selector_width(), SelectorWidth::U16);

        let mut ctx = Ctx::default();
        let body = backend.handle(&mut ctx, &299u16.to_ne_bytes()).unwrap();
        assert_eq!(body, 299u16.to_ne_bytes());

        let err = backend.handle(&mut ctx, &[1]).unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }

    #[test]
    fn test_large_result_grows_response() {
        let mut registry = HandlerRegistry::<Ctx>::new();
        registry.register_raw("fill", |_: &mut Ctx, args: &[u8], response: &mut Response<'_>| {
            let size: u32 = PackedCodec::decode(args, Direction::Args)?;
            response.alloc(size as usize)?.fill(0x5A);
            Ok(())
        });
        let mut backend = Backend::new(registry).unwrap();
        let mut ctx = Ctx::default();

        let body = backend
            .handle(&mut ctx, &request(0, &4096u32.to_ne_bytes()))
            .unwrap();
        assert_eq!(body.len(), 4096);
        assert!(body.iter().all(|&b| b == 0x5A));
        assert_eq!(backend.response_capacity(), 4096);

        let body = backend
            .handle(&mut ctx, &request(0, &8u32.to_ne_bytes()))
            .unwrap();
        assert_eq!(body.len(), 8);
        assert_eq!(backend.response_capacity(), 4096);
    }
}
