//! Response writer handed to handlers.
//!
//! A handler produces its result by allocating a region of the backend's
//! response buffer and filling it. The reply body is exactly the most
//! recently allocated region; a handler that allocates nothing returns an
//! empty body.
//!
//! # Example
//!
//! ```
//! use rpcwire::handler::Response;
//! use rpcwire::protocol::GrowBuffer;
//!
//! let mut buffer = GrowBuffer::with_capacity(4).unwrap();
//! let mut response = Response::new(&mut buffer);
//! response.write(b"pong!").unwrap();
//! assert_eq!(response.len(), 5);
//! ```

use crate::error::{Result, RpcError};
use crate::protocol::{GrowBuffer, MAX_RESPONSE_SIZE};

/// Write access to the response buffer for one call.
pub struct Response<'a> {
    buffer: &'a mut GrowBuffer,
    len: usize,
}

impl<'a> Response<'a> {
    /// Start an empty response backed by `buffer`.
    pub fn new(buffer: &'a mut GrowBuffer) -> Self {
        Self { buffer, len: 0 }
    }

    /// Reserve exactly `size` bytes of body and return them for filling.
    ///
    /// Replaces any previously allocated region.
    pub fn alloc(&mut self, size: usize) -> Result<&mut [u8]> {
        let region = alloc_in(self.buffer, size)?;
        self.len = size;
        Ok(region)
    }

    /// Use `bytes` as the whole body.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.alloc(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Current body length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Grow `buffer` to hold a body of `size` bytes.
///
/// Bodies that cannot be framed are refused before anything is allocated.
pub(crate) fn alloc_in(buffer: &mut GrowBuffer, size: usize) -> Result<&mut [u8]> {
    if size > MAX_RESPONSE_SIZE {
        return Err(RpcError::ResponseTooLarge(size));
    }
    if size <= buffer.capacity() {
        tracing::trace!(size, capacity = buffer.capacity(), "response reused");
    } else {
        tracing::debug!(size, "response allocated");
    }
    buffer.grow_to(size)
}
