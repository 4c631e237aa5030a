//! Growable byte buffer reused across transactions.
//!
//! Both the server input buffer and the backend response buffer are
//! `GrowBuffer`s. The only mutating operation is [`GrowBuffer::grow_to`]:
//!
//! - if the request fits, the existing allocation is handed out again
//! - otherwise a new allocation of exactly the requested size is made first
//!   and only then replaces the old one
//!
//! Capacity therefore never shrinks, and a failed allocation leaves the
//! buffer exactly as it was.
//!
//! # Example
//!
//! ```
//! use rpcwire::protocol::GrowBuffer;
//!
//! let mut buffer = GrowBuffer::with_capacity(16).unwrap();
//! buffer.grow_to(64).unwrap();
//! buffer.grow_to(8).unwrap();
//! assert_eq!(buffer.capacity(), 64);
//! ```

use crate::error::{Result, RpcError};

/// Owned byte buffer with a monotonically non-decreasing capacity.
#[derive(Debug)]
pub struct GrowBuffer {
    /// Backing storage, `data.len()` is the capacity.
    data: Vec<u8>,
}

impl GrowBuffer {
    /// Empty buffer; the first `grow_to` allocates.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Allocate a zeroed buffer of exactly `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            data: allocate(capacity)?,
        })
    }

    /// Current capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Ensure room for `size` bytes and return exactly that many.
    ///
    /// Contents of the returned region are unspecified: callers overwrite it.
    pub fn grow_to(&mut self, size: usize) -> Result<&mut [u8]> {
        if size > self.data.len() {
            let fresh = allocate(size)?;
            tracing::debug!(from = self.data.len(), to = size, "buffer grown");
            self.data = fresh;
        }
        Ok(&mut self.data[..size])
    }

    /// View the first `len` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the capacity.
    #[inline]
    pub fn prefix(&self, len: usize) -> &[u8] {
        &self.data[..len]
    }
}

impl Default for GrowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallible exact-size allocation.
fn allocate(size: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(size)
        .map_err(|_| RpcError::Alloc { size })?;
    data.resize(size, 0);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_capacity_is_exact() {
        let buffer = GrowBuffer::with_capacity(1024).unwrap();
        assert_eq!(buffer.capacity(), 1024);
    }

    #[test]
    fn test_grow_to_fits_exactly() {
        let mut buffer = GrowBuffer::with_capacity(4).unwrap();
        let region = buffer.grow_to(100).unwrap();
        assert_eq!(region.len(), 100);
        assert_eq!(buffer.capacity(), 100);
    }

    #[test]
    fn test_capacity_never_shrinks() {
        let mut buffer = GrowBuffer::with_capacity(10).unwrap();
        buffer.grow_to(20).unwrap();
        buffer.grow_to(50).unwrap();
        let region = buffer.grow_to(20).unwrap();
        assert_eq!(region.len(), 20);
        assert_eq!(buffer.capacity(), 50);
    }

    #[test]
    fn test_reuse_keeps_contents() {
        let mut buffer = GrowBuffer::with_capacity(8).unwrap();
        buffer.grow_to(4).unwrap().copy_from_slice(b"abcd");
        buffer.grow_to(2).unwrap();
        assert_eq!(buffer.prefix(4), b"abcd");
    }

    #[test]
    fn test_new_is_empty() {
        let mut buffer = GrowBuffer::new();
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(buffer.grow_to(3).unwrap().len(), 3);
    }

    #[test]
    fn test_zero_size() {
        let mut buffer = GrowBuffer::with_capacity(0).unwrap();
        assert!(buffer.grow_to(0).unwrap().is_empty());
        assert_eq!(buffer.capacity(), 0);
    }

    #[test]
    fn test_failed_allocation_leaves_buffer_intact() {
        let mut buffer = GrowBuffer::with_capacity(8).unwrap();
        buffer.grow_to(8).unwrap().copy_from_slice(b"12345678");

        let err = buffer.grow_to(usize::MAX).unwrap_err();
        assert!(matches!(err, RpcError::Alloc { size } if size == usize::MAX));
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.prefix(8), b"12345678");
    }
}
