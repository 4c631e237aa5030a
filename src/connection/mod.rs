//! Connection module - the byte stream the server talks over.
//!
//! A [`Connection`] is supplied by the host. The core only needs two
//! capabilities: read some bytes and write some bytes. Short reads and
//! writes count as progress; a return of zero means the stream is unusable
//! for the rest of the current transaction.
//!
//! # Example
//!
//! ```
//! use rpcwire::connection::{Connection, StdioConnection};
//!
//! let input: &[u8] = b"ping";
//! let mut conn = StdioConnection::new(input, Vec::new());
//! let mut buf = [0u8; 4];
//! assert_eq!(conn.read(&mut buf), 4);
//! assert_eq!(conn.write(b"pong"), 4);
//! ```

mod stdio;

pub use stdio::StdioConnection;

use crate::error::{ReadStage, Result, RpcError};

/// Byte-stream capability consumed by the server and the client.
pub trait Connection {
    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Zero signals end-of-stream or an error.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write up to `buf.len()` bytes, returning how many were written.
    ///
    /// Zero signals an error.
    fn write(&mut self, buf: &[u8]) -> usize;
}

impl<C: Connection + ?Sized> Connection for &mut C {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    #[inline]
    fn write(&mut self, buf: &[u8]) -> usize {
        (**self).write(buf)
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    #[inline]
    fn write(&mut self, buf: &[u8]) -> usize {
        (**self).write(buf)
    }
}

/// Fill `buf` completely, looping over partial reads.
///
/// An empty `buf` performs no read at all.
pub fn read_exact<C: Connection + ?Sized>(
    conn: &mut C,
    buf: &mut [u8],
    stage: ReadStage,
) -> Result<()> {
    let mut received = 0;
    while received < buf.len() {
        let n = conn.read(&mut buf[received..]);
        if n == 0 {
            return Err(RpcError::Read {
                stage,
                received,
                expected: buf.len(),
            });
        }
        received += n;
    }
    Ok(())
}

/// Write all of `buf`, looping over partial writes.
pub fn write_all<C: Connection + ?Sized>(conn: &mut C, buf: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        let n = conn.write(&buf[written..]);
        if n == 0 {
            return Err(RpcError::Write {
                written,
                expected: buf.len(),
            });
        }
        written += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `chunk` bytes per call and counts calls.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        reads: usize,
        written: Vec<u8>,
        write_budget: usize,
    }

    impl Trickle {
        fn new(data: &[u8], chunk: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                chunk,
                reads: 0,
                written: Vec::new(),
                write_budget: usize::MAX,
            }
        }
    }

    impl Connection for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> usize {
            self.reads += 1;
            let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            n
        }

        fn write(&mut self, buf: &[u8]) -> usize {
            let n = buf.len().min(self.chunk).min(self.write_budget);
            self.write_budget -= n;
            self.written.extend_from_slice(&buf[..n]);
            n
        }
    }

    #[test]
    fn test_read_exact_loops_on_partial_reads() {
        let mut conn = Trickle::new(b"abcdefgh", 3);
        let mut buf = [0u8; 8];
        read_exact(&mut conn, &mut buf, ReadStage::Payload).unwrap();
        assert_eq!(&buf, b"abcdefgh");
        assert_eq!(conn.reads, 3);
    }

    #[test]
    fn test_read_exact_empty_does_not_read() {
        let mut conn = Trickle::new(b"", 1);
        read_exact(&mut conn, &mut [], ReadStage::Payload).unwrap();
        assert_eq!(conn.reads, 0);
    }

    #[test]
    fn test_read_exact_reports_progress_on_failure() {
        let mut conn = Trickle::new(b"ab", 1);
        let mut buf = [0u8; 4];
        let err = read_exact(&mut conn, &mut buf, ReadStage::Length).unwrap_err();
        match err {
            RpcError::Read {
                stage,
                received,
                expected,
            } => {
                assert_eq!(stage, ReadStage::Length);
                assert_eq!(received, 2);
                assert_eq!(expected, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_all_loops_on_partial_writes() {
        let mut conn = Trickle::new(b"", 2);
        write_all(&mut conn, b"hello").unwrap();
        assert_eq!(conn.written, b"hello");
    }

    #[test]
    fn test_write_all_zero_write_is_error() {
        let mut conn = Trickle::new(b"", 2);
        conn.write_budget = 3;
        let err = write_all(&mut conn, b"hello").unwrap_err();
        assert!(matches!(
            err,
            RpcError::Write {
                written: 3,
                expected: 5
            }
        ));
    }

    #[test]
    fn test_mut_ref_is_a_connection() {
        let mut conn = Trickle::new(b"xy", 8);
        let mut borrowed = &mut conn;
        let mut buf = [0u8; 2];
        read_exact(&mut borrowed, &mut buf, ReadStage::Payload).unwrap();
        assert_eq!(&buf, b"xy");
    }
}
