//! Connection over a `std::io` reader/writer pair.
//!
//! The usual deployment is a child process serving requests on stdin and
//! answering on stdout.
//!
//! # Important
//!
//! - **stdout**: reply frames only
//! - **stderr**: logs, debug output
//! - **Never use `println!`** in a process served this way: it corrupts the
//!   reply stream

use std::io::{self, Read, Stdin, Stdout, Write};

use super::Connection;

/// Adapter turning any `Read` + `Write` pair into a [`Connection`].
///
/// Writes are flushed immediately, the peer waits for complete replies.
#[derive(Debug)]
pub struct StdioConnection<R, W> {
    from_client: R,
    to_client: W,
}

impl StdioConnection<Stdin, Stdout> {
    /// Serve on the process' stdin and stdout.
    pub fn std() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R, W> StdioConnection<R, W> {
    /// Wrap a reader (requests) and a writer (replies).
    pub fn new(from_client: R, to_client: W) -> Self {
        Self {
            from_client,
            to_client,
        }
    }

    /// Give back the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.from_client, self.to_client)
    }
}

impl<R: Read, W: Write> Connection for StdioConnection<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        loop {
            match self.from_client.read(buf) {
                Ok(n) => return n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("connection read failed: {}", e);
                    return 0;
                }
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let written = loop {
            match self.to_client.write(buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("connection write failed: {}", e);
                    return 0;
                }
            }
        };

        if written > 0 {
            if let Err(e) = self.to_client.flush() {
                tracing::debug!("connection flush failed: {}", e);
                return 0;
            }
        }
        written
    }
}
