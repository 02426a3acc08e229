//! Transport module - blocking byte-level link to the reader.
//!
//! The [`Transport`] trait is the seam between the protocol client and the
//! physical line. [`SerialTransport`] implements it over a serial port;
//! tests drive the client through in-memory implementations.

mod serial;

#[cfg(test)]
pub(crate) mod mock;

use bytes::Bytes;

use crate::error::Result;

pub use serial::{SerialLink, SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};

/// Blocking byte transport with a bounded read timeout.
///
/// Implementations own their handle exclusively; dropping the transport
/// releases it.
pub trait Transport {
    /// Write all of `bytes` to the line.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read up to `count` bytes.
    ///
    /// Returns fewer bytes (possibly none) when the read timeout expires.
    /// Never blocks indefinitely.
    fn receive(&mut self, count: usize) -> Result<Bytes>;

    /// Discard anything buffered on the input side.
    fn flush_input(&mut self) -> Result<()>;

    /// Close and reopen the underlying handle.
    fn reconnect(&mut self) -> Result<()>;

    /// Release the underlying handle. Further I/O fails.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn receive(&mut self, count: usize) -> Result<Bytes> {
        (**self).receive(count)
    }

    fn flush_input(&mut self) -> Result<()> {
        (**self).flush_input()
    }

    fn reconnect(&mut self) -> Result<()> {
        (**self).reconnect()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
