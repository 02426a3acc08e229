//! Serial port transport.
//!
//! # Example
//!
//! ```ignore
//! use cartwire::transport::{SerialLink, SerialTransport, Transport};
//! use std::time::Duration;
//!
//! let link = SerialLink::new("/dev/ttyACM0").baud_rate(500_000).timeout(Duration::from_secs(5));
//! let mut transport = SerialTransport::open(link)?;
//! transport.send(b"#SCSIZE$")?;
//! let rsp = transport.receive(6)?;
//! ```

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serialport::{ClearBuffer, SerialPort};

use super::Transport;
use crate::error::{CartError, Result};

/// Default baud rate of the reader firmware.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;

/// Default read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Size of a single read syscall chunk.
const READ_CHUNK: usize = 512;

/// Endpoint description for a serial connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialLink {
    /// Port identifier (`/dev/ttyACM0`, `COM3`, ...).
    pub port: String,
    /// Line speed.
    pub baud_rate: u32,
    /// Per-read timeout.
    pub timeout: Duration,
}

impl SerialLink {
    /// Create a link description with default baud rate and timeout.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the baud rate.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`Transport`] over an OS serial port.
pub struct SerialTransport {
    link: SerialLink,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open the port described by `link`.
    pub fn open(link: SerialLink) -> Result<Self> {
        let port = open_port(&link)?;
        Ok(Self {
            link,
            port: Some(port),
        })
    }

    /// The link this transport was opened with.
    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| CartError::Io(std::io::Error::new(ErrorKind::NotConnected, "port closed")))
    }
}

fn open_port(link: &SerialLink) -> Result<Box<dyn SerialPort>> {
    tracing::debug!(
        "Opening {} at {} baud (timeout {:?})",
        link.port,
        link.baud_rate,
        link.timeout
    );
    let port = serialport::new(&link.port, link.baud_rate)
        .timeout(link.timeout)
        .open()?;
    Ok(port)
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn receive(&mut self, count: usize) -> Result<Bytes> {
        let port = self.port()?;
        let mut buf = BytesMut::with_capacity(count);
        let mut tmp = [0u8; READ_CHUNK];

        while buf.len() < count {
            let want = (count - buf.len()).min(READ_CHUNK);
            match port.read(&mut tmp[..want]) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CartError::Io(e)),
            }
        }

        if buf.len() < count {
            tracing::debug!("Short read: {}/{} bytes", buf.len(), count);
        }
        Ok(buf.freeze())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        // Release the old handle before reopening the same device node.
        self.port = None;
        self.port = Some(open_port(&self.link)?);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("Closed {}", self.link.port);
        }
    }
}
