//! Protocol client and handshake.
//!
//! The [`Client`] owns the transport for the whole session and drives the
//! handshake state machine:
//! 1. `Connecting` - transport opened
//! 2. `AwaitingInit` - reading greeting frames, reconnecting after too many misses
//! 3. `Ready` - input flushed, commands may be issued
//!
//! Commands are strictly request/response. The firmware has no request
//! tagging, so every response is consumed before the next request goes out.
//!
//! # Example
//!
//! ```ignore
//! use cartwire::{Client, HandshakePolicy};
//! use cartwire::transport::SerialLink;
//!
//! let mut client = Client::open(SerialLink::new("/dev/ttyACM0"), &HandshakePolicy::default())?;
//! let sector_size = client.sector_size()?;
//! let sector = client.read_sector(0, sector_size, cartwire::protocol::ChecksumMode::WordSum)?;
//! ```

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{CartError, Result};
use crate::header::CartridgeFamily;
use crate::protocol::{
    build_request, decode_frame, framed_len, ChecksumMode, Command, GREETING,
    GREETING_FRAME_LEN, SECTOR_SIZE_RESPONSE_LEN,
};
use crate::transport::{SerialLink, SerialTransport, Transport};

/// Default number of greeting misses tolerated before reconnecting.
pub const DEFAULT_MAX_MISSES: u32 = 5;

/// Default overall connect deadline.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Handshake retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePolicy {
    /// Misses tolerated before the transport is reopened.
    pub max_misses: u32,
    /// Overall deadline. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl HandshakePolicy {
    /// Create a policy with default bounds.
    pub fn new() -> Self {
        Self {
            max_misses: DEFAULT_MAX_MISSES,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Set the miss bound.
    pub fn max_misses(mut self, max_misses: u32) -> Self {
        self.max_misses = max_misses;
        self
    }

    /// Set the connect deadline.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for HandshakePolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Transport opened, nothing read yet.
    Connecting,
    /// Waiting for the `#INIT$` greeting.
    AwaitingInit,
    /// Greeting seen and input flushed; commands may be sent.
    Ready,
}

/// A connected reader.
pub struct Client<T: Transport> {
    transport: T,
    state: HandshakeState,
    reconnects: u32,
}

impl Client<SerialTransport> {
    /// Open a serial link and complete the handshake.
    pub fn open(link: SerialLink, policy: &HandshakePolicy) -> Result<Self> {
        tracing::info!("Opening {}", link.port);
        let transport = SerialTransport::open(link)?;
        Self::connect(transport, policy)
    }
}

impl<T: Transport> Client<T> {
    /// Complete the handshake on an already opened transport.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ConnectFailed`] once the policy's deadline passes
    /// without a greeting. The transport is closed in that case.
    pub fn connect(transport: T, policy: &HandshakePolicy) -> Result<Self> {
        let mut client = Self {
            transport,
            state: HandshakeState::Connecting,
            reconnects: 0,
        };
        client.handshake(policy)?;
        Ok(client)
    }

    fn handshake(&mut self, policy: &HandshakePolicy) -> Result<()> {
        let started = Instant::now();
        let mut misses = 0u32;
        self.state = HandshakeState::AwaitingInit;
        tracing::debug!("Awaiting greeting");

        loop {
            match self.read_greeting() {
                Ok(()) => break,
                Err(CartError::HandshakeTimeout) => misses += 1,
                Err(e) => {
                    self.transport.close();
                    return Err(e);
                }
            }

            if let Some(limit) = policy.connect_timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    tracing::error!("No greeting after {:?}", elapsed);
                    self.transport.close();
                    return Err(CartError::ConnectFailed {
                        elapsed,
                        reconnects: self.reconnects,
                    });
                }
            }

            if misses > policy.max_misses {
                tracing::warn!("No greeting after {} reads, reconnecting", misses);
                if let Err(e) = self.transport.reconnect() {
                    self.transport.close();
                    return Err(e);
                }
                self.reconnects += 1;
                misses = 0;
            }
        }

        self.transport.flush_input()?;
        self.state = HandshakeState::Ready;
        tracing::info!(
            "Reader ready in {:.2?} ({} reconnects)",
            started.elapsed(),
            self.reconnects
        );
        Ok(())
    }

    /// Read one greeting frame. Anything but `#INIT$` is a miss.
    fn read_greeting(&mut self) -> Result<()> {
        let raw = self.transport.receive(GREETING_FRAME_LEN)?;
        match decode_frame(&raw, ChecksumMode::None) {
            Ok(payload) if payload == GREETING => Ok(()),
            Ok(_) | Err(CartError::Framing(_)) => {
                tracing::debug!("Greeting miss: {:?}", raw);
                Err(CartError::HandshakeTimeout)
            }
            Err(e) => Err(e),
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Number of transport reconnects during the handshake.
    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    fn send(&mut self, command: Command) -> Result<()> {
        tracing::trace!("-> {:?}", command);
        self.transport.send(&build_request(&command.payload()))
    }

    fn exchange(&mut self, command: Command, payload_len: usize, mode: ChecksumMode) -> Result<Bytes> {
        debug_assert!(command.expects_response());
        self.send(command)?;
        let raw = self.transport.receive(framed_len(payload_len, mode))?;
        let payload = decode_frame(&raw, mode)?;
        if payload.len() != payload_len {
            return Err(CartError::Framing(format!(
                "{:?}: expected {} payload bytes, got {}",
                command,
                payload_len,
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Query the sector size used by sector reads.
    pub fn sector_size(&mut self) -> Result<u32> {
        let payload = self.exchange(
            Command::SectorSize,
            SECTOR_SIZE_RESPONSE_LEN,
            ChecksumMode::None,
        )?;
        let size = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        tracing::debug!("Sector size {}", size);
        Ok(size)
    }

    /// Query the raw header blob for `family`.
    pub fn header(&mut self, family: CartridgeFamily) -> Result<Bytes> {
        self.exchange(
            Command::Header,
            family.header_len(),
            family.header_checksum(),
        )
    }

    /// Single attempt at reading the sector at `address`.
    ///
    /// A response that is short, malformed, or fails its checksum returns a
    /// transient error; retrying is the caller's decision.
    pub fn read_sector(&mut self, address: u32, sector_size: u32, mode: ChecksumMode) -> Result<Bytes> {
        self.exchange(Command::ReadSector { address }, sector_size as usize, mode)
    }

    /// Switch the banked window. The firmware sends no response.
    pub fn select_bank(&mut self, bank: u32) -> Result<()> {
        tracing::debug!("Selecting bank {}", bank);
        self.send(Command::SelectBank { bank })
    }

    /// Drop anything left in the input buffer.
    pub fn flush_input(&mut self) -> Result<()> {
        self.transport.flush_input()
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the client, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Close the transport and end the session.
    pub fn close(mut self) {
        self.transport.close();
    }
}
