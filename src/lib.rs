//! # cartwire
//!
//! Host-side client for serial game cartridge readers.
//!
//! The reader firmware speaks a small framed protocol over a serial line:
//! a greeting handshake, a sector-size query, a header query, sector reads
//! and bank selects. This crate drives that protocol to produce ROM dumps,
//! retrying noisy sectors, and offers offline tools for the result.
//!
//! ## Architecture
//!
//! - **Transport** (`transport`): blocking byte link, serial port in production
//! - **Protocol** (`protocol`, `client`): `#`/`$` framing with checksum trailers
//!   and the handshake state machine
//! - **Dump** (`dump`, `header`, `session`): layout planning and sector-by-sector
//!   reads with a bounded retry policy
//! - **Offline** (`correct`, `crc`, `catalog`): majority-vote repair of three
//!   dumps, CRC-32 verification, cartridge database lookup
//!
//! ## Example
//!
//! ```ignore
//! use cartwire::{Catalog, CartridgeFamily, Session, SessionConfig};
//!
//! fn main() -> cartwire::Result<()> {
//!     let config = SessionConfig::new("/dev/ttyACM0", CartridgeFamily::GameBoy);
//!     let mut session = Session::open(&config)?;
//!     let outcome = session.run(&Catalog::default(), "dumps".as_ref())?;
//!     if let Some(crc) = outcome.crc {
//!         println!("{}", crc);
//!     }
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod correct;
pub mod crc;
pub mod dump;
pub mod error;
pub mod header;
pub mod protocol;
pub mod session;
pub mod transport;

pub use catalog::{CartridgeLookup, CartridgeRecord, Catalog};
pub use client::{Client, HandshakePolicy, HandshakeState};
pub use config::SessionConfig;
pub use correct::{correct_files, CorrectionReport};
pub use crc::{crc32, CrcCheck, CrcStatus};
pub use dump::{DumpLayout, DumpReport, DumpSession, RetryPolicy};
pub use error::{CartError, Result};
pub use header::{parse_header, CartridgeFamily, RomHeader};
pub use session::{DumpOutcome, Session};
pub use transport::{SerialLink, SerialTransport, Transport};
