//! Error types for cartwire.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all cartridge reader operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// I/O error on the serial line or an output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Config profile could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Response frame is empty, truncated, or missing its markers.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Checksum trailer disagrees with the recomputed value.
    #[error("Checksum mismatch: trailer {expected:#06x}, computed {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },

    /// Device did not send its greeting in one read window.
    #[error("Device not ready")]
    HandshakeTimeout,

    /// Connect deadline passed without a greeting.
    #[error("Connect failed after {elapsed:?} ({reconnects} reconnects)")]
    ConnectFailed { elapsed: Duration, reconnects: u32 },

    /// A sector failed every attempt allowed by the retry policy.
    #[error("Failed to read sector {address:#x} (bank {bank:?}) after {attempts} attempts")]
    SectorExhausted {
        address: u32,
        bank: Option<u32>,
        attempts: u32,
    },

    /// Majority vote found no two matching copies of a block.
    #[error("Could not correct block at offset {offset}")]
    UncorrectableBlock { offset: u64 },

    /// Correction inputs differ in length.
    #[error("Input lengths differ: {0:?}")]
    LengthMismatch([u64; 3]),

    /// Sector size and dump layout do not fit together.
    #[error("Invalid dump layout: {0}")]
    InvalidLayout(String),

    /// Header blob is malformed for the selected family.
    #[error("Header error: {0}")]
    Header(String),

    /// Catalog text could not be parsed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// No catalog entry matches the header.
    #[error("No catalog entry for checksum {0}")]
    LookupMiss(String),
}

impl CartError {
    /// Line-noise conditions that the per-sector retry budget absorbs.
    pub fn is_transient(&self) -> bool {
        matches!(self, CartError::Framing(_) | CartError::Checksum { .. })
    }
}

/// Result type alias using CartError.
pub type Result<T> = std::result::Result<T, CartError>;
