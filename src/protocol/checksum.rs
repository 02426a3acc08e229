//! Wire-level checksum trailers.
//!
//! The reader firmware appends a 16-bit big-endian trailer to checksummed
//! responses. Two flavours exist depending on the cartridge family:
//!
//! - `ByteSum`: unsigned sum of every byte, mod 65536
//! - `WordSum`: sum of big-endian 16-bit words, mod 65536

use serde::{Deserialize, Serialize};

use crate::error::{CartError, Result};

/// Trailer size in bytes when a checksum is present.
pub const TRAILER_SIZE: usize = 2;

/// Checksum applied to a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMode {
    /// No trailer.
    #[default]
    None,
    /// Sum of raw bytes.
    ByteSum,
    /// Sum of big-endian 16-bit words.
    WordSum,
}

impl ChecksumMode {
    /// Number of trailer bytes this mode adds to a frame.
    #[inline]
    pub fn trailer_len(self) -> usize {
        match self {
            ChecksumMode::None => 0,
            ChecksumMode::ByteSum | ChecksumMode::WordSum => TRAILER_SIZE,
        }
    }

    /// Compute the checksum of `data`.
    ///
    /// Returns `None` for `ChecksumMode::None`.
    ///
    /// # Errors
    ///
    /// `WordSum` over an odd number of bytes is a framing error.
    pub fn compute(self, data: &[u8]) -> Result<Option<u16>> {
        match self {
            ChecksumMode::None => Ok(None),
            ChecksumMode::ByteSum => Ok(Some(byte_sum(data))),
            ChecksumMode::WordSum => word_sum(data).map(Some),
        }
    }
}

/// Sum of all bytes, mod 65536.
pub fn byte_sum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Sum of big-endian 16-bit words, mod 65536.
pub fn word_sum(data: &[u8]) -> Result<u16> {
    if data.len() % 2 != 0 {
        return Err(CartError::Framing(format!(
            "word checksum over odd length {}",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(2)
        .fold(0u16, |acc, w| acc.wrapping_add(u16::from_be_bytes([w[0], w[1]]))))
}
