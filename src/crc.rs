//! CRC-32 over assembled dumps.
//!
//! Uses the reflected 0xEDB88320 polynomial shared by zip, gzip and the
//! cartridge databases, via `crc32fast`.
//!
//! # Example
//!
//! ```
//! use cartwire::crc::{crc32, format_crc};
//!
//! assert_eq!(format_crc(crc32(b"123456789")), "CBF43926");
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// CRC-32 of `data`.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// CRC-32 of everything readable from `reader`.
pub fn crc32_reader<R: Read>(mut reader: R) -> Result<u32> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// CRC-32 of the file at `path`.
pub fn crc32_file(path: impl AsRef<Path>) -> Result<u32> {
    crc32_reader(BufReader::new(File::open(path)?))
}

/// Render as 8 uppercase hex digits.
pub fn format_crc(crc: u32) -> String {
    format!("{:08X}", crc)
}

/// Parse an 8 hex digit CRC, any case.
pub fn parse_crc(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || text.len() > 8 {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

/// Outcome of comparing a dump against a reference CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrcStatus {
    Good,
    Bad,
}

/// Dump CRC next to its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrcCheck {
    pub actual: u32,
    pub expected: u32,
    pub status: CrcStatus,
}

impl CrcCheck {
    /// Compare `actual` against `expected`.
    pub fn new(actual: u32, expected: u32) -> Self {
        let status = if actual == expected {
            CrcStatus::Good
        } else {
            CrcStatus::Bad
        };
        Self {
            actual,
            expected,
            status,
        }
    }

    pub fn is_good(&self) -> bool {
        self.status == CrcStatus::Good
    }
}

impl std::fmt::Display for CrcCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.is_good() { "=" } else { "!" };
        write!(
            f,
            "{:?}: {} (file) {}= {} (reference)",
            self.status,
            format_crc(self.actual),
            sign,
            format_crc(self.expected)
        )
    }
}
