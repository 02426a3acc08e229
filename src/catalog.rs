//! Cartridge catalog lookup.
//!
//! The catalog maps header identity to the expected ROM size and CRC. The
//! [`CartridgeLookup`] trait is the seam an external database plugs into;
//! any `Fn(&RomHeader) -> Result<CartridgeRecord>` also implements it.
//!
//! [`Catalog`] parses a locally cached copy of the cartreader database:
//!
//! ```text
//! Super Mario 64 (USA).z64
//! 4EAA3D0E,635A2BFF,8,0
//!
//! Mario Kart 64 (USA).z64
//! 434389C1,3E5055B6,12,2
//! ```
//!
//! Each record is a file name line followed by
//! `crc32,header_checksum,size_mb,save_type`.

use serde::Serialize;

use crate::error::{CartError, Result};
use crate::header::RomHeader;

const MIB: u64 = 1024 * 1024;

/// Expected properties of a known cartridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartridgeRecord {
    /// Canonical file name for the dump.
    pub name: String,
    /// CRC-32 of a good dump, uppercase hex.
    pub crc32: String,
    /// Checksum declared in the header, uppercase hex.
    pub header_checksum: String,
    pub size_bytes: u64,
    pub save_type: String,
}

/// Source of cartridge records.
pub trait CartridgeLookup {
    /// Find the record for `header`.
    ///
    /// Returns [`CartError::LookupMiss`] when nothing matches.
    fn lookup(&self, header: &RomHeader) -> Result<CartridgeRecord>;
}

impl<F> CartridgeLookup for F
where
    F: Fn(&RomHeader) -> Result<CartridgeRecord>,
{
    fn lookup(&self, header: &RomHeader) -> Result<CartridgeRecord> {
        self(header)
    }
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CartridgeRecord>,
}

impl Catalog {
    /// Parse catalog text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut records = Vec::new();
        let mut lines = text
            .lines()
            .map(str::trim)
            .enumerate()
            .filter(|(_, l)| !l.is_empty());

        while let Some((_, name)) = lines.next() {
            let (line_no, fields) = lines.next().ok_or_else(|| {
                CartError::Catalog(format!("record '{}' has no data line", name))
            })?;
            records.push(parse_record(name, fields, line_no + 1)?);
        }

        Ok(Self { records })
    }

    /// Build from records.
    pub fn from_records(records: Vec<CartridgeRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CartridgeRecord] {
        &self.records
    }

    /// All records whose header checksum equals `checksum` (case-insensitive).
    pub fn find_by_checksum(&self, checksum: &str) -> Vec<&CartridgeRecord> {
        self.records
            .iter()
            .filter(|r| r.header_checksum.eq_ignore_ascii_case(checksum))
            .collect()
    }
}

impl CartridgeLookup for Catalog {
    /// Match on the declared checksum, narrowing by title when several
    /// records share a checksum.
    fn lookup(&self, header: &RomHeader) -> Result<CartridgeRecord> {
        let matches = self.find_by_checksum(&header.declared_checksum);
        match matches.as_slice() {
            [] => Err(CartError::LookupMiss(header.declared_checksum.clone())),
            [only] => Ok((*only).clone()),
            several => {
                let title = header.title.to_uppercase();
                let by_title: Vec<_> = several
                    .iter()
                    .filter(|r| !title.is_empty() && title_key(&r.name).contains(&title))
                    .collect();
                let chosen = by_title.first().copied().unwrap_or(&several[0]);
                if by_title.len() != 1 {
                    tracing::warn!(
                        "{} catalog entries share checksum {}, using '{}'",
                        several.len(),
                        header.declared_checksum,
                        chosen.name
                    );
                }
                Ok((*chosen).clone())
            }
        }
    }
}

/// Uppercase name with a trailing ", The" article moved to the front.
fn title_key(name: &str) -> String {
    let key = name.to_uppercase();
    if key.contains(", THE") {
        format!("THE {}", key.replace(", THE", ""))
    } else {
        key
    }
}

fn parse_record(name: &str, fields: &str, line_no: usize) -> Result<CartridgeRecord> {
    let parts: Vec<&str> = fields.split(',').map(str::trim).collect();
    let [crc32, checksum, size, save] = parts.as_slice() else {
        return Err(CartError::Catalog(format!(
            "line {}: expected 4 fields, got {}",
            line_no,
            parts.len()
        )));
    };
    let size_mb: u64 = size
        .parse()
        .map_err(|_| CartError::Catalog(format!("line {}: bad size '{}'", line_no, size)))?;

    Ok(CartridgeRecord {
        name: name.to_string(),
        crc32: crc32.to_uppercase(),
        header_checksum: checksum.to_uppercase(),
        size_bytes: size_mb * MIB,
        save_type: save.to_string(),
    })
}
