//! Cartridge header parsing.
//!
//! Each [`CartridgeFamily`] owns a fixed field layout. Parsing a header blob
//! produces a plain [`RomHeader`] record; name lookups for licensees or
//! cartridge types are left to the caller.
//!
//! # Example
//!
//! ```
//! use cartwire::header::{parse_header, CartridgeFamily};
//!
//! let mut blob = [0u8; 64];
//! blob[0x10..0x14].copy_from_slice(&[0x63, 0x5A, 0x2B, 0xFF]);
//! blob[0x20..0x2C].copy_from_slice(b"SUPER MARIO ");
//! blob[0x3F] = 1;
//!
//! let header = parse_header(&blob, CartridgeFamily::N64).unwrap();
//! assert_eq!(header.title, "SUPER MARIO");
//! assert_eq!(header.declared_checksum, "635A2BFF");
//! assert_eq!(header.version, 1);
//! ```

use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CartError, Result};
use crate::protocol::ChecksumMode;

/// Cartridge families supported by the reader firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartridgeFamily {
    /// Nintendo 64: flat address space, word-sum checksums.
    #[default]
    N64,
    /// Game Boy / Game Boy Color: banked ROM, byte-sum checksums.
    GameBoy,
}

impl CartridgeFamily {
    /// Length of the header blob returned by the header query.
    pub fn header_len(self) -> usize {
        match self {
            CartridgeFamily::N64 => n64::LEN,
            CartridgeFamily::GameBoy => gb::LEN,
        }
    }

    /// Checksum mode of the header response.
    pub fn header_checksum(self) -> ChecksumMode {
        self.sector_checksum()
    }

    /// Checksum mode of sector responses.
    pub fn sector_checksum(self) -> ChecksumMode {
        match self {
            CartridgeFamily::N64 => ChecksumMode::WordSum,
            CartridgeFamily::GameBoy => ChecksumMode::ByteSum,
        }
    }

    /// Whether the ROM is read bank by bank.
    pub fn is_banked(self) -> bool {
        matches!(self, CartridgeFamily::GameBoy)
    }

    /// Read timeout the family's firmware needs.
    pub fn default_timeout(self) -> Duration {
        match self {
            CartridgeFamily::N64 => Duration::from_millis(500),
            CartridgeFamily::GameBoy => Duration::from_secs(5),
        }
    }
}

/// N64 header offsets (first 64 bytes of the ROM image).
mod n64 {
    use std::ops::Range;

    pub const LEN: usize = 64;
    pub const CLOCK_RATE: Range<usize> = 0x04..0x08;
    pub const ENTRY_POINT: Range<usize> = 0x08..0x0C;
    pub const CRC1: Range<usize> = 0x10..0x14;
    pub const CRC2: Range<usize> = 0x14..0x18;
    pub const NAME: Range<usize> = 0x20..0x34;
    pub const GAME_CODE: Range<usize> = 0x3B..0x3F;
    pub const MEDIA_FORMAT: usize = 0x3B;
    pub const CARTRIDGE_ID: Range<usize> = 0x3C..0x3E;
    pub const REGION: usize = 0x3E;
    pub const VERSION: usize = 0x3F;
}

/// Game Boy header offsets, relative to cartridge address 0x100.
mod gb {
    use std::ops::Range;

    pub const LEN: usize = 80;
    pub const ENTRY_POINT: Range<usize> = 0..4;
    pub const LOGO: Range<usize> = 4..52;
    pub const TITLE: Range<usize> = 52..68;
    pub const LICENSEE: Range<usize> = 68..70;
    pub const SGB_FLAG: usize = 70;
    pub const CARTRIDGE_TYPE: usize = 71;
    pub const ROM_SIZE: usize = 72;
    pub const RAM_SIZE: usize = 73;
    pub const DESTINATION: usize = 74;
    pub const OLD_LICENSEE: usize = 75;
    pub const VERSION: usize = 76;
    pub const HEADER_CHECKSUM: usize = 77;
    pub const GLOBAL_CHECKSUM: Range<usize> = 78..80;
    /// Bytes covered by the header checksum.
    pub const CHECKSUM_SPAN: Range<usize> = 52..77;
    /// Largest ROM size code with a defined bank count.
    pub const MAX_ROM_SIZE_CODE: u8 = 0x08;
}

/// Parsed cartridge header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomHeader {
    pub family: CartridgeFamily,
    /// Title with padding removed.
    pub title: String,
    pub version: u8,
    /// Checksum the cartridge declares about itself, uppercase hex.
    pub declared_checksum: String,
    pub details: HeaderDetails,
}

/// Family-specific header fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum HeaderDetails {
    N64(N64Header),
    GameBoy(GameBoyHeader),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct N64Header {
    pub clock_rate: u32,
    pub entry_point: u32,
    pub crc1: u32,
    pub crc2: u32,
    pub game_code: String,
    pub media_format: u8,
    pub cartridge_id: String,
    pub region: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameBoyHeader {
    pub entry_point: [u8; 4],
    pub logo: Vec<u8>,
    pub licensee_code: String,
    pub sgb_flag: u8,
    pub cartridge_type: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    pub destination: u8,
    pub old_licensee: u8,
    pub header_checksum: u8,
    /// Header checksum recomputed over the title..version span.
    pub computed_header_checksum: u8,
    pub global_checksum: u16,
}

impl GameBoyHeader {
    /// Whether the stored header checksum matches the recomputed one.
    pub fn header_checksum_ok(&self) -> bool {
        self.header_checksum == self.computed_header_checksum
    }

    /// Number of 16 KiB ROM banks, `2^(code + 1)`.
    ///
    /// Returns `None` for codes outside the defined range.
    pub fn bank_count(&self) -> Option<u32> {
        (self.rom_size_code <= gb::MAX_ROM_SIZE_CODE).then(|| 1u32 << (self.rom_size_code + 1))
    }
}

impl RomHeader {
    /// Game Boy fields, if this is a Game Boy header.
    pub fn game_boy(&self) -> Option<&GameBoyHeader> {
        match &self.details {
            HeaderDetails::GameBoy(h) => Some(h),
            HeaderDetails::N64(_) => None,
        }
    }

    /// N64 fields, if this is an N64 header.
    pub fn n64(&self) -> Option<&N64Header> {
        match &self.details {
            HeaderDetails::N64(h) => Some(h),
            HeaderDetails::GameBoy(_) => None,
        }
    }
}

/// Parse a header blob for `family`.
///
/// # Errors
///
/// Returns [`CartError::Header`] if the blob length does not match the
/// family's header length.
pub fn parse_header(blob: &[u8], family: CartridgeFamily) -> Result<RomHeader> {
    if blob.len() != family.header_len() {
        return Err(CartError::Header(format!(
            "{:?} header must be {} bytes, got {}",
            family,
            family.header_len(),
            blob.len()
        )));
    }

    Ok(match family {
        CartridgeFamily::N64 => parse_n64(blob),
        CartridgeFamily::GameBoy => parse_game_boy(blob),
    })
}

fn parse_n64(blob: &[u8]) -> RomHeader {
    let crc1 = be_u32(blob, n64::CRC1);
    let details = N64Header {
        clock_rate: be_u32(blob, n64::CLOCK_RATE),
        entry_point: be_u32(blob, n64::ENTRY_POINT),
        crc1,
        crc2: be_u32(blob, n64::CRC2),
        game_code: ascii_field(&blob[n64::GAME_CODE]),
        media_format: blob[n64::MEDIA_FORMAT],
        cartridge_id: ascii_field(&blob[n64::CARTRIDGE_ID]),
        region: blob[n64::REGION],
    };

    RomHeader {
        family: CartridgeFamily::N64,
        title: ascii_field(&blob[n64::NAME]),
        version: blob[n64::VERSION],
        declared_checksum: format!("{:08X}", crc1),
        details: HeaderDetails::N64(details),
    }
}

fn parse_game_boy(blob: &[u8]) -> RomHeader {
    let mut entry_point = [0u8; 4];
    entry_point.copy_from_slice(&blob[gb::ENTRY_POINT]);
    let global_checksum = u16::from_be_bytes([
        blob[gb::GLOBAL_CHECKSUM.start],
        blob[gb::GLOBAL_CHECKSUM.start + 1],
    ]);

    let details = GameBoyHeader {
        entry_point,
        logo: blob[gb::LOGO].to_vec(),
        licensee_code: ascii_field(&blob[gb::LICENSEE]),
        sgb_flag: blob[gb::SGB_FLAG],
        cartridge_type: blob[gb::CARTRIDGE_TYPE],
        rom_size_code: blob[gb::ROM_SIZE],
        ram_size_code: blob[gb::RAM_SIZE],
        destination: blob[gb::DESTINATION],
        old_licensee: blob[gb::OLD_LICENSEE],
        header_checksum: blob[gb::HEADER_CHECKSUM],
        computed_header_checksum: game_boy_header_checksum(blob),
        global_checksum,
    };

    RomHeader {
        family: CartridgeFamily::GameBoy,
        title: ascii_field(&blob[gb::TITLE]),
        version: blob[gb::VERSION],
        declared_checksum: format!("{:04X}", global_checksum),
        details: HeaderDetails::GameBoy(details),
    }
}

/// Game Boy header checksum: `x = x - byte - 1` over the title..version span.
///
/// `blob` is the 80-byte header starting at cartridge address 0x100.
pub fn game_boy_header_checksum(blob: &[u8]) -> u8 {
    blob[gb::CHECKSUM_SPAN]
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

fn be_u32(blob: &[u8], range: Range<usize>) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&blob[range]);
    u32::from_be_bytes(buf)
}

/// Decode a padded ASCII field: stop at the first NUL, drop non-printable
/// bytes, trim surrounding spaces.
fn ascii_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text: String = bytes[..end]
        .iter()
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| b as char)
        .collect();
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gb_blob() -> Vec<u8> {
        let mut blob = vec![0u8; 80];
        blob[0..4].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
        blob[52..61].copy_from_slice(b"TETRIS\0\0\0");
        blob[68..70].copy_from_slice(b"01");
        blob[71] = 0x01; // MBC1
        blob[72] = 0x02; // 128 KiB
        blob[73] = 0x00;
        blob[74] = 0x01;
        blob[75] = 0x33;
        blob[76] = 0x01;
        blob[77] = game_boy_header_checksum(&blob);
        blob[78..80].copy_from_slice(&[0xBE, 0xEF]);
        blob
    }

    #[test]
    fn test_family_contracts() {
        assert_eq!(CartridgeFamily::N64.header_len(), 64);
        assert_eq!(CartridgeFamily::GameBoy.header_len(), 80);
        assert_eq!(CartridgeFamily::N64.header_checksum(), ChecksumMode::WordSum);
        assert_eq!(
            CartridgeFamily::GameBoy.header_checksum(),
            ChecksumMode::ByteSum
        );
        assert!(CartridgeFamily::GameBoy.is_banked());
        assert!(!CartridgeFamily::N64.is_banked());
    }

    #[test]
    fn test_parse_game_boy() {
        let header = parse_header(&gb_blob(), CartridgeFamily::GameBoy).unwrap();
        assert_eq!(header.title, "TETRIS");
        assert_eq!(header.version, 1);
        assert_eq!(header.declared_checksum, "BEEF");

        let gb = header.game_boy().unwrap();
        assert_eq!(gb.entry_point, [0x00, 0xC3, 0x50, 0x01]);
        assert_eq!(gb.licensee_code, "01");
        assert_eq!(gb.cartridge_type, 0x01);
        assert_eq!(gb.old_licensee, 0x33);
        assert_eq!(gb.global_checksum, 0xBEEF);
        assert!(gb.header_checksum_ok());
        assert_eq!(gb.bank_count(), Some(8));
        assert!(header.n64().is_none());
    }

    #[test]
    fn test_game_boy_bad_header_checksum_detected() {
        let mut blob = gb_blob();
        blob[77] = blob[77].wrapping_add(1);
        let header = parse_header(&blob, CartridgeFamily::GameBoy).unwrap();
        assert!(!header.game_boy().unwrap().header_checksum_ok());
    }

    #[test]
    fn test_game_boy_header_checksum_known_value() {
        // 25 zero bytes: x = -1 applied 25 times = 256 - 25
        let blob = vec![0u8; 80];
        assert_eq!(game_boy_header_checksum(&blob), 0xE7);
    }

    #[test]
    fn test_bank_count_undefined_code() {
        let mut blob = gb_blob();
        blob[72] = 0x52;
        let header = parse_header(&blob, CartridgeFamily::GameBoy).unwrap();
        assert_eq!(header.game_boy().unwrap().bank_count(), None);
    }

    #[test]
    fn test_parse_n64_fields() {
        let mut blob = [0u8; 64];
        blob[0x04..0x08].copy_from_slice(&0x0000_000Fu32.to_be_bytes());
        blob[0x08..0x0C].copy_from_slice(&0x8024_6000u32.to_be_bytes());
        blob[0x10..0x14].copy_from_slice(&0x635A_2BFFu32.to_be_bytes());
        blob[0x14..0x18].copy_from_slice(&0x8B02_2326u32.to_be_bytes());
        blob[0x20..0x34].copy_from_slice(b"SUPER MARIO 64      ");
        blob[0x3B..0x3F].copy_from_slice(b"NSME");
        blob[0x3F] = 0;

        let header = parse_header(&blob, CartridgeFamily::N64).unwrap();
        assert_eq!(header.title, "SUPER MARIO 64");
        assert_eq!(header.declared_checksum, "635A2BFF");
        let n64 = header.n64().unwrap();
        assert_eq!(n64.entry_point, 0x8024_6000);
        assert_eq!(n64.crc2, 0x8B02_2326);
        assert_eq!(n64.game_code, "NSME");
        assert_eq!(n64.media_format, b'N');
        assert_eq!(n64.cartridge_id, "SM");
        assert_eq!(n64.region, b'E');
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = parse_header(&[0u8; 63], CartridgeFamily::N64).unwrap_err();
        assert!(matches!(err, CartError::Header(_)));
        let err = parse_header(&[0u8; 64], CartridgeFamily::GameBoy).unwrap_err();
        assert!(matches!(err, CartError::Header(_)));
    }

    #[test]
    fn test_ascii_field_strips_padding_and_flags() {
        assert_eq!(ascii_field(b"  ZELDA \0\0\0"), "ZELDA");
        // CGB flag byte in the last title position
        assert_eq!(ascii_field(b"POKEMON RED\x80"), "POKEMON RED");
    }
}
