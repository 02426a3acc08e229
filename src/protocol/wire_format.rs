//! Wire format constants and command encoding.
//!
//! Every unit on the line is delimited by ASCII sentinels:
//! ```text
//! ┌───────┬───────────────────────┬──────────────┬───────┐
//! │ Start │ Payload               │ Trailer      │ End   │
//! │ '#'   │ command-specific size │ 0 or 2 bytes │ '$'   │
//! └───────┴───────────────────────┴──────────────┴───────┘
//! ```
//!
//! Parameterised commands carry a two-letter ASCII tag followed by a
//! Big Endian `u32`.

/// Start marker (`#`).
pub const START_MARKER: u8 = b'#';

/// End marker (`$`).
pub const END_MARKER: u8 = b'$';

/// Bytes added by the start and end markers.
pub const MARKER_OVERHEAD: usize = 2;

/// Greeting payload sent by the firmware after reset.
pub const GREETING: &[u8] = b"INIT";

/// Full greeting frame length (`#INIT$`).
pub const GREETING_FRAME_LEN: usize = GREETING.len() + MARKER_OVERHEAD;

/// Length of the sector-size response payload.
pub const SECTOR_SIZE_RESPONSE_LEN: usize = 4;

/// Command tags.
pub mod tags {
    /// Sector size query.
    pub const SECTOR_SIZE: &[u8] = b"SCSIZE";
    /// Header query.
    pub const HEADER: &[u8] = b"HEADER";
    /// Sector read, followed by a u32 address.
    pub const READ_SECTOR: &[u8] = b"SC";
    /// Bank select, followed by a u32 bank number.
    pub const SELECT_BANK: &[u8] = b"BK";
}

/// Command vocabulary understood by the reader firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask for the sector size used by sector reads.
    SectorSize,
    /// Ask for the cartridge header blob.
    Header,
    /// Read one sector starting at `address`.
    ReadSector { address: u32 },
    /// Switch the banked window to `bank`. No response.
    SelectBank { bank: u32 },
}

impl Command {
    /// Encode the command payload (without markers).
    ///
    /// # Example
    ///
    /// ```
    /// use cartwire::protocol::Command;
    ///
    /// let payload = Command::ReadSector { address: 0x200 }.payload();
    /// assert_eq!(payload, b"SC\x00\x00\x02\x00");
    /// ```
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Command::SectorSize => tags::SECTOR_SIZE.to_vec(),
            Command::Header => tags::HEADER.to_vec(),
            Command::ReadSector { address } => tagged(tags::READ_SECTOR, address),
            Command::SelectBank { bank } => tagged(tags::SELECT_BANK, bank),
        }
    }

    /// Whether the firmware answers this command with a frame.
    #[inline]
    pub fn expects_response(&self) -> bool {
        !matches!(self, Command::SelectBank { .. })
    }
}

fn tagged(tag: &[u8], value: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(tag.len() + 4);
    buf.extend_from_slice(tag);
    buf.extend_from_slice(&value.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_frame_len_is_6() {
        assert_eq!(GREETING_FRAME_LEN, 6);
    }

    #[test]
    fn test_literal_commands() {
        assert_eq!(Command::SectorSize.payload(), b"SCSIZE");
        assert_eq!(Command::Header.payload(), b"HEADER");
    }

    #[test]
    fn test_parameterised_commands_big_endian() {
        let payload = Command::ReadSector {
            address: 0x0102_0304,
        }
        .payload();
        assert_eq!(payload, [b'S', b'C', 0x01, 0x02, 0x03, 0x04]);

        let payload = Command::SelectBank { bank: 7 }.payload();
        assert_eq!(payload, [b'B', b'K', 0, 0, 0, 7]);
    }

    #[test]
    fn test_only_bank_select_is_fire_and_forget() {
        assert!(Command::SectorSize.expects_response());
        assert!(Command::Header.expects_response());
        assert!(Command::ReadSector { address: 0 }.expects_response());
        assert!(!Command::SelectBank { bank: 1 }.expects_response());
    }
}
