//! Protocol module - wire format, framing, and checksums.
//!
//! This module implements the byte-level protocol spoken by the reader:
//! - `#`/`$` delimited frames
//! - Optional 16-bit checksum trailers (byte sum or word sum)
//! - The fixed command vocabulary

mod checksum;
mod frame;
mod wire_format;

pub use checksum::{byte_sum, word_sum, ChecksumMode, TRAILER_SIZE};
pub use frame::{build_request, decode_frame, encode_frame, framed_len};
pub use wire_format::{
    tags, Command, END_MARKER, GREETING, GREETING_FRAME_LEN, MARKER_OVERHEAD,
    SECTOR_SIZE_RESPONSE_LEN, START_MARKER,
};
