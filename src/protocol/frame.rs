//! Frame encoding and decoding.
//!
//! Decoded payloads use `bytes::Bytes` so sector data can be handed to the
//! dump sink without another copy.
//!
//! # Example
//!
//! ```
//! use cartwire::protocol::{decode_frame, encode_frame, ChecksumMode};
//!
//! let wire = encode_frame(b"\x00\x01\x00\x02", ChecksumMode::WordSum).unwrap();
//! assert_eq!(wire, b"#\x00\x01\x00\x02\x00\x03$");
//!
//! let payload = decode_frame(&wire, ChecksumMode::WordSum).unwrap();
//! assert_eq!(&payload[..], b"\x00\x01\x00\x02");
//! ```

use bytes::Bytes;

use super::checksum::ChecksumMode;
use super::wire_format::{END_MARKER, MARKER_OVERHEAD, START_MARKER};
use crate::error::{CartError, Result};

/// Total bytes on the wire for a payload of `payload_len` bytes.
#[inline]
pub fn framed_len(payload_len: usize, mode: ChecksumMode) -> usize {
    payload_len + mode.trailer_len() + MARKER_OVERHEAD
}

/// Build a complete frame, appending a trailer when `mode` asks for one.
///
/// # Errors
///
/// `WordSum` over an odd-length payload cannot be represented.
pub fn encode_frame(payload: &[u8], mode: ChecksumMode) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(framed_len(payload.len(), mode));
    buf.push(START_MARKER);
    buf.extend_from_slice(payload);
    if let Some(sum) = mode.compute(payload)? {
        buf.extend_from_slice(&sum.to_be_bytes());
    }
    buf.push(END_MARKER);
    Ok(buf)
}

/// Build a request frame. Requests never carry a trailer.
#[inline]
pub fn build_request(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + MARKER_OVERHEAD);
    buf.push(START_MARKER);
    buf.extend_from_slice(payload);
    buf.push(END_MARKER);
    buf
}

/// Validate markers and trailer, returning the bare payload.
///
/// # Errors
///
/// - [`CartError::Framing`] if the response is empty, a marker is missing,
///   or the interior is too short for the trailer
/// - [`CartError::Checksum`] if the trailer disagrees with the payload
pub fn decode_frame(raw: &[u8], mode: ChecksumMode) -> Result<Bytes> {
    let (first, last) = match (raw.first(), raw.last()) {
        (Some(first), Some(last)) if raw.len() >= MARKER_OVERHEAD => (*first, *last),
        _ => {
            return Err(CartError::Framing(format!(
                "response too short ({} bytes)",
                raw.len()
            )))
        }
    };
    if first != START_MARKER || last != END_MARKER {
        return Err(CartError::Framing(format!(
            "bad markers {:#04x}..{:#04x} in {} byte response",
            first,
            last,
            raw.len()
        )));
    }

    let interior = &raw[1..raw.len() - 1];
    let trailer_len = mode.trailer_len();
    if interior.len() < trailer_len {
        return Err(CartError::Framing(format!(
            "interior of {} bytes cannot hold a checksum trailer",
            interior.len()
        )));
    }

    let (payload, trailer) = interior.split_at(interior.len() - trailer_len);
    if let Some(actual) = mode.compute(payload)? {
        let expected = u16::from_be_bytes([trailer[0], trailer[1]]);
        if expected != actual {
            return Err(CartError::Checksum { expected, actual });
        }
    }

    Ok(Bytes::copy_from_slice(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_request() {
        assert_eq!(build_request(b"SCSIZE"), b"#SCSIZE$");
    }

    #[test]
    fn test_decode_plain() {
        let payload = decode_frame(b"#INIT$", ChecksumMode::None).unwrap();
        assert_eq!(&payload[..], b"INIT");
    }

    #[test]
    fn test_decode_empty_response() {
        let err = decode_frame(b"", ChecksumMode::None).unwrap_err();
        assert!(matches!(err, CartError::Framing(_)));
    }

    #[test]
    fn test_decode_single_marker_byte() {
        assert!(matches!(
            decode_frame(b"#", ChecksumMode::None),
            Err(CartError::Framing(_))
        ));
    }

    #[test]
    fn test_decode_markers_only() {
        let payload = decode_frame(b"#$", ChecksumMode::None).unwrap();
        assert!(payload.is_empty());

        let err = decode_frame(b"#$", ChecksumMode::ByteSum).unwrap_err();
        assert!(matches!(err, CartError::Framing(_)));
    }

    #[test]
    fn test_byte_sum_trailer() {
        // 0x01 + 0x02 + 0xFF = 0x0102
        let payload = decode_frame(b"#\x01\x02\xFF\x01\x02$", ChecksumMode::ByteSum).unwrap();
        assert_eq!(&payload[..], [0x01, 0x02, 0xFF]);
    }

    #[test]
    fn test_word_sum_odd_interior_is_framing_error() {
        // 3 payload bytes + 2 trailer bytes
        let err = decode_frame(b"#\x01\x02\x03\x00\x00$", ChecksumMode::WordSum).unwrap_err();
        assert!(matches!(err, CartError::Framing(_)));
    }

    #[test]
    fn test_checksum_mismatch_reports_both_values() {
        let err = decode_frame(b"#\x00\x05\x00\x06$", ChecksumMode::WordSum).unwrap_err();
        match err {
            CartError::Checksum { expected, actual } => {
                assert_eq!(expected, 6);
                assert_eq!(actual, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_framed_len() {
        assert_eq!(framed_len(512, ChecksumMode::WordSum), 516);
        assert_eq!(framed_len(4, ChecksumMode::None), 6);
    }

    fn mode_strategy() -> impl Strategy<Value = ChecksumMode> {
        prop_oneof![
            Just(ChecksumMode::None),
            Just(ChecksumMode::ByteSum),
            Just(ChecksumMode::WordSum),
        ]
    }

    fn even_payload() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..256).prop_map(|mut v| {
            if v.len() % 2 == 1 {
                v.pop();
            }
            v
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip(payload in even_payload(), mode in mode_strategy()) {
            let wire = encode_frame(&payload, mode).unwrap();
            prop_assert_eq!(wire.len(), framed_len(payload.len(), mode));
            let decoded = decode_frame(&wire, mode).unwrap();
            prop_assert_eq!(&decoded[..], &payload[..]);
        }

        #[test]
        fn prop_corrupted_last_byte_fails_checksum(
            payload in even_payload().prop_filter("non-empty", |p| !p.is_empty()),
            flip in 1u8..=255,
            word in any::<bool>(),
        ) {
            let mode = if word { ChecksumMode::WordSum } else { ChecksumMode::ByteSum };
            let mut wire = encode_frame(&payload, mode).unwrap();
            let last_payload_byte = wire.len() - 1 - mode.trailer_len() - 1;
            wire[last_payload_byte] ^= flip;
            let is_checksum_err = matches!(
                decode_frame(&wire, mode),
                Err(CartError::Checksum { .. })
            );
            prop_assert!(is_checksum_err);
        }

        #[test]
        fn prop_bad_markers_fail_framing(
            body in prop::collection::vec(any::<u8>(), 1..64),
            first in any::<u8>(),
            mode in mode_strategy(),
        ) {
            prop_assume!(first != START_MARKER);
            let mut raw = vec![first];
            raw.extend_from_slice(&body);
            let is_framing_err = matches!(decode_frame(&raw, mode), Err(CartError::Framing(_)));
            prop_assert!(is_framing_err);

            let mut raw = vec![START_MARKER];
            raw.extend_from_slice(&body);
            if raw.last() == Some(&END_MARKER) {
                raw.push(first);
                prop_assume!(first != END_MARKER);
            }
            let is_framing_err = matches!(decode_frame(&raw, mode), Err(CartError::Framing(_)));
            prop_assert!(is_framing_err);
        }
    }
}
