//! Raw frame encoding for assertions.

use bytes::Bytes;
use streamwire::{Header, MAX_HEADER_LENGTH};

/// Encode `header` followed by `payload`.
///
/// # Panics
///
/// Panics if the header cannot be encoded.
#[must_use]
pub fn encode_frame(header: Header, payload: &[u8]) -> Vec<u8> {
    let mut out = header.to_bytes().expect("encodable header").to_vec();
    out.extend_from_slice(payload);
    out
}

/// Split a byte capture into `(header, payload)` pairs.
///
/// # Panics
///
/// Panics if `bytes` does not consist of whole, valid frames.
#[must_use]
pub fn decode_frames(bytes: &[u8]) -> Vec<(Header, Bytes)> {
    let mut frames = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        assert!(rest.len() >= MAX_HEADER_LENGTH, "truncated header");
        let header = Header::decode(&rest[..MAX_HEADER_LENGTH]).expect("valid header");
        let end = MAX_HEADER_LENGTH + header.payload_length;
        assert!(rest.len() >= end, "truncated payload");
        frames.push((header, Bytes::copy_from_slice(&rest[MAX_HEADER_LENGTH..end])));
        rest = &rest[end..];
    }
    frames
}
