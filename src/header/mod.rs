//! Fixed-width frame header codec.
//!
//! Every frame on the wire starts with a 48-byte ASCII header:
//!
//! ```text
//! T.LLLLLL.xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx.E\n
//! ```
//!
//! `T` is the [`PayloadType`] tag, `LLLLLL` the zero-padded payload length,
//! the middle field the hyphenated stream identifier and `E` the end flag
//! (`1` or `0`). The header is followed by exactly `payload_length` bytes.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::const_assert;
use thiserror::Error;
use uuid::Uuid;

/// Exact size in bytes of an encoded header.
pub const MAX_HEADER_LENGTH: usize = 48;
/// Largest payload carried by a single frame.
pub const MAX_PAYLOAD_LENGTH: usize = 4096;
/// Largest value representable in the six-digit length field.
pub const MAX_LENGTH_FIELD: usize = 999_999;

const_assert!(MAX_PAYLOAD_LENGTH <= MAX_LENGTH_FIELD);

const DELIMITER: u8 = b'.';
const TERMINATOR: u8 = b'\n';
const END: u8 = b'1';
const NOT_END: u8 = b'0';

const TYPE_OFFSET: usize = 0;
const TYPE_DELIMITER_OFFSET: usize = 1;
const LENGTH_OFFSET: usize = 2;
const LENGTH_LENGTH: usize = 6;
const LENGTH_DELIMITER_OFFSET: usize = 8;
const ID_OFFSET: usize = 9;
const ID_LENGTH: usize = 36;
const ID_DELIMITER_OFFSET: usize = 45;
const END_OFFSET: usize = 46;
const TERMINATOR_OFFSET: usize = 47;

const_assert!(TERMINATOR_OFFSET + 1 == MAX_HEADER_LENGTH);
const_assert!(ID_OFFSET + ID_LENGTH == ID_DELIMITER_OFFSET);

/// Kind of payload a frame carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// JSON request descriptor (`A`).
    Request,
    /// JSON response descriptor (`B`).
    Response,
    /// Raw content stream bytes (`S`).
    Stream,
    /// Cancel every stream on the connection (`X`).
    CancelAll,
    /// Cancel the stream named by the header id (`C`).
    CancelStream,
}

impl PayloadType {
    /// Return the single-byte wire tag.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Request => b'A',
            Self::Response => b'B',
            Self::Stream => b'S',
            Self::CancelAll => b'X',
            Self::CancelStream => b'C',
        }
    }

    /// Parse a wire tag, returning `None` for unknown bytes.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(Self::Request),
            b'B' => Some(Self::Response),
            b'S' => Some(Self::Stream),
            b'X' => Some(Self::CancelAll),
            b'C' => Some(Self::CancelStream),
            _ => None,
        }
    }

    /// Whether frames of this type carry content stream bytes.
    #[must_use]
    pub const fn is_stream(self) -> bool { matches!(self, Self::Stream) }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Stream => "stream",
            Self::CancelAll => "cancel_all",
            Self::CancelStream => "cancel_stream",
        };
        f.write_str(name)
    }
}

/// Errors raised while encoding or decoding a header.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Input was not exactly [`MAX_HEADER_LENGTH`] bytes.
    #[error("header must be {MAX_HEADER_LENGTH} bytes, got {0}")]
    InvalidSize(usize),
    /// Output buffer cannot hold an encoded header.
    #[error("buffer of {0} bytes cannot hold a {MAX_HEADER_LENGTH}-byte header")]
    BufferTooSmall(usize),
    /// Type tag is not one of the known payload types.
    #[error("unknown payload type {0:#04x}")]
    UnknownType(u8),
    /// A `.` delimiter was missing at the given offset.
    #[error("missing delimiter at offset {0}")]
    MissingDelimiter(usize),
    /// The trailing newline was missing.
    #[error("missing header terminator")]
    MissingTerminator,
    /// The length field was not six decimal digits.
    #[error("payload length is not a decimal number")]
    InvalidLength,
    /// The id field was not a hyphenated UUID.
    #[error("header id is not a valid uuid")]
    InvalidId,
    /// The end flag was neither `0` nor `1`.
    #[error("invalid end flag {0:#04x}")]
    InvalidEnd(u8),
    /// Payload length cannot be represented in the six-digit field.
    #[error("payload length {0} exceeds {MAX_LENGTH_FIELD}")]
    LengthOverflow(usize),
}

/// Header preceding every frame payload.
///
/// # Examples
///
/// ```
/// use streamwire::header::{Header, PayloadType};
/// use uuid::Uuid;
///
/// let header = Header::new(PayloadType::Request, Uuid::nil(), 168, true);
/// let bytes = header.to_bytes().expect("length fits");
/// assert_eq!(&bytes[..9], b"A.000168.");
/// assert_eq!(Header::decode(&bytes), Ok(header));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Header {
    /// Kind of payload that follows.
    pub payload_type: PayloadType,
    /// Identifier shared by every frame of one request, response or stream.
    pub id: Uuid,
    /// Number of payload bytes following the header.
    pub payload_length: usize,
    /// Set on the final frame for `id`.
    pub end: bool,
}

impl Header {
    /// Build a header from its parts.
    #[must_use]
    pub const fn new(payload_type: PayloadType, id: Uuid, payload_length: usize, end: bool) -> Self {
        Self {
            payload_type,
            id,
            payload_length,
            end,
        }
    }

    /// Encode into the first [`MAX_HEADER_LENGTH`] bytes of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::BufferTooSmall`] when `buf` is shorter than a
    /// header and [`HeaderError::LengthOverflow`] when the payload length
    /// does not fit the six-digit field.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, HeaderError> {
        if buf.len() < MAX_HEADER_LENGTH {
            return Err(HeaderError::BufferTooSmall(buf.len()));
        }
        if self.payload_length > MAX_LENGTH_FIELD {
            return Err(HeaderError::LengthOverflow(self.payload_length));
        }

        buf[TYPE_OFFSET] = self.payload_type.as_byte();
        buf[TYPE_DELIMITER_OFFSET] = DELIMITER;

        let mut remaining = self.payload_length;
        for slot in buf[LENGTH_OFFSET..LENGTH_OFFSET + LENGTH_LENGTH].iter_mut().rev() {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "remaining % 10 is always a single digit"
            )]
            let digit = (remaining % 10) as u8;
            *slot = b'0' + digit;
            remaining /= 10;
        }
        buf[LENGTH_DELIMITER_OFFSET] = DELIMITER;

        self.id
            .hyphenated()
            .encode_lower(&mut buf[ID_OFFSET..ID_DELIMITER_OFFSET]);
        buf[ID_DELIMITER_OFFSET] = DELIMITER;

        buf[END_OFFSET] = if self.end { END } else { NOT_END };
        buf[TERMINATOR_OFFSET] = TERMINATOR;
        Ok(MAX_HEADER_LENGTH)
    }

    /// Encode into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::LengthOverflow`] when the payload length does
    /// not fit the six-digit field.
    pub fn to_bytes(&self) -> Result<Bytes, HeaderError> {
        let mut buf = BytesMut::with_capacity(MAX_HEADER_LENGTH);
        buf.put_bytes(0, MAX_HEADER_LENGTH);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a header from exactly [`MAX_HEADER_LENGTH`] bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`HeaderError`] describing the first malformed field.
    pub fn decode(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() != MAX_HEADER_LENGTH {
            return Err(HeaderError::InvalidSize(buf.len()));
        }
        for offset in [
            TYPE_DELIMITER_OFFSET,
            LENGTH_DELIMITER_OFFSET,
            ID_DELIMITER_OFFSET,
        ] {
            if buf[offset] != DELIMITER {
                return Err(HeaderError::MissingDelimiter(offset));
            }
        }
        if buf[TERMINATOR_OFFSET] != TERMINATOR {
            return Err(HeaderError::MissingTerminator);
        }

        let type_byte = buf[TYPE_OFFSET];
        let payload_type =
            PayloadType::from_byte(type_byte).ok_or(HeaderError::UnknownType(type_byte))?;

        let payload_length = buf[LENGTH_OFFSET..LENGTH_OFFSET + LENGTH_LENGTH]
            .iter()
            .try_fold(0usize, |acc, &b| {
                b.is_ascii_digit()
                    .then(|| acc * 10 + usize::from(b - b'0'))
            })
            .ok_or(HeaderError::InvalidLength)?;

        let id = Uuid::try_parse_ascii(&buf[ID_OFFSET..ID_DELIMITER_OFFSET])
            .map_err(|_| HeaderError::InvalidId)?;

        let end = match buf[END_OFFSET] {
            END => true,
            NOT_END => false,
            other => return Err(HeaderError::InvalidEnd(other)),
        };

        Ok(Self {
            payload_type,
            id,
            payload_length,
            end,
        })
    }
}
