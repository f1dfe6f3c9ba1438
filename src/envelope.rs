//! The persisted ciphertext envelope.
//!
//! Every encrypted field is stored as a single string of four lowercase hex
//! segments joined by `:`:
//!
//! ```text
//! <salt 128 hex>:<iv 32 hex>:<tag 32 hex>:<ciphertext hex>
//! ```
//!
//! Decoding is also the format detector. A string that is not exactly this
//! shape is *not an envelope*, which is the normal signal for legacy
//! plaintext rather than an error. A legacy value that happens to have this
//! exact shape would be taken for an envelope; that ambiguity is inherent to
//! the stored format and is kept for compatibility with existing rows.

use std::fmt;

use crate::crypto::{IV_LEN, TAG_LEN};
use crate::keys::SALT_LEN;

const SEPARATOR: char = ':';
const SEGMENTS: usize = 4;

/// Which of the four segments a decode problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Salt,
    Iv,
    Tag,
    Ciphertext,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Salt => "salt",
            Self::Iv => "iv",
            Self::Tag => "tag",
            Self::Ciphertext => "ciphertext",
        };
        f.write_str(name)
    }
}

/// Why a string was not recognised as an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotAnEnvelope {
    /// The string did not split into exactly four segments.
    SegmentCount(usize),
    /// A segment contained a non-hex character or an odd number of digits.
    InvalidHex(Segment),
    /// A fixed-size segment decoded to the wrong number of bytes.
    WrongLength {
        segment: Segment,
        expected: usize,
        got: usize,
    },
}

impl fmt::Display for NotAnEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentCount(n) => write!(f, "expected {SEGMENTS} segments, got {n}"),
            Self::InvalidHex(segment) => write!(f, "{segment} segment is not hex"),
            Self::WrongLength {
                segment,
                expected,
                got,
            } => write!(f, "{segment} segment is {got} bytes, expected {expected}"),
        }
    }
}

impl std::error::Error for NotAnEnvelope {}

/// The four components of an encrypted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Serialise to the stored `salt:iv:tag:ciphertext` form.
    pub fn encode(&self) -> String {
        let mut out =
            String::with_capacity((SALT_LEN + IV_LEN + TAG_LEN + self.ciphertext.len()) * 2 + 3);
        out.push_str(&hex::encode(self.salt));
        out.push(SEPARATOR);
        out.push_str(&hex::encode(self.iv));
        out.push(SEPARATOR);
        out.push_str(&hex::encode(self.tag));
        out.push(SEPARATOR);
        out.push_str(&hex::encode(&self.ciphertext));
        out
    }

    /// Parse a stored string.
    ///
    /// Succeeds only for exactly four hex segments with a 64-byte salt, a
    /// 16-byte IV and a 16-byte tag. The ciphertext may be any whole number
    /// of bytes.
    pub fn decode(input: &str) -> Result<Self, NotAnEnvelope> {
        let parts: Vec<&str> = input.split(SEPARATOR).collect();
        if parts.len() != SEGMENTS {
            return Err(NotAnEnvelope::SegmentCount(parts.len()));
        }

        let salt = decode_fixed::<SALT_LEN>(parts[0], Segment::Salt)?;
        let iv = decode_fixed::<IV_LEN>(parts[1], Segment::Iv)?;
        let tag = decode_fixed::<TAG_LEN>(parts[2], Segment::Tag)?;
        let ciphertext =
            hex::decode(parts[3]).map_err(|_| NotAnEnvelope::InvalidHex(Segment::Ciphertext))?;

        Ok(Self {
            salt,
            iv,
            tag,
            ciphertext,
        })
    }
}

fn decode_fixed<const N: usize>(part: &str, segment: Segment) -> Result<[u8; N], NotAnEnvelope> {
    let bytes = hex::decode(part).map_err(|_| NotAnEnvelope::InvalidHex(segment))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| NotAnEnvelope::WrongLength {
            segment,
            expected: N,
            got: bytes.len(),
        })
}

/// Whether `input` has the envelope shape.
pub fn is_envelope(input: &str) -> bool {
    Envelope::decode(input).is_ok()
}
