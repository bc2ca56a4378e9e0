//! Key Codec
//!
//! Every record key in a store belongs to exactly one of two classes:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────┐
//! │ Data key (Key::Sequence)     │ 8 bytes, big-endian u64              │
//! │ Metadata key (Key::Metadata) │ the literal bytes "height"           │
//! └──────────────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! Big-endian fixed-width encoding makes byte order equal numeric order, so
//! an ordered scan of the engine visits data records by sequence number.
//! `"height"` is 6 bytes long and can never collide with a data key.

use std::fmt;

use crate::error::{Result, SeqlogError};

/// Reserved key holding the height counter
pub const HEIGHT_KEY: &[u8] = b"height";

/// Width of an encoded data key
pub const SEQUENCE_KEY_LEN: usize = 8;

/// A decoded record key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// The reserved height key
    Metadata,

    /// A data record's sequence number
    Sequence(u64),
}

impl Key {
    /// Classify raw key bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if is_metadata_key(bytes) {
            return Ok(Key::Metadata);
        }
        decode(bytes).map(Key::Sequence)
    }

    /// Raw key bytes as stored in the engine
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Key::Metadata => HEIGHT_KEY.to_vec(),
            Key::Sequence(n) => encode(*n).to_vec(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Metadata => f.write_str("height"),
            Key::Sequence(n) => write!(f, "{}", n),
        }
    }
}

/// Encode a sequence number as a data key
pub fn encode(n: u64) -> [u8; SEQUENCE_KEY_LEN] {
    n.to_be_bytes()
}

/// Decode an 8-byte big-endian value
///
/// Used for both data keys and the height value.
pub fn decode(bytes: &[u8]) -> Result<u64> {
    let buf: [u8; SEQUENCE_KEY_LEN] = bytes.try_into().map_err(|_| {
        SeqlogError::Encoding(format!(
            "expected {} bytes, got {}",
            SEQUENCE_KEY_LEN,
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(buf))
}

/// True iff `bytes` is the reserved height key
pub fn is_metadata_key(bytes: &[u8]) -> bool {
    bytes == HEIGHT_KEY
}

/// Human-readable form of a raw key: `"height"` or the decimal sequence number
pub fn render_key_for_display(bytes: &[u8]) -> Result<String> {
    Key::from_bytes(bytes).map(|key| key.to_string())
}
