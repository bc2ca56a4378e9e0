//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their on-disk
//! framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqlogError};

/// Framing header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Put several key-value pairs as one unit.
    /// The whole batch shares one CRC, so recovery applies all of it or none.
    Batch { puts: Vec<(Vec<u8>, Vec<u8>)> },
}

impl Operation {
    /// Number of key-value pairs carried by this operation
    pub fn put_count(&self) -> usize {
        match self {
            Operation::Put { .. } => 1,
            Operation::Batch { puts } => puts.len(),
        }
    }
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as `[LSN][CRC][Len][payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            SeqlogError::WalWrite(format!("entry too large: {} bytes", payload.len()))
        })?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode one framed entry, verifying length and checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SeqlogError::WalCorruption(format!(
                "entry shorter than header: {} bytes",
                bytes.len()
            )));
        }

        let (lsn, crc, len) = parse_header(&bytes[..HEADER_SIZE]);
        let payload = &bytes[HEADER_SIZE..];
        if payload.len() != len as usize {
            return Err(SeqlogError::WalCorruption(format!(
                "lsn {}: expected {} payload bytes, got {}",
                lsn,
                len,
                payload.len()
            )));
        }

        let actual = crc32fast::hash(payload);
        if actual != crc {
            return Err(SeqlogError::WalCorruption(format!(
                "lsn {}: crc mismatch (stored {:#010x}, computed {:#010x})",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| SeqlogError::WalCorruption(format!("lsn {}: {}", lsn, e)))?;
        if entry.lsn != lsn {
            return Err(SeqlogError::WalCorruption(format!(
                "header lsn {} does not match payload lsn {}",
                lsn, entry.lsn
            )));
        }

        Ok(entry)
    }
}

/// Split a header into (lsn, crc, payload_len)
pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&header[0..8]);
    crc.copy_from_slice(&header[8..12]);
    len.copy_from_slice(&header[12..16]);
    (
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_entry() -> WalEntry {
        WalEntry::new(
            7,
            Operation::Batch {
                puts: vec![
                    (b"k1".to_vec(), b"v1".to_vec()),
                    (b"k2".to_vec(), b"".to_vec()),
                ],
            },
        )
    }

    #[test]
    fn test_batch_entry_survives_framing() {
        let entry = batch_entry();
        let bytes = entry.serialize().unwrap();
        assert_eq!(WalEntry::deserialize(&bytes).unwrap(), entry);
        assert_eq!(entry.operation.put_count(), 2);
    }

    #[test]
    fn test_flipped_payload_byte_is_detected() {
        let mut bytes = batch_entry().serialize().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            WalEntry::deserialize(&bytes),
            Err(SeqlogError::WalCorruption(_))
        ));
    }

    #[test]
    fn test_truncated_entry_is_rejected() {
        let bytes = batch_entry().serialize().unwrap();
        assert!(WalEntry::deserialize(&bytes[..HEADER_SIZE - 1]).is_err());
        assert!(WalEntry::deserialize(&bytes[..bytes.len() - 1]).is_err());
    }
}
