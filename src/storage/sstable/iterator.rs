//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::{Result, SeqlogError};

use super::{read_u32, HEADER_SIZE};

/// Iterator over SSTable entries in sorted key order
///
/// Owns its own file handle, so it stays valid while other readers seek.
pub struct SSTableIterator {
    file: BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
    /// Set after the first error; the iterator is fused from then on
    failed: bool,
}

impl SSTableIterator {
    /// Create a new iterator starting from the data block
    pub(super) fn new(mut file: File, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file: BufReader::new(file),
            end_offset,
            current_offset: HEADER_SIZE,
            failed: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = read_u32(&header, 0) as usize;
        let val_len = read_u32(&header, 4) as usize;

        let entry_size = 8 + key_len as u64 + val_len as u64;
        if self.current_offset + entry_size > self.end_offset {
            return Err(SeqlogError::Storage(format!(
                "SSTable entry at offset {} overruns data block",
                self.current_offset
            )));
        }

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;
        let mut value = vec![0u8; val_len];
        self.file.read_exact(&mut value)?;

        self.current_offset += entry_size;
        Ok((key, value))
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let entry = self.read_entry();
        if entry.is_err() {
            self.failed = true;
        }
        Some(entry)
    }
}
