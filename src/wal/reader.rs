//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::entry::parse_header;
use super::{WalEntry, HEADER_SIZE};
use crate::error::Result;

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// File length at open time
    file_len: u64,

    /// Offset just past the last entry returned
    position: u64,

    /// Set once a partially written entry is found at the tail
    torn_tail: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            file_len,
            position: 0,
            torn_tail: false,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// - `Ok(Some(entry))`: a complete, checksummed entry
    /// - `Ok(None)`: end of log (clean, or a torn tail; see `torn_tail`)
    /// - `Err(WalCorruption)`: a complete entry failed its checksum
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            self.torn_tail = true;
            return Ok(None);
        }

        let (_, _, len) = parse_header(&header);
        if self.position + (HEADER_SIZE as u64) + u64::from(len) > self.file_len {
            self.torn_tail = true;
            return Ok(None);
        }

        let mut bytes = vec![0u8; HEADER_SIZE + len as usize];
        bytes[..HEADER_SIZE].copy_from_slice(&header);
        let read = read_full(&mut self.reader, &mut bytes[HEADER_SIZE..])?;
        if read < len as usize {
            self.torn_tail = true;
            return Ok(None);
        }

        let entry = WalEntry::deserialize(&bytes)?;
        self.position += bytes.len() as u64;
        Ok(Some(entry))
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Byte offset just past the last valid entry
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True if the log ended in a partially written entry
    pub fn torn_tail(&self) -> bool {
        self.torn_tail
    }
}

/// Iterator over WAL entries; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
