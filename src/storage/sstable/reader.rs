//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Result, SeqlogError};

use super::iterator::SSTableIterator;
use super::{read_u32, read_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for point lookups
    file: BufReader<File>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header, footer and data checksum, then loads the index.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let corrupt = |what: String| {
            SeqlogError::Storage(format!("{}: {}", path.display(), what))
        };

        if (bytes.len() as u64) < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(format!("file too short ({} bytes)", bytes.len())));
        }

        if &bytes[0..4] != MAGIC {
            return Err(corrupt(format!(
                "invalid SSTable magic: expected SQLG, got {:?}",
                &bytes[0..4]
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(corrupt(format!("unsupported SSTable version: {}", version)));
        }

        let entry_count = read_u64(&bytes, 6);

        let footer_start = bytes.len() - FOOTER_SIZE as usize;
        let index_offset = read_u64(&bytes, footer_start);
        let data_crc = read_u32(&bytes, footer_start + 8);

        if index_offset < HEADER_SIZE || index_offset > footer_start as u64 {
            return Err(corrupt(format!("index offset {} out of range", index_offset)));
        }

        let actual_crc = crc32fast::hash(&bytes[HEADER_SIZE as usize..index_offset as usize]);
        if actual_crc != data_crc {
            return Err(corrupt(format!(
                "data checksum mismatch (stored {:#010x}, computed {:#010x})",
                data_crc, actual_crc
            )));
        }

        // Index entries: [key_len(4)][offset(8)][key]
        let index_data = &bytes[index_offset as usize..footer_start];
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(corrupt("truncated index entry".to_string()));
            }
            let key_len = read_u32(index_data, pos) as usize;
            let offset = read_u64(index_data, pos + 4);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(corrupt("truncated index key".to_string()));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(corrupt(format!(
                "header says {} entries, index has {}",
                entry_count,
                index.len()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(File::open(path)?),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Get a value by key: O(log n) lookup via in-memory index
    ///
    /// Returns `Ok(None)` if the key is not in this SSTable.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = read_u32(&header, 0) as i64;
        let val_len = read_u32(&header, 4) as usize;

        // Skip the key (we already know it matches)
        self.file.seek(SeekFrom::Current(key_len))?;

        let mut value = vec![0u8; val_len];
        self.file.read_exact(&mut value)?;

        Ok(Some(value))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Iterate over all entries in key order on a fresh file handle
    pub fn iter(&self) -> Result<SSTableIterator> {
        Self::scan(&self.path, self.index_offset)
    }

    /// Iterate an SSTable file whose data block ends at `index_offset`
    pub(crate) fn scan(path: &Path, index_offset: u64) -> Result<SSTableIterator> {
        SSTableIterator::new(File::open(path)?, index_offset)
    }

    pub(crate) fn index_offset(&self) -> u64 {
        self.index_offset
    }
}

#[cfg(test)]
mod tests {
    use super::super::SSTableBuilder;
    use super::*;
    use tempfile::TempDir;

    fn build(path: &Path, count: usize) {
        let mut builder = SSTableBuilder::new(path).unwrap();
        for i in 0..count {
            builder
                .add(format!("key{:05}", i).as_bytes(), format!("value{}", i).as_bytes())
                .unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn test_build_and_get() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.sst");
        build(&path, 50);

        let mut reader = SSTableReader::open(&path).unwrap();
        assert_eq!(reader.entry_count(), 50);
        assert_eq!(reader.get(b"key00007").unwrap(), Some(b"value7".to_vec()));
        assert_eq!(reader.get(b"nope").unwrap(), None);
        assert!(reader.might_contain(b"key00010"));
        assert!(!reader.might_contain(b"zzz"));
    }

    #[test]
    fn test_iter_yields_sorted_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.sst");
        build(&path, 10);

        let reader = SSTableReader::open(&path).unwrap();
        let entries: Vec<_> = reader.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0], (b"key00000".to_vec(), b"value0".to_vec()));
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_empty_sstable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.sst");
        let meta = SSTableBuilder::new(&path).unwrap().finish().unwrap();
        assert_eq!(meta.entry_count(), 0);
        assert!(!meta.might_contain(b""));

        let reader = SSTableReader::open(&path).unwrap();
        assert_eq!(reader.iter().unwrap().count(), 0);
    }

    #[test]
    fn test_out_of_order_add_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut builder = SSTableBuilder::new(&temp.path().join("t.sst")).unwrap();
        builder.add(b"b", b"1").unwrap();
        assert!(builder.add(b"a", b"2").is_err());
        assert!(builder.add(b"b", b"3").is_err());
    }

    #[test]
    fn test_corrupted_data_block_fails_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.sst");
        build(&path, 3);

        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_SIZE as usize + 9] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(SSTableReader::open(&path), Err(SeqlogError::Storage(_))));
    }
}
