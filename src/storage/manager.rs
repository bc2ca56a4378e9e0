//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Hand out the current table set for snapshot scans

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, SeqlogError};
use crate::memtable::MemTable;

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Location of an immutable SSTable's data block, enough to scan it later
#[derive(Debug, Clone)]
pub struct TableHandle {
    pub path: PathBuf,
    pub index_offset: u64,
}

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files, deleting `.tmp` leftovers of
    ///    flushes that never finished
    /// 3. Open readers for each (validates checksums, loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if Self::is_unfinished_build(&file_path) {
                    warn!(path = %file_path.display(), "Removing unfinished SSTable");
                    fs::remove_file(&file_path)?;
                    continue;
                }
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    sstable_ids.push(id);
                }
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            sstables.push(SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        debug!(dir = %path.display(), sstables = sstables.len(), "Storage opened");

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Uses the write lock because SSTableReader::get() moves the file cursor.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }
            if let Some(value) = reader.get(key)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(SeqlogError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        // Entries come out of the BTreeMap already sorted
        let mut builder = SSTableBuilder::new(&path)?;
        for (key, value) in memtable.iter() {
            builder.add(&key, &value)?;
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, reader);

        debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "Flushed memtable to SSTable"
        );

        Ok(metadata)
    }

    /// Current SSTables, newest first
    ///
    /// SSTable files are never rewritten or removed, so the handles stay
    /// valid for as long as the caller needs them.
    pub fn table_handles(&self) -> Vec<TableHandle> {
        self.sstables
            .read()
            .iter()
            .map(|reader| TableHandle {
                path: reader.path().to_path_buf(),
                index_offset: reader.index_offset(),
            })
            .collect()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst.tmp": a build cut short by a crash
    fn is_unfinished_build(path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some("tmp")
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("sstable_"))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
