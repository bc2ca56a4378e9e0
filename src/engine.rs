//! Engine Module
//!
//! The ordered, durable key-value engine underneath the datastore.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Apply write batches atomically
//! - Hand out point-in-time snapshots for ordered scans
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::lock::DirLock;
use crate::memtable::MemTable;
use crate::snapshot::Snapshot;
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// A set of puts applied as one unit by [`Engine::write_batch`]
///
/// Later puts to the same key within one batch overwrite earlier ones,
/// exactly as if they had been applied in order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteBatch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.puts.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
    }
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/write_batch/flush): Serialized by `write_lock`
///   - Must acquire: write_lock → WAL → memtable → storage (write)
///
/// - **Reads** (get): No write_lock needed
///   - MemTable uses internal RwLock (many concurrent readers)
///   - StorageManager takes its write lock for SSTable seeks
///
/// - **Snapshots**: taken under `write_lock`, so they never see half of a
///   batch or a flush in progress
///
/// One process per data directory, enforced by `DirLock`.
pub struct Engine {
    config: Config,

    /// Directory for SSTables
    storage_dir: PathBuf,

    /// Write-ahead log for durability
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations and snapshot creation
    write_lock: Mutex<()>,

    /// Dropped last, after every file handle above
    _dir_lock: DirLock,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory and take the directory lock
    /// 2. Load existing SSTables
    /// 3. Replay the WAL, flush what it held, then truncate it
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let dir_lock = DirLock::acquire(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let mut recovered = false;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;

            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "WAL recovery"
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Batch { puts } => {
                        memtable.put_batch(puts);
                    }
                }
            }

            // Make recovered data durable in an SSTable before the WAL goes
            if !memtable.is_empty() {
                info!(entries = memtable.entry_count(), "Flushing recovered entries to SSTable");
                storage.flush(&memtable)?;
                memtable.clear();
                recovered = true;
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if recovered {
            wal.truncate()?;
        }

        info!(
            data_dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            "Engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            _dir_lock: dir_lock,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::for_path(path))
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.memtable.get(key) {
            return Ok(Some(value));
        }
        self.storage.get(key)
    }

    /// Put a single key-value pair
    ///
    /// Synced according to the configured `WalSyncStrategy`.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;

        self.memtable.put(key.to_vec(), value.to_vec());
        self.maybe_flush()
    }

    /// Apply every put in `batch` atomically
    ///
    /// The batch is one fsynced WAL entry. If that append fails nothing is
    /// applied; once it succeeds the whole batch is visible at once and
    /// survives a crash, so a failed follow-up flush is logged rather than
    /// reported. The memtable keeps the data and the next write retries.
    pub fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _write_guard = self.write_lock.lock();

        let operation = Operation::Batch { puts: batch.puts };
        let lsn = self.wal.lock().append_durable(operation.clone())?;

        if let Operation::Batch { puts } = operation {
            debug!(lsn, puts = puts.len(), "Applying batch");
            self.memtable.put_batch(puts);
        }

        if let Err(e) = self.maybe_flush() {
            warn!(lsn, error = %e, "Flush after batch failed");
        }
        Ok(())
    }

    /// Point-in-time view of the whole store
    pub fn snapshot(&self) -> Snapshot {
        let _write_guard = self.write_lock.lock();
        Snapshot::new(self.memtable.snapshot(), self.storage.table_handles())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Called with write lock held
    fn maybe_flush(&self) -> Result<()> {
        if self.memtable.should_flush(self.config.memtable_size_limit) {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        info!(data_dir = %self.config.data_dir.display(), "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Swap the WAL for one that refuses every append
    #[cfg(test)]
    pub(crate) fn make_wal_unwritable(&self) -> Result<()> {
        let path = self.config.data_dir.join(Self::WAL_FILENAME);
        *self.wal.lock() = WalWriter::read_only(&path, self.config.wal_sync_strategy)?;
        Ok(())
    }
}
