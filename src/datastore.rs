//! Datastore
//!
//! The append log proper: deduplicated batch ingestion with height
//! bookkeeping, point lookups and full-store export, on top of [`Engine`].
//!
//! ## Write path
//! ```text
//!  records ──► validate keys ──► read height ──► dedup ──► one atomic batch
//!                                                 │        (survivors + new height)
//!                                                 └─ skip keys already committed
//!                                                    or staged earlier in this batch
//! ```
//!
//! Height and data commit in the same WAL entry, so after any crash the
//! height counter still equals the number of data records ever written.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::engine::{Engine, WriteBatch};
use crate::error::{Result, SeqlogError};
use crate::export::{ExportMode, Exporter};
use crate::keys::{self, Key, HEIGHT_KEY, SEQUENCE_KEY_LEN};
use crate::snapshot::Snapshot;

/// A candidate record for [`Datastore::write_batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Record keyed by the encoding of sequence number `n`
    pub fn sequenced(n: u64, value: impl Into<Vec<u8>>) -> Self {
        Self::new(keys::encode(n).to_vec(), value)
    }
}

/// What a call to [`Datastore::write_batch`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records committed by this call
    pub written: u64,

    /// Records skipped because their key already existed
    pub skipped: u64,

    /// Height after the call
    pub height: u64,
}

/// An open append log
///
/// Owns the engine, and with it the data directory, until dropped or closed.
pub struct Datastore {
    engine: Engine,
}

impl Datastore {
    /// Open or create a store at `path` with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(Config::for_path(path.as_ref()))
    }

    pub fn open_with_config(config: Config) -> Result<Self> {
        let path = config.data_dir.clone();
        let engine =
            Engine::open(config).map_err(|e| SeqlogError::storage_open(path, e))?;
        Ok(Self { engine })
    }

    /// True iff `key` exists; absence is not an error
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.engine
            .get(key)
            .map(|value| value.is_some())
            .map_err(SeqlogError::storage_read)
    }

    /// Owned copy of the value under `key`
    ///
    /// A missing key is a `StorageRead` error wrapping `KeyNotFound`.
    pub fn get_value(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.engine
            .get(key)
            .map_err(SeqlogError::storage_read)?
            .ok_or_else(|| SeqlogError::storage_read(SeqlogError::KeyNotFound))
    }

    /// Number of data records committed over the store's lifetime
    ///
    /// 0 for a fresh store.
    pub fn height(&self) -> Result<u64> {
        match self.engine.get(HEIGHT_KEY).map_err(SeqlogError::storage_read)? {
            None => Ok(0),
            Some(bytes) => keys::decode(&bytes),
        }
    }

    /// Commit every record whose key is new, together with the new height
    ///
    /// - Keys must be 8-byte data keys; anything else (including `"height"`)
    ///   fails the whole call with `Encoding` before anything is written.
    /// - A key already in the store, or repeated within `records`, is
    ///   skipped: the first write of a key wins.
    /// - Survivors and the updated height land in one atomic engine batch.
    ///   On failure nothing is applied and height is unchanged.
    /// - If every record is skipped, nothing is written.
    pub fn write_batch(&self, records: impl IntoIterator<Item = Record>) -> Result<BatchOutcome> {
        let records: Vec<Record> = records.into_iter().collect();

        if let Some(bad) = records.iter().find(|r| r.key.len() != SEQUENCE_KEY_LEN) {
            return Err(SeqlogError::Encoding(format!(
                "record key must be a {}-byte sequence number, got {} bytes",
                SEQUENCE_KEY_LEN,
                bad.key.len()
            )));
        }

        let height = self.height()?;

        let mut staged: HashSet<Vec<u8>> = HashSet::with_capacity(records.len());
        let mut batch = WriteBatch::new();
        let mut skipped = 0u64;

        for record in records {
            if staged.contains(&record.key) || self.has(&record.key)? {
                skipped += 1;
                continue;
            }
            staged.insert(record.key.clone());
            batch.put(record.key, record.value);
        }

        let written = batch.len() as u64;
        if written == 0 {
            debug!(skipped, height, "Batch had no new keys");
            return Ok(BatchOutcome {
                written,
                skipped,
                height,
            });
        }

        let new_height = height.checked_add(written).ok_or_else(|| {
            SeqlogError::Encoding(format!("height overflow: {} + {}", height, written))
        })?;
        batch.put(Key::Metadata.to_bytes(), keys::encode(new_height).to_vec());

        self.engine
            .write_batch(batch)
            .map_err(SeqlogError::storage_write)?;

        debug!(written, skipped, height = new_height, "Batch committed");

        Ok(BatchOutcome {
            written,
            skipped,
            height: new_height,
        })
    }

    /// Store a single pair as-is, bypassing dedup and height bookkeeping
    pub fn set_value(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.engine
            .put(key, value)
            .map_err(SeqlogError::storage_write)
    }

    /// Write every record, in key order, to `out`
    ///
    /// Returns the number of lines written.
    pub fn export_all<W: Write>(&self, out: &mut W, values_only: bool) -> Result<u64> {
        Exporter::new(ExportMode::from_values_only(values_only)).export(&self.snapshot(), out)
    }

    /// Point-in-time view of the store
    pub fn snapshot(&self) -> Snapshot {
        self.engine.snapshot()
    }

    /// Flush everything to SSTables and release the data directory
    pub fn close(self) -> Result<()> {
        self.engine.close().map_err(SeqlogError::storage_write)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Datastore) {
        let temp = TempDir::new().unwrap();
        let store = Datastore::open(temp.path()).unwrap();
        (temp, store)
    }

    #[test]
    fn test_fresh_store_has_zero_height() {
        let (_temp, store) = open_temp();
        assert_eq!(store.height().unwrap(), 0);
    }

    #[test]
    fn test_in_batch_duplicate_first_wins() {
        let (_temp, store) = open_temp();

        let outcome = store
            .write_batch(vec![Record::sequenced(5, "a"), Record::sequenced(5, "b")])
            .unwrap();

        assert_eq!(outcome, BatchOutcome { written: 1, skipped: 1, height: 1 });
        assert_eq!(store.get_value(&keys::encode(5)).unwrap(), b"a".to_vec());
    }

    #[test]
    fn test_non_sequence_keys_are_rejected_whole() {
        let (_temp, store) = open_temp();

        let err = store
            .write_batch(vec![Record::sequenced(0, "ok"), Record::new(HEIGHT_KEY, "x")])
            .unwrap_err();

        assert!(matches!(err, SeqlogError::Encoding(_)));
        assert!(!store.has(&keys::encode(0)).unwrap());
        assert_eq!(store.height().unwrap(), 0);
    }

    #[test]
    fn test_all_duplicates_writes_nothing() {
        let (_temp, store) = open_temp();
        store.write_batch(vec![Record::sequenced(0, "x")]).unwrap();
        let entries_before = store.engine().memtable_entry_count();

        let outcome = store.write_batch(vec![Record::sequenced(0, "y")]).unwrap();

        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.height, 1);
        assert_eq!(store.engine().memtable_entry_count(), entries_before);
    }

    #[test]
    fn test_failed_batch_changes_nothing() {
        let (_temp, store) = open_temp();
        store.write_batch(vec![Record::sequenced(0, "kept")]).unwrap();
        store.engine.make_wal_unwritable().unwrap();

        let err = store
            .write_batch(vec![Record::sequenced(1, "lost"), Record::sequenced(2, "lost")])
            .unwrap_err();

        match err {
            SeqlogError::StorageWrite(source) => {
                assert!(matches!(*source, SeqlogError::WalWrite(_)))
            }
            other => panic!("expected StorageWrite, got {:?}", other),
        }
        assert_eq!(store.height().unwrap(), 1);
        assert!(!store.has(&keys::encode(1)).unwrap());
        assert!(!store.has(&keys::encode(2)).unwrap());
        assert_eq!(store.get_value(&keys::encode(0)).unwrap(), b"kept".to_vec());
    }

    #[test]
    fn test_malformed_height_value_is_encoding_error() {
        let (_temp, store) = open_temp();
        store.set_value(HEIGHT_KEY, b"bad").unwrap();
        assert!(matches!(store.height(), Err(SeqlogError::Encoding(_))));
    }
}
