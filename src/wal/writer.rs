//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::warn;

use super::{Operation, WalEntry, WalRecovery};
use crate::config::WalSyncStrategy;
use crate::error::{Result, SeqlogError};

/// Writes entries to the WAL file
///
/// Each entry is framed in memory and handed to the OS in one `write_all`,
/// so there is nothing to gain from an extra userspace buffer.
pub struct WalWriter {
    /// Append-mode handle
    file: File,

    /// Bytes in the file that belong to complete entries
    len: u64,

    /// LSN that the next appended entry receives
    current_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries written since the last fsync
    uncommitted: usize,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// LSNs continue after the last valid entry already in the file.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file,
            len,
            current_lsn: last_lsn + 1,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Writer over a read-only handle: every append fails
    #[cfg(test)]
    pub(crate) fn read_only(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = WalRecovery::verify(path)?.last_lsn;
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file,
            len,
            current_lsn: last_lsn + 1,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append an operation, syncing according to the configured strategy
    ///
    /// Returns the LSN assigned to the entry.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.write_entry(operation)?;

        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => self.sync()?,
            WalSyncStrategy::EveryNEntries { count } => {
                if self.uncommitted >= count {
                    self.sync()?;
                }
            }
        }

        Ok(lsn)
    }

    /// Append an operation and fsync before returning, whatever the strategy
    ///
    /// If the write or the sync fails the file is cut back to where it was,
    /// so a failed entry can never be replayed.
    pub fn append_durable(&mut self, operation: Operation) -> Result<u64> {
        let len_before = self.len;
        let lsn_before = self.current_lsn;

        let outcome = self.write_entry(operation).and_then(|lsn| {
            self.sync()?;
            Ok(lsn)
        });

        if outcome.is_err() {
            self.rollback(len_before, lsn_before);
        }
        outcome
    }

    fn write_entry(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let bytes = WalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self.file.write_all(&bytes) {
            self.rollback(self.len, lsn);
            return Err(SeqlogError::WalWrite(format!("lsn {}: {}", lsn, e)));
        }

        self.len += bytes.len() as u64;
        self.current_lsn += 1;
        self.uncommitted += 1;
        Ok(lsn)
    }

    fn rollback(&mut self, len: u64, lsn: u64) {
        if let Err(e) = self.file.set_len(len) {
            warn!(len, error = %e, "Failed to cut back WAL after a failed append");
        }
        self.len = len;
        self.current_lsn = lsn;
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard all entries (their contents are durable elsewhere)
    ///
    /// LSNs keep counting up from where they were.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        self.uncommitted = 0;
        Ok(())
    }

    /// Get the current LSN (the one the next entry receives)
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Entries appended since the last sync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }
}
