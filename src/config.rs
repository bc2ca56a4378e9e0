//! Configuration for seqlog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, SeqlogError};

/// Main configuration for a seqlog store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── LOCK             (single-writer lock)
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy for single puts. Batches are always synced.
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./seqlog_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default config rooted at `path`
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self::builder().data_dir(path).build()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.memtable_size_limit == 0 {
            return Err(SeqlogError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(SeqlogError::Config(
                "EveryNEntries sync count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = Config::builder()
            .data_dir("/tmp/seqlog")
            .wal_sync_strategy(WalSyncStrategy::EveryWrite)
            .memtable_size_limit(4096)
            .build();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/seqlog"));
        assert_eq!(config.wal_sync_strategy, WalSyncStrategy::EveryWrite);
        assert_eq!(config.memtable_size_limit, 4096);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::builder().memtable_size_limit(0).build().validate().is_err());
        assert!(Config::builder()
            .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 0 })
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn test_for_path_keeps_other_defaults() {
        let config = Config::for_path("db");
        assert_eq!(config.data_dir, PathBuf::from("db"));
        assert_eq!(config.memtable_size_limit, Config::default().memtable_size_limit);
    }
}
