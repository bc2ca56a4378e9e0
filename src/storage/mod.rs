//! Storage Module
//!
//! Persistent storage layer using SSTable-like format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Point lookups newest → oldest
//! - Full ordered scans for snapshots
//!
//! SSTables are write-once: there is no compaction and no deletion, so a
//! table file, once published, never changes.

mod manager;
mod sstable;

pub use manager::{StorageManager, TableHandle};
pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
