//! Tests for the Storage layer
//!
//! These tests verify:
//! - SSTable build/read cycle and key ordering rules
//! - Corruption detection on open
//! - StorageManager flush, lookup order and rediscovery on reopen

use std::fs;

use seqlog::error::SeqlogError;
use seqlog::memtable::MemTable;
use seqlog::storage::{SSTableBuilder, SSTableReader, StorageManager};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memtable_with(entries: &[(&str, &str)]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in entries {
        memtable.put(key.as_bytes().to_vec(), value.as_bytes().to_vec());
    }
    memtable
}

// =============================================================================
// SSTable Tests
// =============================================================================

#[test]
fn test_sstable_build_and_read() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("000001.sst");

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"apple", b"red").unwrap();
    builder.add(b"banana", b"yellow").unwrap();
    builder.add(b"cherry", b"dark red").unwrap();
    let metadata = builder.finish().unwrap();

    assert_eq!(metadata.entry_count(), 3);
    assert_eq!(metadata.min_key, b"apple".to_vec());
    assert_eq!(metadata.max_key, b"cherry".to_vec());

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.get(b"banana").unwrap(), Some(b"yellow".to_vec()));
    assert_eq!(reader.get(b"blueberry").unwrap(), None);
    assert!(!reader.might_contain(b"zucchini"));

    let scanned: Vec<_> = reader.iter().unwrap().map(|item| item.unwrap().0).collect();
    assert_eq!(
        scanned,
        vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]
    );
}

#[test]
fn test_sstable_rejects_unsorted_keys() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("000001.sst");

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"b", b"2").unwrap();

    assert!(builder.add(b"a", b"1").is_err());
    assert!(builder.add(b"b", b"again").is_err());
}

#[test]
fn test_sstable_detects_flipped_data_byte() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("000001.sst");

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"key", b"value").unwrap();
    builder.finish().unwrap();

    let mut bytes = fs::read(&path).unwrap();
    // Inside the first data block entry
    bytes[20] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        SSTableReader::open(&path),
        Err(SeqlogError::Storage(_))
    ));
}

// =============================================================================
// StorageManager Tests
// =============================================================================

#[test]
fn test_manager_prefers_newest_table() {
    let temp_dir = TempDir::new().unwrap();
    let manager = StorageManager::open(temp_dir.path()).unwrap();

    manager.flush(&memtable_with(&[("k", "old"), ("only-old", "x")])).unwrap();
    manager.flush(&memtable_with(&[("k", "new")])).unwrap();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(manager.get(b"only-old").unwrap(), Some(b"x".to_vec()));
    assert_eq!(manager.get(b"absent").unwrap(), None);
}

#[test]
fn test_manager_rediscovers_tables_on_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let manager = StorageManager::open(temp_dir.path()).unwrap();
        manager.flush(&memtable_with(&[("a", "1")])).unwrap();
        manager.flush(&memtable_with(&[("a", "2")])).unwrap();
    }

    let manager = StorageManager::open(temp_dir.path()).unwrap();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.get(b"a").unwrap(), Some(b"2".to_vec()));
    // New tables continue the id sequence
    assert_eq!(manager.next_sstable_id(), 3);
}

#[test]
fn test_manager_removes_unfinished_table_on_open() {
    let temp_dir = TempDir::new().unwrap();

    {
        let manager = StorageManager::open(temp_dir.path()).unwrap();
        manager.flush(&memtable_with(&[("a", "1")])).unwrap();
    }
    let unfinished = temp_dir.path().join("sstable_000002.sst.tmp");
    fs::write(&unfinished, b"SQLG").unwrap();

    let manager = StorageManager::open(temp_dir.path()).unwrap();

    assert!(!unfinished.exists());
    assert_eq!(manager.sstable_count(), 1);
    assert_eq!(manager.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(manager.next_sstable_id(), 2);
}

#[test]
fn test_manager_refuses_empty_flush() {
    let temp_dir = TempDir::new().unwrap();
    let manager = StorageManager::open(temp_dir.path()).unwrap();

    assert!(manager.flush(&MemTable::new()).is_err());
    assert_eq!(manager.sstable_count(), 0);
}

#[test]
fn test_table_handles_are_newest_first() {
    let temp_dir = TempDir::new().unwrap();
    let manager = StorageManager::open(temp_dir.path()).unwrap();

    let first = manager.flush(&memtable_with(&[("a", "1")])).unwrap();
    let second = manager.flush(&memtable_with(&[("b", "2")])).unwrap();

    let handles = manager.table_handles();
    assert_eq!(handles.len(), 2);
    assert_eq!(handles[0].path, second.path);
    assert_eq!(handles[1].path, first.path);
}
