//! Tests for Export
//!
//! These tests verify:
//! - Exact output of both export modes
//! - Byte-order placement of the height record
//! - Ordering across memtable and several SSTables
//! - Export from an isolated snapshot, and output errors

use std::io::{self, Write};

use seqlog::config::{Config, WalSyncStrategy};
use seqlog::error::SeqlogError;
use seqlog::ingest;
use seqlog::{Datastore, ExportMode, Exporter, Record};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Datastore) {
    let temp_dir = TempDir::new().unwrap();
    let store = Datastore::open(temp_dir.path()).unwrap();
    (temp_dir, store)
}

fn export_string(store: &Datastore, values_only: bool) -> String {
    let mut out = Vec::new();
    store.export_all(&mut out, values_only).unwrap();
    String::from_utf8(out).unwrap()
}

/// Accepts a few bytes, then fails every write
struct FailingWriter {
    budget: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Output Format Tests
// =============================================================================

#[test]
fn test_export_empty_store() {
    let (_temp, store) = setup_temp_store();

    assert_eq!(export_string(&store, true), "");
    assert_eq!(export_string(&store, false), "");
}

#[test]
fn test_export_values_only() {
    let (_temp, store) = setup_temp_store();
    store
        .write_batch(ingest::records_from_lines("hello\nworld\n".as_bytes(), 0).unwrap())
        .unwrap();

    let mut out = Vec::new();
    let lines = store.export_all(&mut out, true).unwrap();

    assert_eq!(lines, 2);
    assert_eq!(out, b"hello\nworld\n".to_vec());
}

#[test]
fn test_export_with_keys_places_height_last() {
    let (_temp, store) = setup_temp_store();
    store
        .write_batch(vec![Record::sequenced(2, "c"), Record::sequenced(0, "a")])
        .unwrap();

    // Every data key starts with 0x00 for realistic sequence numbers, below b'h'
    assert_eq!(export_string(&store, false), "0\ta\n2\tc\nheight\t2\n");
}

#[test]
fn test_export_places_large_keys_after_height() {
    let (_temp, store) = setup_temp_store();
    // Top byte 0x69 sorts after b'h'
    let large = 0x69u64 << 56;
    store
        .write_batch(vec![Record::sequenced(large, "late"), Record::sequenced(0, "early")])
        .unwrap();

    assert_eq!(
        export_string(&store, false),
        format!("0\tearly\nheight\t2\n{}\tlate\n", large)
    );
    assert_eq!(export_string(&store, true), "early\nlate\n");
}

#[test]
fn test_export_orders_by_key_bytes_not_insertion() {
    let (_temp, store) = setup_temp_store();

    store.write_batch(vec![Record::sequenced(300, "x")]).unwrap();
    store.write_batch(vec![Record::sequenced(7, "y")]).unwrap();
    store.write_batch(vec![Record::sequenced(256, "z")]).unwrap();

    assert_eq!(export_string(&store, true), "y\nz\nx\n");
}

#[test]
fn test_export_keeps_raw_value_bytes() {
    let (_temp, store) = setup_temp_store();
    store
        .write_batch(vec![Record::sequenced(0, b"tab\there".to_vec())])
        .unwrap();

    assert_eq!(export_string(&store, false), "0\ttab\there\nheight\t1\n");
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_export_across_sstables_and_memtable() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .memtable_size_limit(48)
        .build();
    let store = Datastore::open_with_config(config).unwrap();

    // Descending offsets so every table overlaps the key range of the others
    for i in (0..12u64).rev() {
        store.write_batch(vec![Record::sequenced(i, format!("v{}", i))]).unwrap();
    }
    assert!(store.engine().sstable_count() > 1);

    let expected: String = (0..12).map(|i| format!("{}\tv{}\n", i, i)).collect();
    assert_eq!(export_string(&store, false), expected + "height\t12\n");
}

#[test]
fn test_export_after_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = Datastore::open(temp_dir.path()).unwrap();
        store
            .write_batch(ingest::records_from_lines("a\nb\nc\n".as_bytes(), 5).unwrap())
            .unwrap();
        store.close().unwrap();
    }

    let store = Datastore::open(temp_dir.path()).unwrap();
    assert_eq!(export_string(&store, false), "5\ta\n6\tb\n7\tc\nheight\t3\n");
}

#[test]
fn test_exporter_on_snapshot_ignores_later_batches() {
    let (_temp, store) = setup_temp_store();
    store.write_batch(vec![Record::sequenced(0, "before")]).unwrap();

    let snapshot = store.snapshot();
    store.write_batch(vec![Record::sequenced(1, "after")]).unwrap();

    let mut out = Vec::new();
    Exporter::new(ExportMode::ValuesOnly).export(&snapshot, &mut out).unwrap();

    assert_eq!(out, b"before\n".to_vec());
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_output_failure_is_io_error() {
    let (_temp, store) = setup_temp_store();
    store
        .write_batch(vec![Record::sequenced(0, "a fairly long value")])
        .unwrap();

    let err = store
        .export_all(&mut FailingWriter { budget: 4 }, true)
        .unwrap_err();

    assert!(matches!(err, SeqlogError::Io(_)));
}

#[test]
fn test_unrecognized_key_fails_export() {
    let (_temp, store) = setup_temp_store();
    store.write_batch(vec![Record::sequenced(0, "ok")]).unwrap();
    store.set_value(b"stray", b"value").unwrap();

    let mut out = Vec::new();
    let err = store.export_all(&mut out, true).unwrap_err();

    assert!(matches!(err, SeqlogError::Encoding(_)));
}
