//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,

    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock)
    ///
    /// Returns the approximate size after the write.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, value)
    }

    /// Apply every pair under a single write lock
    ///
    /// Returns the approximate size after the batch.
    pub fn put_batch(&self, puts: Vec<(Vec<u8>, Vec<u8>)>) -> usize {
        let mut data = self.data.write();
        let mut size = self.size.load(Ordering::SeqCst);
        for (key, value) in puts {
            size = self.insert_locked(&mut data, key, value);
        }
        size
    }

    fn insert_locked(
        &self,
        data: &mut BTreeMap<Vec<u8>, Vec<u8>>,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> usize {
        let added = key.len() + value.len();
        let removed = match data.insert(key.clone(), value) {
            Some(old) => key.len() + old.len(),
            None => 0,
        };

        if added >= removed {
            self.size.fetch_add(added - removed, Ordering::SeqCst) + (added - removed)
        } else {
            self.size.fetch_sub(removed - added, Ordering::SeqCst) - (removed - added)
        }
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Point-in-time copy of all entries
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.data.read().clone()
    }

    /// Iterate over a point-in-time copy of all entries, in sorted key order
    pub fn iter(&self) -> MemTableIterator {
        MemTableIterator {
            inner: self.snapshot().into_iter(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over MemTable entries
pub struct MemTableIterator {
    inner: btree_map::IntoIter<Vec<u8>, Vec<u8>>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
