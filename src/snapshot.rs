//! Read Snapshots
//!
//! A snapshot pins a copy of the memtable and the list of SSTables that
//! existed when it was taken. SSTables are immutable, so later writes and
//! flushes cannot change what a snapshot sees.
//!
//! Iteration is a k-way merge over every source in ascending key order.
//! When a key appears in several sources the newest one wins:
//!
//! ```text
//!   source 0: memtable copy         (newest)
//!   source 1: newest SSTable
//!   ...
//!   source n: oldest SSTable        (oldest)
//! ```

use std::collections::BTreeMap;

use crate::error::Result;
use crate::storage::{SSTableReader, TableHandle};

type Entry = (Vec<u8>, Vec<u8>);
type Source<'a> = Box<dyn Iterator<Item = Result<Entry>> + 'a>;

/// Point-in-time view of an engine
#[derive(Debug)]
pub struct Snapshot {
    memtable: BTreeMap<Vec<u8>, Vec<u8>>,

    /// Newest first
    tables: Vec<TableHandle>,
}

impl Snapshot {
    pub(crate) fn new(memtable: BTreeMap<Vec<u8>, Vec<u8>>, tables: Vec<TableHandle>) -> Self {
        Self { memtable, tables }
    }

    /// Iterate every record in ascending key order
    pub fn iter(&self) -> Result<SnapshotIter<'_>> {
        let mut sources: Vec<Source<'_>> = Vec::with_capacity(1 + self.tables.len());

        sources.push(Box::new(
            self.memtable.iter().map(|(k, v)| Ok((k.clone(), v.clone()))),
        ));
        for table in &self.tables {
            sources.push(Box::new(SSTableReader::scan(&table.path, table.index_offset)?));
        }

        SnapshotIter::new(sources)
    }

    /// Number of SSTables pinned by this snapshot
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

/// Merging iterator returned by [`Snapshot::iter`]
///
/// Fused after the first error.
pub struct SnapshotIter<'a> {
    sources: Vec<Source<'a>>,

    /// Next unconsumed entry of each source
    heads: Vec<Option<Entry>>,

    failed: bool,
}

impl<'a> SnapshotIter<'a> {
    fn new(mut sources: Vec<Source<'a>>) -> Result<Self> {
        let mut heads = Vec::with_capacity(sources.len());
        for source in sources.iter_mut() {
            heads.push(source.next().transpose()?);
        }

        Ok(Self {
            sources,
            heads,
            failed: false,
        })
    }

    fn advance(&mut self, i: usize) -> Result<()> {
        self.heads[i] = self.sources[i].next().transpose()?;
        Ok(())
    }
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        // min_by keeps the first of equal keys, i.e. the newest source
        let winner = self
            .heads
            .iter()
            .enumerate()
            .filter_map(|(i, head)| head.as_ref().map(|(key, _)| (i, key)))
            .min_by(|a, b| a.1.cmp(b.1))?
            .0;

        let (key, value) = self.heads[winner].take()?;

        for i in 0..self.heads.len() {
            let shadowed = self.heads[i].as_ref().is_some_and(|(k, _)| *k == key);
            if i == winner || shadowed {
                if let Err(e) = self.advance(i) {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        Some(Ok((key, value)))
    }
}
