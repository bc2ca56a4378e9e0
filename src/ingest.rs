//! Line ingestion
//!
//! Turns line-delimited input into records keyed `offset, offset + 1, ...`.
//! Lines are raw bytes; nothing requires them to be valid UTF-8.
//! Key assignment lives here, with the caller, not in the datastore.

use std::io::BufRead;

use crate::datastore::Record;
use crate::error::{Result, SeqlogError};

/// One record per line of `input`, numbered from `offset`
///
/// Line terminators (`\n` or `\r\n`) are stripped; empty lines become empty
/// values.
pub fn records_from_lines<R: BufRead>(input: R, offset: u64) -> Result<Vec<Record>> {
    let mut records = Vec::new();

    for (i, line) in input.split(b'\n').enumerate() {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let seq = offset.checked_add(i as u64).ok_or_else(|| {
            SeqlogError::Encoding(format!("sequence overflow at line {} from offset {}", i + 1, offset))
        })?;
        records.push(Record::sequenced(seq, line));
    }

    Ok(records)
}
