//! Exporter
//!
//! Renders records as text lines, one per record:
//!
//! | mode            | data record         | height record     |
//! |-----------------|---------------------|-------------------|
//! | `ValuesOnly`    | `<value>\n`         | (omitted)         |
//! | `KeysAndValues` | `<seq>\t<value>\n`  | `height\t<n>\n`   |
//!
//! Values are written as raw bytes. The height value is rendered as its
//! decimal number.

use std::io::Write;

use crate::error::{Result, SeqlogError};
use crate::keys::{self, Key};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    ValuesOnly,
    KeysAndValues,
}

impl ExportMode {
    pub fn from_values_only(values_only: bool) -> Self {
        if values_only {
            ExportMode::ValuesOnly
        } else {
            ExportMode::KeysAndValues
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Exporter {
    mode: ExportMode,
}

impl Exporter {
    pub fn new(mode: ExportMode) -> Self {
        Self { mode }
    }

    /// Render one record; returns false if the mode omits it
    pub fn write_record<W: Write>(&self, out: &mut W, key: &[u8], value: &[u8]) -> Result<bool> {
        match (self.mode, Key::from_bytes(key)?) {
            (ExportMode::ValuesOnly, Key::Metadata) => return Ok(false),
            (ExportMode::ValuesOnly, Key::Sequence(_)) => {}
            (ExportMode::KeysAndValues, Key::Metadata) => {
                writeln!(out, "{}\t{}", Key::Metadata, keys::decode(value)?)?;
                return Ok(true);
            }
            (ExportMode::KeysAndValues, key @ Key::Sequence(_)) => {
                write!(out, "{}\t", key)?;
            }
        }

        out.write_all(value)?;
        out.write_all(b"\n")?;
        Ok(true)
    }

    /// Write every record of `snapshot` in ascending key order
    ///
    /// Snapshot failures surface as `StorageRead`; failures of `out` as `Io`.
    /// Returns the number of lines written.
    pub fn export<W: Write>(&self, snapshot: &Snapshot, out: &mut W) -> Result<u64> {
        let mut lines = 0u64;

        for item in snapshot.iter().map_err(SeqlogError::storage_read)? {
            let (key, value) = item.map_err(SeqlogError::storage_read)?;
            if self.write_record(out, &key, &value)? {
                lines += 1;
            }
        }

        out.flush()?;
        Ok(lines)
    }
}
