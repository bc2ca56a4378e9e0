//! Error types for seqlog
//!
//! Provides a unified error type for all operations, from the WAL up to the
//! datastore's write and export paths.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using SeqlogError
pub type Result<T> = std::result::Result<T, SeqlogError>;

/// Unified error type for seqlog operations
#[derive(Debug, Error)]
pub enum SeqlogError {
    // -------------------------------------------------------------------------
    // Datastore Errors
    // -------------------------------------------------------------------------
    #[error("Cannot open store at {}: {source}", .path.display())]
    StorageOpen {
        path: PathBuf,
        #[source]
        source: Box<SeqlogError>,
    },

    #[error("Storage read failed: {0}")]
    StorageRead(#[source] Box<SeqlogError>),

    #[error("Storage write failed: {0}")]
    StorageWrite(#[source] Box<SeqlogError>),

    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Engine Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Data directory {} is locked by another process", .0.display())]
    Locked(PathBuf),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SeqlogError {
    /// Wrap an engine error as a failed open of the store at `path`
    pub fn storage_open(path: impl Into<PathBuf>, source: SeqlogError) -> Self {
        SeqlogError::StorageOpen {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an engine error as a failed read
    pub fn storage_read(source: SeqlogError) -> Self {
        SeqlogError::StorageRead(Box::new(source))
    }

    /// Wrap an engine error as a failed write
    pub fn storage_write(source: SeqlogError) -> Self {
        SeqlogError::StorageWrite(Box::new(source))
    }

    /// True if this is a read failure caused by a missing key
    pub fn is_key_not_found(&self) -> bool {
        match self {
            SeqlogError::KeyNotFound => true,
            SeqlogError::StorageRead(source) => source.is_key_not_found(),
            _ => false,
        }
    }
}

impl From<bincode::Error> for SeqlogError {
    fn from(err: bincode::Error) -> Self {
        SeqlogError::Serialization(err.to_string())
    }
}
