//! # seqlog
//!
//! A persistent append log on top of an ordered, durable key-value engine:
//! - Lines (or arbitrary values) stored under monotonically assigned
//!   8-byte big-endian sequence keys
//! - First-write-wins deduplicated batch ingestion
//! - A persisted "height" counter committed atomically with every batch
//! - Ordered full-store export
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              seqlog-write / seqlog-read (CLI)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │   Datastore (dedup + height)     Exporter     KeyCodec      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  WriteBatch / get / Snapshot
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader, LOCK)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod lock;
pub mod memtable;
pub mod storage;
pub mod wal;

pub mod engine;
pub mod snapshot;

pub mod datastore;
pub mod export;
pub mod ingest;
pub mod keys;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use datastore::{BatchOutcome, Datastore, Record};
pub use engine::{Engine, WriteBatch};
pub use error::{Result, SeqlogError};
pub use export::{ExportMode, Exporter};
pub use keys::Key;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of seqlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
