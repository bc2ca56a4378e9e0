//! seqlog Writer Binary
//!
//! Ingests a line-delimited file into a store as one deduplicated batch.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use seqlog::config::WalSyncStrategy;
use seqlog::{ingest, Config, Datastore, SeqlogError};
use tracing_subscriber::{fmt, EnvFilter};

/// seqlog Writer
#[derive(Parser, Debug)]
#[command(name = "seqlog-write")]
#[command(about = "Append the lines of a file to a seqlog store")]
#[command(version)]
struct Args {
    /// Data directory of the store
    #[arg(short, long)]
    db: PathBuf,

    /// Input file, one record per line
    #[arg(short, long)]
    infile: PathBuf,

    /// Sequence number assigned to the first line
    #[arg(short, long, default_value = "0")]
    offset: u64,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "64")]
    memtable_mb: usize,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_tracing(args.log_file.as_ref()) {
        eprintln!("Failed to open log file: {}", e);
        std::process::exit(1);
    }

    tracing::info!("seqlog-write v{}", seqlog::VERSION);
    tracing::info!("Data directory: {}", args.db.display());
    tracing::info!("Input file: {}", args.infile.display());

    let memtable_size_limit = match memtable_limit_bytes(args.memtable_mb) {
        Some(bytes) => bytes,
        None => {
            tracing::error!("--memtable-mb {} is too large", args.memtable_mb);
            std::process::exit(1);
        }
    };

    let config = Config::builder()
        .data_dir(&args.db)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .memtable_size_limit(memtable_size_limit)
        .build();

    let store = match Datastore::open_with_config(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let records = match File::open(&args.infile)
        .map_err(SeqlogError::from)
        .and_then(|file| ingest::records_from_lines(BufReader::new(file), args.offset))
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", args.infile.display(), e);
            std::process::exit(1);
        }
    };

    let lines = records.len();
    match store.write_batch(records) {
        Ok(outcome) => tracing::info!(
            lines,
            written = outcome.written,
            skipped = outcome.skipped,
            height = outcome.height,
            "Ingest complete"
        ),
        Err(e) => {
            tracing::error!("Batch write failed: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store: {}", e);
        std::process::exit(1);
    }
}

/// Megabytes to bytes; None if it does not fit in usize
fn memtable_limit_bytes(mb: usize) -> Option<usize> {
    mb.checked_mul(1024 * 1024)
}

/// Logs go to stderr unless a log file was given
fn init_tracing(log_file: Option<&PathBuf>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,seqlog=debug"));

    match log_file {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
