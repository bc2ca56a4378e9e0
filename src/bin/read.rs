//! seqlog Reader Binary
//!
//! Exports every record of a store, in key order, to stdout or a file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use seqlog::Datastore;
use tracing_subscriber::{fmt, EnvFilter};

/// seqlog Reader
#[derive(Parser, Debug)]
#[command(name = "seqlog-read")]
#[command(about = "Export the contents of a seqlog store")]
#[command(version)]
struct Args {
    /// Data directory of the store
    #[arg(short, long)]
    db: PathBuf,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Prefix every line with its key, and include the height record
    #[arg(short = 'k', long)]
    with_keys: bool,

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

    tracing::info!("seqlog-read v{}", seqlog::VERSION);
    tracing::info!("Data directory: {}", args.db.display());

    let store = match Datastore::open(&args.db) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let mut out: Box<dyn Write> = match &args.out {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(e) => {
                tracing::error!("Failed to create {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match store.export_all(&mut out, !args.with_keys) {
        Ok(lines) => tracing::info!(lines, "Export complete"),
        Err(e) => {
            tracing::error!("Export failed: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr unless a log file was given
fn init_tracing(log_file: Option<&PathBuf>) -> io::Result<()> {
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
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}
