//! snapkv CLI
//!
//! Command-line interface for reading (and seeding) a snapshot store backed
//! by the in-memory engine. The engine is loaded from and saved back to a
//! bincode dump file between invocations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use snapkv::engine::MemoryEngine;
use snapkv::{Config, Key, KvIterator, MvccSnapshot, Snapshot, SnapshotStorage, Version};
use tracing_subscriber::{fmt, EnvFilter};

/// snapkv CLI
#[derive(Parser, Debug)]
#[command(name = "snapkv-cli")]
#[command(about = "Snapshot reads over a multi-version wide-column store")]
#[command(version)]
struct Args {
    /// Engine dump file
    #[arg(short, long, default_value = "./snapkv_data.bin")]
    data_file: PathBuf,

    /// Table name
    #[arg(short, long, default_value = "tidb")]
    store: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a value (at the next version unless --version is given)
    Put {
        key: String,
        value: String,

        /// Explicit version to write at
        #[arg(long)]
        version: Option<u64>,
    },

    /// Delete a key at the next version
    Del { key: String },

    /// Get the latest value of a key
    Get { key: String },

    /// Get the value of a key as of a version
    MvccGet { key: String, version: u64 },

    /// Get several keys at once
    BatchGet {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Get keys in [START, END]
    Range {
        start: String,
        end: String,

        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Iterate forward from START
    Scan {
        start: String,

        /// Only see writes at or below this version
        #[arg(long)]
        version: Option<u64>,

        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Print the latest committed version
    Version,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,snapkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("snapkv CLI v{}", snapkv::VERSION);
    tracing::debug!("Data file: {}", args.data_file.display());

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> snapkv::Result<()> {
    let config = Config::builder()
        .store_name(&args.store)
        .data_file(&args.data_file)
        .build()?;

    let engine = MemoryEngine::load(&config.data_file)?;
    let storage = SnapshotStorage::new(engine.clone(), config.clone())?;

    match args.command {
        Commands::Put { key, value, version } => {
            let ver = match version {
                Some(v) => {
                    let ver = Version::new(v);
                    engine.put_at(&config.store_name, key.as_bytes(), &config.column, ver, value)?;
                    ver
                }
                None => engine.put(&config.store_name, key.as_bytes(), &config.column, value)?,
            };
            engine.save(&config.data_file)?;
            println!("OK {}", ver);
        }
        Commands::Del { key } => {
            let ver = engine.delete(&config.store_name, key.as_bytes(), &config.column)?;
            engine.save(&config.data_file)?;
            println!("OK {}", ver);
        }
        Commands::Get { key } => {
            let snapshot = storage.get_snapshot()?;
            print_lookup(snapshot.get(key.as_bytes()))?;
        }
        Commands::MvccGet { key, version } => {
            let snapshot = storage.get_mvcc_snapshot()?;
            print_lookup(snapshot.mvcc_get(key.as_bytes(), Version::new(version)))?;
        }
        Commands::BatchGet { keys } => {
            let snapshot = storage.get_snapshot()?;
            let keys: Vec<Key> = keys.into_iter().map(Key::from).collect();
            let values = snapshot.batch_get(&keys)?;
            print_sorted(values.into_iter().collect());
        }
        Commands::Range { start, end, limit } => {
            let snapshot = storage.get_snapshot()?;
            let values = snapshot.range_get(start.as_bytes(), end.as_bytes(), limit)?;
            print_sorted(values.into_iter().collect());
        }
        Commands::Scan { start, version, limit } => {
            let snapshot = storage.get_mvcc_snapshot()?;
            let mut iter = match version {
                Some(v) => snapshot.new_mvcc_iterator(start.as_bytes(), Version::new(v))?,
                None => snapshot.new_iterator(start.as_bytes())?,
            };
            let mut printed = 0;
            while iter.valid() && printed < limit {
                if let (Some(key), Some(value)) = (iter.key(), iter.value()) {
                    println!("{} = {}", key.escape_ascii(), String::from_utf8_lossy(value));
                    printed += 1;
                }
                iter.advance()?;
            }
            iter.close();
        }
        Commands::Version => {
            println!("{}", storage.current_version()?);
        }
    }

    Ok(())
}

fn print_lookup(result: snapkv::Result<bytes::Bytes>) -> snapkv::Result<()> {
    match result {
        Ok(value) => {
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            println!("(not found)");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn print_sorted(mut entries: Vec<(Key, bytes::Bytes)>) {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in entries {
        println!("{} = {}", key, String::from_utf8_lossy(&value));
    }
}
