//! vbakv CLI
//!
//! Inspect and edit a local vbakv store.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use vbakv::kv_iter::Entry;
use vbakv::{Config, IterOptions, KvStore, VariableByteStore};

/// vbakv CLI
#[derive(Parser, Debug)]
#[command(name = "vbakv")]
#[command(about = "Local maintenance tool for vbakv stores")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./vbakv_data")]
    data_dir: PathBuf,

    /// Values are stored in the byte store (vba mode)
    #[arg(long)]
    vba: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        key: String,
    },

    /// Set a key-value pair
    Set {
        key: String,
        value: String,
    },

    /// Delete a key
    Del {
        key: String,
    },

    /// List keys (and values) in a range or under a prefix
    Scan {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        stop: Option<String>,

        #[arg(long, conflicts_with_all = ["start", "stop"])]
        prefix: Option<String>,

        /// Exclude the start key itself
        #[arg(long)]
        exclude_start: bool,

        /// Include the stop key itself
        #[arg(long)]
        include_stop: bool,

        #[arg(long)]
        reverse: bool,

        /// Print keys only
        #[arg(long)]
        keys_only: bool,

        /// Stop after this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show byte store record count and file sizes
    BlobStat,

    /// Print a byte store record by id
    BlobGet {
        id: u64,
    },

    /// Drop the newest K byte store records if no key references them
    BlobTruncate {
        k: u64,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vbakv=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    tracing::debug!("vbakv v{} on {}", vbakv::VERSION, args.data_dir.display());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> vbakv::Result<()> {
    match args.command {
        Commands::BlobStat => {
            let blobs = VariableByteStore::open_dir(&args.data_dir, false)?;
            println!("records:    {}", blobs.len());
            println!("index size: {}", blobs.index_size());
            println!("data size:  {}", blobs.data_size());
            return Ok(());
        }
        Commands::BlobGet { id } => {
            let blobs = VariableByteStore::open_dir(&args.data_dir, false)?;
            println!("{}", String::from_utf8_lossy(&blobs.select_id(id)?));
            return Ok(());
        }
        _ => {}
    }

    // Truncation checks record pointers, so it always runs in vba mode
    let vba = args.vba || matches!(args.command, Commands::BlobTruncate { .. });
    let store = KvStore::open(
        Config::builder()
            .data_dir(&args.data_dir)
            .vba_engine(vba)
            .build(),
    )?;

    match args.command {
        Commands::Get { key } => match store.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            store.set(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            store.remove(key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan {
            start,
            stop,
            prefix,
            exclude_start,
            include_stop,
            reverse,
            keys_only,
            limit,
        } => {
            let mut options = IterOptions::new()
                .include_start(!exclude_start)
                .include_stop(include_stop)
                .include_value(!keys_only)
                .reverse(reverse);
            if let Some(start) = start {
                options = options.start(start);
            }
            if let Some(stop) = stop {
                options = options.stop(stop);
            }
            if let Some(prefix) = prefix {
                options = options.prefix(prefix);
            }

            let iter = store.iterator(options)?;
            for entry in iter.take(limit.unwrap_or(usize::MAX)) {
                match entry? {
                    Entry::Pair(k, v) => println!(
                        "{}\t{}",
                        String::from_utf8_lossy(&k),
                        String::from_utf8_lossy(&v)
                    ),
                    Entry::Key(k) => println!("{}", String::from_utf8_lossy(&k)),
                    Entry::Value(v) => println!("{}", String::from_utf8_lossy(&v)),
                }
            }
        }
        Commands::BlobTruncate { k } => {
            let first_removed = store.truncate_blobs(k)?;
            println!("removed ids {}..{}", first_removed, first_removed + k);
        }
        Commands::BlobStat | Commands::BlobGet { .. } => {}
    }

    store.close()
}
