//! SectorVault Admin CLI
//!
//! Operates directly on a data directory: manages folders and stores,
//! fetches and deletes sectors.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use sectorvault::wal::WalRecovery;
use sectorvault::{sector_root, Config, Engine, Hash, Result, VaultError};
use tracing_subscriber::{fmt, EnvFilter};

/// SectorVault admin tool
#[derive(Parser, Debug)]
#[command(name = "sectorvault")]
#[command(about = "Crash-safe sector storage engine")]
#[command(version)]
struct Args {
    /// Data directory (WAL and metadata)
    #[arg(short, long, default_value = "./sectorvault_data")]
    data_dir: PathBuf,

    /// Sector size in bytes
    #[arg(long, default_value = "4194304")]
    sector_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a storage folder
    AddFolder {
        path: PathBuf,

        /// Capacity in sectors
        capacity: u64,
    },

    /// Grow or shrink a folder
    ResizeFolder {
        path: PathBuf,

        /// New capacity in sectors
        capacity: u64,
    },

    /// Evacuate and remove a folder
    DeleteFolder { path: PathBuf },

    /// List folders
    Folders,

    /// Show total/used/free sectors
    Space,

    /// Store a file (zero-padded to one sector) and print its root
    Put { file: PathBuf },

    /// Fetch a sector by root
    Get {
        root: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Drop one reference to a sector
    Delete { root: String },

    /// Scan the WAL without recovering it
    WalCheck,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sectorvault=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("SectorVault v{}", sectorvault::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::WalCheck => wal_check(&args.data_dir),
        command => run_engine(&args.data_dir, args.sector_size, command),
    }
}

fn run_engine(data_dir: &Path, sector_size: u64, command: Commands) -> Result<()> {
    let config = Config::builder()
        .data_dir(data_dir)
        .sector_size(sector_size)
        .build();
    let engine = Engine::open_with_rocks_store(config)?;

    match command {
        Commands::AddFolder { path, capacity } => {
            let id = engine.add_folder(&path, capacity)?;
            println!("added folder {}", id);
        }
        Commands::ResizeFolder { path, capacity } => {
            engine.resize_folder(&path, capacity)?;
            println!("resized {} to {} sectors", path.display(), capacity);
        }
        Commands::DeleteFolder { path } => {
            engine.delete_folder(&path)?;
            println!("deleted {}", path.display());
        }
        Commands::Folders => {
            for f in engine.list_folders() {
                println!(
                    "{:>4}  {:>10}/{:<10}  {:?}  {}",
                    f.id,
                    f.occupied,
                    f.capacity,
                    f.status,
                    f.path.display()
                );
            }
        }
        Commands::Space => {
            let space = engine.available_space();
            println!(
                "total {}  used {}  free {}",
                space.total, space.used, space.free
            );
        }
        Commands::Put { file } => {
            let mut data = fs::read(&file)?;
            if data.len() as u64 > sector_size {
                return Err(VaultError::InvalidArgument(format!(
                    "{} is larger than one sector",
                    file.display()
                )));
            }
            data.resize(sector_size as usize, 0);
            let root = sector_root(&data);
            engine.add_sector(&root, &data)?;
            println!("{}", root);
        }
        Commands::Get { root, out } => {
            let data = engine.read_sector(&Hash::from_hex(&root)?)?;
            match out {
                Some(path) => fs::write(path, &data)?,
                None => io::stdout().write_all(&data)?,
            }
        }
        Commands::Delete { root } => {
            let root = Hash::from_hex(&root)?;
            engine.delete_sector(&root)?;
            println!("{} now has {} references", root, engine.sector_refs(&root)?);
        }
        // Opening the engine recovers and truncates the WAL
        Commands::WalCheck => {
            return Err(VaultError::InvalidArgument(
                "wal-check runs without opening the engine".to_string(),
            ))
        }
    }

    engine.close()
}

fn wal_check(data_dir: &Path) -> Result<()> {
    let stats = WalRecovery::verify(&data_dir.join(Engine::WAL_FILENAME))?;
    println!(
        "entries {}  corrupted {}  open transactions {}  last lsn {}  torn tail {}",
        stats.entries_recovered,
        stats.entries_corrupted,
        stats.pending,
        stats.last_lsn,
        stats.was_truncated
    );
    Ok(())
}
