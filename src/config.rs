//! Configuration for SectorVault
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, VaultError};
use crate::merkle::MAX_CACHE_HEIGHT;

/// Main configuration for a SectorVault engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for engine-owned files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── metadata/        (file-backed metadata store, binary only)
    ///
    /// Folder extent files live under each folder's own path.
    pub data_dir: PathBuf,

    /// Size of one sector in bytes
    pub sector_size: u64,

    /// Smallest folder capacity accepted, in sectors
    pub min_sectors_per_folder: u64,

    /// Largest folder capacity accepted, in sectors
    pub max_sectors_per_folder: u64,

    /// Maximum number of registered folders
    pub max_folders: usize,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync release records
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Folder Selection
    // -------------------------------------------------------------------------
    /// Number of scan passes before selection gives up
    pub select_retries: usize,

    /// Pause between scan passes (milliseconds)
    pub select_backoff_ms: u64,

    // -------------------------------------------------------------------------
    // Recovery / Merkle
    // -------------------------------------------------------------------------
    /// Worker threads replaying recovered transactions
    pub recovery_workers: usize,

    /// Height of cached merkle subtrees (each covers 2^height leaves)
    pub merkle_cache_height: u32,
}

/// WAL sync strategy
///
/// Intent and commit records are always synced; the strategy only governs
/// release records, which are safe to lose because a committed transaction
/// is finished forward on recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync release records after N of them (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./sectorvault_data"),
            sector_size: 1 << 22, // 4 MiB
            min_sectors_per_folder: 1 << 3,
            max_sectors_per_folder: 1 << 32,
            max_folders: 1 << 16,
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            select_retries: 5,
            select_backoff_ms: 100,
            recovery_workers: 4,
            merkle_cache_height: 7,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the values are usable together
    pub fn validate(&self) -> Result<()> {
        if self.sector_size == 0 {
            return Err(VaultError::Config("sector_size must be non-zero".to_string()));
        }
        if self.min_sectors_per_folder == 0 {
            return Err(VaultError::Config(
                "min_sectors_per_folder must be non-zero".to_string(),
            ));
        }
        if self.min_sectors_per_folder > self.max_sectors_per_folder {
            return Err(VaultError::Config(format!(
                "min_sectors_per_folder ({}) exceeds max_sectors_per_folder ({})",
                self.min_sectors_per_folder, self.max_sectors_per_folder
            )));
        }
        if self
            .sector_size
            .checked_mul(self.max_sectors_per_folder)
            .is_none()
        {
            return Err(VaultError::Config(format!(
                "max_sectors_per_folder ({}) of {}-byte sectors overflows a file offset",
                self.max_sectors_per_folder, self.sector_size
            )));
        }
        if self.max_folders == 0 {
            return Err(VaultError::Config("max_folders must be non-zero".to_string()));
        }
        if self.select_retries == 0 {
            return Err(VaultError::Config("select_retries must be non-zero".to_string()));
        }
        if self.recovery_workers == 0 {
            return Err(VaultError::Config("recovery_workers must be non-zero".to_string()));
        }
        if self.merkle_cache_height > MAX_CACHE_HEIGHT {
            return Err(VaultError::Config(format!(
                "merkle_cache_height {} is too large",
                self.merkle_cache_height
            )));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(VaultError::Config("EveryNEntries count must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Capacity range accepted by add/resize
    pub fn capacity_bounds(&self) -> (u64, u64) {
        (self.min_sectors_per_folder, self.max_sectors_per_folder)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for engine-owned files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the sector size in bytes
    pub fn sector_size(mut self, size: u64) -> Self {
        self.config.sector_size = size;
        self
    }

    /// Set the accepted folder capacity range, in sectors
    pub fn folder_capacity_bounds(mut self, min: u64, max: u64) -> Self {
        self.config.min_sectors_per_folder = min;
        self.config.max_sectors_per_folder = max;
        self
    }

    /// Set the maximum number of folders
    pub fn max_folders(mut self, count: usize) -> Self {
        self.config.max_folders = count;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set how many selection passes run and the pause between them
    pub fn select_retry(mut self, retries: usize, backoff_ms: u64) -> Self {
        self.config.select_retries = retries;
        self.config.select_backoff_ms = backoff_ms;
        self
    }

    /// Set the number of recovery worker threads
    pub fn recovery_workers(mut self, count: usize) -> Self {
        self.config.recovery_workers = count;
        self
    }

    /// Set the cached merkle subtree height
    pub fn merkle_cache_height(mut self, height: u32) -> Self {
        self.config.merkle_cache_height = height;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
