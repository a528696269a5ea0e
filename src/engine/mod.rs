//! Engine Module
//!
//! The sector storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Store, read and reference-count sectors across folders
//! - Add, resize and delete folders, evacuating sectors when shrinking
//! - Run every extent+metadata change as one WAL transaction
//! - Revert or finish interrupted transactions on startup

mod folders;
mod recovery;
mod sectors;
mod update;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::disrupt::{Disruptor, Stage};
use crate::error::{Result, VaultError};
use crate::folder::{FolderRegistry, FolderStatus};
use crate::lock::LockManager;
use crate::merkle::ContractRoots;
use crate::meta::{Metadata, MetadataStore, RocksStore};
use crate::types::{FolderId, Hash, Salt, SectorId};
use crate::wal::WalWriter;

pub use update::{Slot, Update};

use update::{Ctx, Resources};

/// Public view of one folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    pub id: FolderId,
    pub path: PathBuf,
    pub capacity: u64,
    pub occupied: u64,
    pub status: FolderStatus,
}

/// Sector totals across all folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostSpace {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// The main storage engine
///
/// ## Concurrency Model: lock hierarchy
///
/// - **Sector ops** (add/read/delete): structural (shared) → folder → sector
/// - **Folder ops** (add/resize/delete): structural (exclusive) → folders
/// - **Recovery**: structural (exclusive), then each transaction's folders
///   and sector, exactly as the interrupted operation held them
///
/// The WAL mutex is only held for a single append, never across I/O on
/// extent files.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Typed view over the metadata store
    meta: Metadata,

    /// Node salt for sector ids
    salt: Salt,

    /// Registered folders (per-folder locks inside)
    folders: FolderRegistry,

    /// Structural lock and sector lock table
    locks: LockManager,

    /// Write-ahead log (exclusive access needed)
    wal: Mutex<WalWriter>,

    disruptor: Disruptor,
}

impl Engine {
    // =========================================================================
    // Path Constants
    // =========================================================================
    pub const WAL_FILENAME: &'static str = "wal.log";
    pub const METADATA_DIR: &'static str = "metadata";

    /// Open or create an engine over `store`
    ///
    /// On startup:
    /// 1. Load (or create) the node salt
    /// 2. Load folders and rebuild free-slot indexes from sector records
    /// 3. Revert or finish every transaction left open in the WAL
    /// 4. Check folder occupancy against the rebuilt indexes
    /// 5. Start a fresh WAL
    pub fn open(config: Config, store: Arc<dyn MetadataStore>) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let meta = Metadata::new(store);
        let salt = meta.salt_or_create()?;

        let folders = FolderRegistry::new();
        recovery::load_folders(&meta, &folders, config.sector_size)?;

        let locks = LockManager::new();
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        {
            let _barrier = locks.structural_exclusive();
            let ctx = Ctx {
                meta: &meta,
                sector_size: config.sector_size,
            };
            recovery::replay_wal(&wal_path, &ctx, &folders, &locks, config.recovery_workers)?;
        }
        recovery::verify_occupancy(&meta, &folders)?;

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        tracing::info!(
            "Engine opened at {} with {} folders",
            config.data_dir.display(),
            folders.len()
        );

        Ok(Self {
            config,
            meta,
            salt,
            folders,
            locks,
            wal: Mutex::new(wal),
            disruptor: Disruptor::new(),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory and a
    /// RocksDB metadata store under it
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open_with_rocks_store(config)
    }

    /// Open with a `RocksStore` at `{data_dir}/metadata`
    pub fn open_with_rocks_store(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let store = RocksStore::open(&config.data_dir.join(Self::METADATA_DIR))?;
        Self::open(config, Arc::new(store))
    }

    /// Sync the WAL and every extent file, then drop the engine
    pub fn close(self) -> Result<()> {
        let _barrier = self.locks.structural_exclusive();
        self.wal.lock().sync()?;
        for folder in self.folders.all() {
            folder.sync()?;
        }
        tracing::info!("Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Fault injection points for this engine
    pub fn disruptor(&self) -> &Disruptor {
        &self.disruptor
    }

    /// Internal id of the sector whose content root is `root`
    pub fn sector_id(&self, root: &Hash) -> SectorId {
        SectorId::derive(&self.salt, root)
    }

    /// Current reference count of `root` (0 when not stored)
    pub fn sector_refs(&self, root: &Hash) -> Result<u32> {
        let _structural = self.locks.structural_shared();
        let id = self.sector_id(root);
        let _sector = self.locks.lock_sector_shared(&id);
        Ok(self.meta.sector(&id)?.map(|r| r.count).unwrap_or(0))
    }

    /// Roots of `contract`, with a cache of the configured height
    pub fn contract_roots(&self, contract: Hash) -> Result<ContractRoots> {
        ContractRoots::load(self.meta.clone(), contract, self.config.merkle_cache_height)
    }

    // =========================================================================
    // Folder Listing
    // =========================================================================

    pub fn list_folders(&self) -> Vec<FolderInfo> {
        let _structural = self.locks.structural_shared();
        self.folders
            .all()
            .into_iter()
            .map(|folder| {
                let state = folder.lock();
                FolderInfo {
                    id: folder.id(),
                    path: folder.path().to_path_buf(),
                    capacity: state.capacity(),
                    occupied: state.occupied(),
                    status: state.status,
                }
            })
            .collect()
    }

    /// Sector totals over available folders
    pub fn available_space(&self) -> HostSpace {
        self.list_folders()
            .into_iter()
            .filter(|f| f.status == FolderStatus::Available)
            .fold(HostSpace::default(), |acc, f| HostSpace {
                total: acc.total + f.capacity,
                used: acc.used + f.occupied,
                free: acc.free + (f.capacity - f.occupied),
            })
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn ctx(&self) -> Ctx<'_> {
        Ctx {
            meta: &self.meta,
            sector_size: self.config.sector_size,
        }
    }

    fn select_backoff(&self) -> Duration {
        Duration::from_millis(self.config.select_backoff_ms)
    }

    /// Run `update` through the full protocol while `res` is held
    ///
    /// intent → physical write → commit → finish → release. A disruption
    /// point returns straight away and leaves the transaction open; any other
    /// failure reverts the update and closes it.
    fn run_update(
        &self,
        update: &Update,
        res: &mut Resources<'_>,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let ctx = self.ctx();
        let name = update.name();

        update.reserve(res)?;
        let txn = match update.encode().and_then(|payload| self.wal.lock().begin(name, payload)) {
            Ok(txn) => txn,
            Err(err) => return Err(self.abort(None, update, res, err)),
        };
        tracing::debug!("Begin {} txn {}", name, txn);
        self.disruptor.check(name, Stage::Intent)?;

        if let Err(err) = update.write(&ctx, res, data) {
            return Err(self.abort(Some(txn), update, res, err));
        }
        self.disruptor.check(name, Stage::Write)?;

        if let Err(err) = self.wal.lock().commit(txn) {
            return Err(self.abort(Some(txn), update, res, err));
        }
        self.disruptor.check(name, Stage::Commit)?;

        if let Err(err) = update.finish(&ctx, res) {
            return Err(self.abort(Some(txn), update, res, err));
        }
        self.disruptor.check(name, Stage::Metadata)?;

        self.wal.lock().release(txn)?;
        tracing::debug!("Released {} txn {}", name, txn);
        Ok(())
    }

    /// Undo a failed update; the transaction stays open for recovery if the
    /// revert itself fails
    fn abort(
        &self,
        txn: Option<u64>,
        update: &Update,
        res: &mut Resources<'_>,
        err: VaultError,
    ) -> VaultError {
        tracing::warn!("{} failed, reverting: {}", update.name(), err);
        let context = format!("{} failed", update.name());

        if let Err(revert_err) = update.revert(&self.ctx(), res) {
            tracing::error!("Revert of {} failed: {}", update.name(), revert_err);
            return VaultError::compose(context, err, vec![revert_err]);
        }
        match txn.map(|txn| self.wal.lock().release(txn)) {
            Some(Err(release_err)) => VaultError::compose(context, err, vec![release_err]),
            _ => err,
        }
    }
}
