//! RocksDB-backed metadata store
//!
//! One `DB` per data directory. Writes go through synced `WriteOptions`, so a
//! put or delete is durable once it returns, which the WAL protocol relies on
//! before logging a release.

use std::fmt;
use std::path::{Path, PathBuf};

use rocksdb::{BlockBasedOptions, Cache, Direction, IteratorMode, Options, WriteOptions, DB};

use crate::error::{Result, VaultError};

use super::MetadataStore;

/// File descriptors RocksDB may keep open for its SST files
const DEFAULT_MAX_OPEN_FILES: i32 = 256;

/// Block cache for hot metadata (sector records are read on every add)
const DEFAULT_BLOCK_CACHE_SIZE: usize = 32 * 1024 * 1024;

/// `MetadataStore` over a single RocksDB instance
///
/// RocksDB locks its directory, so only one `RocksStore` can be open per
/// path in a process. Share it through an `Arc`.
pub struct RocksStore {
    db: DB,
    path: PathBuf,
}

impl fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RocksStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.set_max_open_files(DEFAULT_MAX_OPEN_FILES);

        let cache = Cache::new_lru_cache(DEFAULT_BLOCK_CACHE_SIZE);
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        options.set_block_based_table_factory(&block_opts);

        let db = DB::open(&options, path)?;
        tracing::debug!("Opened metadata store at {}", path.display());

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_options() -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        opts
    }
}

impl MetadataStore for RocksStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_pinned(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db
            .put_opt(key.as_bytes(), value, &Self::write_options())?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.db.delete_opt(key.as_bytes(), &Self::write_options())?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
        let mut out = Vec::new();

        for item in self.db.iterator(mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let key = String::from_utf8(key.into_vec())
                .map_err(|e| VaultError::Corrupt(format!("non-UTF-8 metadata key: {}", e)))?;
            out.push((key, value.into_vec()));
        }
        Ok(out)
    }
}
