//! Metadata Module
//!
//! Durable key-value records describing folders, sectors, the node salt and
//! per-contract merkle roots.
//!
//! ## Responsibilities
//! - Abstract the backing store behind `MetadataStore` (atomic per key)
//! - Encode typed records with bincode
//! - Own the key layout
//!
//! ## Key Layout
//! ```text
//! salt                               → Salt (32 bytes)
//! folder/{id:08x}                    → FolderRecord
//! sector/{sector id hex}             → SectorRecord
//! roots/{contract hex}/{index:016x}  → Hash
//! ```

mod memory;
mod rocks;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::types::{FolderId, Salt, SectorId};

pub use memory::MemoryStore;
pub use rocks::RocksStore;

pub(crate) const SALT_KEY: &str = "salt";
pub(crate) const FOLDER_PREFIX: &str = "folder/";
pub(crate) const SECTOR_PREFIX: &str = "sector/";
pub(crate) const ROOTS_PREFIX: &str = "roots/";

/// Durable key-value persistence consumed by the engine
///
/// Every call must be atomic with respect to a single key. Keys are short
/// ASCII strings built from `[a-z0-9/]`.
pub trait MetadataStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Persisted folder descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: FolderId,
    pub path: PathBuf,
    /// Total slots, in sectors
    pub capacity: u64,
    /// Slots holding a live sector
    pub occupied: u64,
}

/// Persisted location and reference count of one sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub folder: FolderId,
    pub index: u64,
    pub count: u32,
}

/// Typed view over a `MetadataStore`
#[derive(Clone)]
pub struct Metadata {
    store: Arc<dyn MetadataStore>,
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata").finish_non_exhaustive()
    }
}

impl Metadata {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    // =========================================================================
    // Salt
    // =========================================================================

    /// Load the node salt, generating and persisting one on first use
    pub fn salt_or_create(&self) -> Result<Salt> {
        if let Some(bytes) = self.store.get(SALT_KEY)? {
            let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                VaultError::Corrupt(format!("salt record has {} bytes", bytes.len()))
            })?;
            return Ok(Salt(arr));
        }

        let salt = Salt::random();
        self.store.put(SALT_KEY, &salt.0)?;
        tracing::info!("Generated new sector salt");
        Ok(salt)
    }

    // =========================================================================
    // Folders
    // =========================================================================

    pub fn folders(&self) -> Result<Vec<FolderRecord>> {
        self.store
            .scan_prefix(FOLDER_PREFIX)?
            .into_iter()
            .map(|(key, value)| {
                bincode::deserialize(&value)
                    .map_err(|e| VaultError::Corrupt(format!("folder record {}: {}", key, e)))
            })
            .collect()
    }

    pub fn put_folder(&self, record: &FolderRecord) -> Result<()> {
        self.store.put(&folder_key(record.id), &bincode::serialize(record)?)
    }

    pub fn delete_folder(&self, id: FolderId) -> Result<()> {
        self.store.delete(&folder_key(id))
    }

    // =========================================================================
    // Sectors
    // =========================================================================

    pub fn sector(&self, id: &SectorId) -> Result<Option<SectorRecord>> {
        match self.store.get(&sector_key(id))? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| VaultError::Corrupt(format!("sector record {}: {}", id, e))),
            None => Ok(None),
        }
    }

    pub fn put_sector(&self, id: &SectorId, record: &SectorRecord) -> Result<()> {
        self.store.put(&sector_key(id), &bincode::serialize(record)?)
    }

    pub fn delete_sector(&self, id: &SectorId) -> Result<()> {
        self.store.delete(&sector_key(id))
    }

    /// Every stored sector record
    pub fn sectors(&self) -> Result<Vec<(SectorId, SectorRecord)>> {
        self.store
            .scan_prefix(SECTOR_PREFIX)?
            .into_iter()
            .map(|(key, value)| {
                let hex_id = &key[SECTOR_PREFIX.len()..];
                let id = SectorId::from_hex(hex_id)
                    .map_err(|_| VaultError::Corrupt(format!("bad sector key {}", key)))?;
                let record = bincode::deserialize(&value)
                    .map_err(|e| VaultError::Corrupt(format!("sector record {}: {}", key, e)))?;
                Ok((id, record))
            })
            .collect()
    }
}

pub(crate) fn folder_key(id: FolderId) -> String {
    format!("{}{:08x}", FOLDER_PREFIX, id)
}

pub(crate) fn sector_key(id: &SectorId) -> String {
    format!("{}{}", SECTOR_PREFIX, id.to_hex())
}
