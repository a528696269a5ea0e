//! Folder Registry
//!
//! In-memory index of folders, mirrored to the metadata store by the engine.
//!
//! ## Concurrency:
//! - `folders`: RwLock over the map. Written only by folder add/delete,
//!   which the engine runs under the exclusive structural lock.
//! - Per-folder state has its own lock (see `Folder`). Selection only ever
//!   *tries* those locks, so it can't deadlock against holders.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, VaultError};
use crate::types::FolderId;

use super::{Folder, FolderStatus, LockedFolder};

/// A locked folder plus the free slot chosen in it
pub struct Selection {
    pub folder: LockedFolder,
    pub index: u64,
}

/// Index of registered folders
#[derive(Debug, Default)]
pub struct FolderRegistry {
    folders: RwLock<BTreeMap<FolderId, Arc<Folder>>>,
    /// Rotates the scan start so concurrent adds spread across folders
    rotor: AtomicUsize,
}

impl FolderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FolderId) -> Option<Arc<Folder>> {
        self.folders.read().get(&id).cloned()
    }

    pub fn by_path(&self, path: &Path) -> Option<Arc<Folder>> {
        self.folders
            .read()
            .values()
            .find(|f| f.path() == path)
            .cloned()
    }

    /// All folders in id order
    pub fn all(&self) -> Vec<Arc<Folder>> {
        self.folders.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.folders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.read().is_empty()
    }

    pub fn insert(&self, folder: Arc<Folder>) {
        self.folders.write().insert(folder.id(), folder);
    }

    pub fn remove(&self, id: FolderId) -> Option<Arc<Folder>> {
        self.folders.write().remove(&id)
    }

    /// An id not used by any registered folder
    pub fn next_id(&self) -> Result<FolderId> {
        let folders = self.folders.read();
        match folders.keys().next_back() {
            None => Ok(1),
            Some(&max) if max < FolderId::MAX => Ok(max + 1),
            Some(_) => (1..FolderId::MAX)
                .find(|id| !folders.contains_key(id))
                .ok_or_else(|| VaultError::CapacityExceeded("no folder ids left".to_string())),
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// One optimistic pass: try-lock each available folder and return the
    /// first with a free slot, skipping any folder someone else holds
    ///
    /// Never waits on a folder lock. Fails with `Busy` when a locked folder
    /// was skipped, and with `CapacityExceeded` when every folder was full
    /// or unavailable. Retrying is left to the caller.
    pub fn select(&self) -> Result<Selection> {
        let folders: Vec<Arc<Folder>> = self.all();
        if folders.is_empty() {
            return Err(VaultError::CapacityExceeded("no folders registered".to_string()));
        }

        let start = self.rotor.fetch_add(1, Ordering::Relaxed) % folders.len();
        let mut contended = false;

        for folder in folders.iter().cycle().skip(start).take(folders.len()) {
            let Some(mut state) = folder.try_lock() else {
                contended = true;
                continue;
            };
            if state.status == FolderStatus::Unavailable {
                continue;
            }
            if let Some(index) = state.slots.next_free() {
                return Ok(Selection {
                    folder: LockedFolder {
                        folder: Arc::clone(folder),
                        state,
                    },
                    index,
                });
            }
        }

        if contended {
            Err(VaultError::Busy("every folder with room is locked".to_string()))
        } else {
            Err(VaultError::CapacityExceeded(
                "all folders are full or unavailable".to_string(),
            ))
        }
    }

    /// Lock (blocking) a folder other than `exclude` with a free slot
    ///
    /// Only for use under the exclusive structural lock, where nothing else
    /// holds folder locks for long.
    pub fn find_slot_excluding(&self, exclude: FolderId) -> Option<Selection> {
        for folder in self.all() {
            if folder.id() == exclude {
                continue;
            }
            let mut state = folder.lock();
            if state.status == FolderStatus::Unavailable {
                continue;
            }
            if let Some(index) = state.slots.next_free() {
                return Some(Selection {
                    folder: LockedFolder { folder, state },
                    index,
                });
            }
        }
        None
    }

    // =========================================================================
    // Space Accounting
    // =========================================================================

    /// Free slots across available folders other than `exclude`
    pub fn free_excluding(&self, exclude: FolderId) -> u64 {
        self.all()
            .iter()
            .filter(|f| f.id() != exclude)
            .map(|f| {
                let state = f.lock();
                match state.status {
                    FolderStatus::Available => state.slots.free(),
                    FolderStatus::Unavailable => 0,
                }
            })
            .sum()
    }

    /// Check that shrinking `folder` to `target` slots leaves room for every
    /// sector it currently stores
    pub fn validate_shrink(&self, folder: &Folder, target: u64) -> Result<()> {
        let occupied = folder.lock().occupied();
        let available = self.free_excluding(folder.id()) + target;
        if available < occupied {
            return Err(VaultError::InsufficientFreeSpace {
                needed: occupied,
                available,
            });
        }
        Ok(())
    }
}
