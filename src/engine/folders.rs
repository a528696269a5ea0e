//! Folder operations
//!
//! Add, resize and delete all run under the exclusive structural lock, so
//! no sector operation or other folder operation overlaps them.
//!
//! ## Shrink / Delete
//! ```text
//! validate ──► evacuate (one move-sector txn per sector past the new end)
//!          ──► shrink-folder txn (or drop the folder entirely)
//! ```
//! A sector past the new end moves to a free slot below it in the same
//! folder when there is one, otherwise to another folder.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, VaultError};
use crate::folder::{Folder, FolderStatus, LockedFolder};
use crate::meta::SectorRecord;
use crate::types::{FolderId, SectorId};

use super::{Engine, Resources, Slot, Update};

impl Engine {
    /// Register a folder at `path` with room for `capacity` sectors
    pub fn add_folder(&self, path: &Path, capacity: u64) -> Result<FolderId> {
        let path = normalize_path(path)?;
        self.check_capacity(capacity)?;

        let _barrier = self.locks.structural_exclusive();
        if self.folders.by_path(&path).is_some() {
            return Err(VaultError::AlreadyExists(format!(
                "folder {}",
                path.display()
            )));
        }
        if self.folders.len() >= self.config.max_folders {
            return Err(VaultError::CapacityExceeded(format!(
                "at most {} folders",
                self.config.max_folders
            )));
        }

        let id = self.folders.next_id()?;
        let folder = Folder::create(id, &path, capacity, self.config.sector_size)?;
        let record = folder.record(&folder.lock());
        if let Err(err) = self.meta.put_folder(&record) {
            let cleanup = folder.remove_extent().err().into_iter().collect();
            return Err(VaultError::compose("add_folder failed", err, cleanup));
        }
        self.folders.insert(Arc::new(folder));

        tracing::info!(
            "Added folder {} at {} ({} sectors)",
            id,
            path.display(),
            capacity
        );
        Ok(id)
    }

    /// Change a folder's capacity, evacuating sectors past the new end
    pub fn resize_folder(&self, path: &Path, capacity: u64) -> Result<()> {
        let path = normalize_path(path)?;
        self.check_capacity(capacity)?;

        let _barrier = self.locks.structural_exclusive();
        let folder = self.folder_by_path(&path)?;
        let (current, status) = {
            let state = folder.lock();
            (state.capacity(), state.status)
        };
        if status == FolderStatus::Unavailable {
            return Err(VaultError::FolderUnavailable(folder.id()));
        }

        if capacity == current {
            return Ok(());
        }

        let update = if capacity > current {
            Update::ExpandFolder {
                folder: folder.id(),
                from: current,
                to: capacity,
            }
        } else {
            self.folders.validate_shrink(&folder, capacity)?;
            self.evacuate(&folder, capacity)?;
            Update::ShrinkFolder {
                folder: folder.id(),
                from: current,
                to: capacity,
            }
        };

        let mut res = Resources {
            folders: vec![LockedFolder {
                folder: Arc::clone(&folder),
                state: folder.lock(),
            }],
            sector: None,
        };
        self.run_update(&update, &mut res, None)?;

        tracing::info!(
            "Resized folder {} from {} to {} sectors",
            folder.id(),
            current,
            capacity
        );
        Ok(())
    }

    /// Evacuate every sector of the folder at `path`, then forget it
    pub fn delete_folder(&self, path: &Path) -> Result<()> {
        let path = normalize_path(path)?;

        let _barrier = self.locks.structural_exclusive();
        let folder = self.folder_by_path(&path)?;

        if folder.lock().occupied() > 0 {
            self.folders.validate_shrink(&folder, 0)?;
            self.evacuate(&folder, 0)?;
        }

        self.meta.delete_folder(folder.id())?;
        self.folders.remove(folder.id());
        folder.remove_extent()?;

        tracing::info!("Deleted folder {} at {}", folder.id(), path.display());
        Ok(())
    }

    // =========================================================================
    // Private Helpers (structural lock held exclusively)
    // =========================================================================

    fn check_capacity(&self, capacity: u64) -> Result<()> {
        let (min, max) = self.config.capacity_bounds();
        if capacity < min {
            return Err(VaultError::InvalidArgument(format!(
                "capacity {} is below the minimum of {} sectors",
                capacity, min
            )));
        }
        if capacity > max {
            return Err(VaultError::CapacityExceeded(format!(
                "capacity {} is above the maximum of {} sectors",
                capacity, max
            )));
        }
        Ok(())
    }

    fn folder_by_path(&self, path: &Path) -> Result<Arc<Folder>> {
        self.folders
            .by_path(path)
            .ok_or_else(|| VaultError::NotFound(format!("folder {}", path.display())))
    }

    /// Move every sector stored at slot `>= target` out of the way
    ///
    /// Each move is its own transaction. All moves are attempted; the
    /// failures are reported as one error.
    fn evacuate(&self, folder: &Arc<Folder>, target: u64) -> Result<()> {
        let mut stranded: Vec<(SectorId, SectorRecord)> = self
            .meta
            .sectors()?
            .into_iter()
            .filter(|(_, r)| r.folder == folder.id() && r.index >= target)
            .collect();
        stranded.sort_by_key(|(_, r)| r.index);

        tracing::info!(
            "Evacuating {} sectors from folder {}",
            stranded.len(),
            folder.id()
        );

        let mut errors = Vec::new();
        for (id, record) in stranded {
            match self.move_sector(folder, target, id, record) {
                Ok(()) => {}
                // A disruption stands in for a crash: stop right here
                Err(err @ VaultError::Disrupted(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!("Failed to move sector {}: {}", id, err);
                    errors.push(err.to_string());
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        Err(VaultError::Composed {
            context: format!("evacuating folder {}", folder.id()),
            errors,
        })
    }

    fn move_sector(
        &self,
        source: &Arc<Folder>,
        target: u64,
        id: SectorId,
        record: SectorRecord,
    ) -> Result<()> {
        let from = Slot {
            folder: source.id(),
            index: record.index,
        };

        let state = source.lock();
        let (to, folders) = match state.slots.first_free_below(target) {
            Some(index) => (
                Slot {
                    folder: source.id(),
                    index,
                },
                vec![LockedFolder {
                    folder: Arc::clone(source),
                    state,
                }],
            ),
            None => {
                drop(state);
                let dest = self.folders.find_slot_excluding(source.id()).ok_or(
                    VaultError::InsufficientFreeSpace {
                        needed: 1,
                        available: 0,
                    },
                )?;
                let to = Slot {
                    folder: dest.folder.id(),
                    index: dest.index,
                };
                let source = LockedFolder {
                    folder: Arc::clone(source),
                    state: source.lock(),
                };
                (to, vec![source, dest.folder])
            }
        };

        let update = Update::MoveSector {
            id,
            count: record.count,
            from,
            to,
        };
        let mut res = Resources {
            folders,
            sector: Some(self.locks.lock_sector(&id)),
        };
        self.run_update(&update, &mut res, None)?;
        tracing::debug!(
            "Moved sector {} from {}:{} to {}:{}",
            id,
            from.folder,
            from.index,
            to.folder,
            to.index
        );
        Ok(())
    }
}

/// Absolute form of a folder path; a leading `~` expands to `$HOME`
pub(crate) fn normalize_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => {
            let home = env::var_os("HOME").ok_or_else(|| {
                VaultError::InvalidArgument("cannot expand ~ without HOME".to_string())
            })?;
            PathBuf::from(home).join(rest)
        }
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(env::current_dir()?.join(expanded))
    }
}
