//! Update kinds
//!
//! Every change that touches an extent file and metadata is one `Update`,
//! run as one WAL transaction. Each variant knows three things:
//!
//! - `write`: the physical step on the extent file(s)
//! - `finish`: the post-state (slots + metadata). Also the roll-forward for a
//!   committed transaction found on restart.
//! - `revert`: the pre-state (extent + slots + metadata). Used for
//!   uncommitted transactions found on restart and for in-process failures.
//!
//! `finish` and `revert` are idempotent: recovery may run them over state
//! that is already partly or fully in the target shape.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::folder::{FolderRegistry, LockedFolder};
use crate::lock::{LockManager, SectorGuard};
use crate::meta::{Metadata, SectorRecord};
use crate::types::{FolderId, SectorId};

/// A slot in a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub folder: FolderId,
    pub index: u64,
}

/// What an update needs besides its locks
pub(crate) struct Ctx<'a> {
    pub meta: &'a Metadata,
    pub sector_size: u64,
}

/// Locks held for the duration of one update
pub(crate) struct Resources<'a> {
    pub folders: Vec<LockedFolder>,
    pub sector: Option<SectorGuard<'a>>,
}

impl Resources<'_> {
    fn folder(&mut self, id: FolderId) -> Result<&mut LockedFolder> {
        self.folders
            .iter_mut()
            .find(|f| f.id() == id)
            .ok_or_else(|| VaultError::InvalidArgument(format!("folder {} is not locked", id)))
    }

    fn persist_folder(&mut self, ctx: &Ctx<'_>, id: FolderId) -> Result<()> {
        let record = self.folder(id)?.record();
        ctx.meta.put_folder(&record)
    }
}

/// The closed set of recoverable updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Update {
    /// Store new content in a free slot
    AddSector {
        id: SectorId,
        folder: FolderId,
        index: u64,
    },

    /// Drop the last reference to a sector and free its slot
    DeleteSector {
        id: SectorId,
        folder: FolderId,
        index: u64,
    },

    /// Relocate a sector while evacuating a shrinking or deleted folder
    MoveSector {
        id: SectorId,
        count: u32,
        from: Slot,
        to: Slot,
    },

    /// Grow a folder's capacity
    ExpandFolder { folder: FolderId, from: u64, to: u64 },

    /// Reduce a folder's capacity; slots past `to` must already be empty
    ShrinkFolder { folder: FolderId, from: u64, to: u64 },
}

impl Update {
    pub fn name(&self) -> &'static str {
        match self {
            Update::AddSector { .. } => "add-sector",
            Update::DeleteSector { .. } => "delete-sector",
            Update::MoveSector { .. } => "move-sector",
            Update::ExpandFolder { .. } => "expand-folder",
            Update::ShrinkFolder { .. } => "shrink-folder",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a WAL payload, checking it against the logged kind
    pub fn decode(name: &str, payload: &[u8]) -> Result<Self> {
        let update: Update = bincode::deserialize(payload)
            .map_err(|e| VaultError::Corrupt(format!("undecodable {} update: {}", name, e)))?;
        if update.name() != name {
            return Err(VaultError::Corrupt(format!(
                "WAL intent named {} holds a {} update",
                name,
                update.name()
            )));
        }
        Ok(update)
    }

    /// Folders touched, ascending (the order they are locked in)
    pub fn folders(&self) -> Vec<FolderId> {
        let mut ids = match self {
            Update::AddSector { folder, .. }
            | Update::DeleteSector { folder, .. }
            | Update::ExpandFolder { folder, .. }
            | Update::ShrinkFolder { folder, .. } => vec![*folder],
            Update::MoveSector { from, to, .. } => vec![from.folder, to.folder],
        };
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn sector(&self) -> Option<SectorId> {
        match self {
            Update::AddSector { id, .. }
            | Update::DeleteSector { id, .. }
            | Update::MoveSector { id, .. } => Some(*id),
            Update::ExpandFolder { .. } | Update::ShrinkFolder { .. } => None,
        }
    }

    /// Acquire the locks this update's original operation held, in
    /// hierarchy order: folders (ascending id), then the sector
    pub(crate) fn lock<'a>(
        &self,
        registry: &FolderRegistry,
        locks: &'a LockManager,
    ) -> Result<Resources<'a>> {
        let mut folders = Vec::new();
        for id in self.folders() {
            let folder = registry
                .get(id)
                .ok_or_else(|| VaultError::NotFound(format!("folder {}", id)))?;
            let state = folder.lock();
            folders.push(LockedFolder { folder, state });
        }
        let sector = self.sector().map(|id| locks.lock_sector(&id));
        Ok(Resources { folders, sector })
    }

    // =========================================================================
    // Protocol Steps
    // =========================================================================

    /// In-memory reservation made before the intent is logged
    pub(crate) fn reserve(&self, res: &mut Resources<'_>) -> Result<()> {
        let slot = match self {
            Update::AddSector { folder, index, .. } => Slot {
                folder: *folder,
                index: *index,
            },
            Update::MoveSector { to, .. } => *to,
            _ => return Ok(()),
        };
        if !res.folder(slot.folder)?.state.slots.mark_used(slot.index) {
            return Err(VaultError::Corrupt(format!(
                "slot {} of folder {} is already in use",
                slot.index, slot.folder
            )));
        }
        Ok(())
    }

    /// Physical step
    pub(crate) fn write(
        &self,
        ctx: &Ctx<'_>,
        res: &mut Resources<'_>,
        data: Option<&[u8]>,
    ) -> Result<()> {
        match self {
            Update::AddSector { folder, index, .. } => {
                let data = data.ok_or_else(|| {
                    VaultError::InvalidArgument("add-sector needs sector data".to_string())
                })?;
                res.folder(*folder)?.folder.write_slot(*index, data)
            }
            Update::DeleteSector { .. } => Ok(()),
            Update::MoveSector { from, to, .. } => {
                let bytes = res
                    .folder(from.folder)?
                    .folder
                    .read_slot(from.index, ctx.sector_size)?;
                res.folder(to.folder)?.folder.write_slot(to.index, &bytes)
            }
            Update::ExpandFolder { folder, to, .. } | Update::ShrinkFolder { folder, to, .. } => res
                .folder(*folder)?
                .folder
                .set_extent_len(*to, ctx.sector_size),
        }
    }

    /// Bring slots and metadata to the post-update state
    pub(crate) fn finish(&self, ctx: &Ctx<'_>, res: &mut Resources<'_>) -> Result<()> {
        match self {
            Update::AddSector { id, folder, index } => {
                res.folder(*folder)?.state.slots.mark_used(*index);
                match ctx.meta.sector(id)? {
                    // Already finished once; later reference bumps must survive
                    Some(r) if r.folder == *folder && r.index == *index => {}
                    Some(r) => {
                        return Err(VaultError::Corrupt(format!(
                            "sector {} recorded at folder {} slot {} while adding to folder {} slot {}",
                            id, r.folder, r.index, folder, index
                        )))
                    }
                    None => ctx.meta.put_sector(
                        id,
                        &SectorRecord {
                            folder: *folder,
                            index: *index,
                            count: 1,
                        },
                    )?,
                }
                res.persist_folder(ctx, *folder)
            }
            Update::DeleteSector { id, folder, index } => {
                if let Some(r) = ctx.meta.sector(id)? {
                    if r.folder == *folder && r.index == *index {
                        ctx.meta.delete_sector(id)?;
                    }
                }
                res.folder(*folder)?.state.slots.mark_free(*index);
                res.persist_folder(ctx, *folder)
            }
            Update::MoveSector {
                id,
                count,
                from,
                to,
            } => {
                let count = ctx.meta.sector(id)?.map(|r| r.count).unwrap_or(*count);
                ctx.meta.put_sector(
                    id,
                    &SectorRecord {
                        folder: to.folder,
                        index: to.index,
                        count,
                    },
                )?;
                res.folder(to.folder)?.state.slots.mark_used(to.index);
                res.folder(from.folder)?.state.slots.mark_free(from.index);
                res.persist_folder(ctx, from.folder)?;
                res.persist_folder(ctx, to.folder)
            }
            Update::ExpandFolder { folder, to, .. } => {
                let locked = res.folder(*folder)?;
                locked.folder.set_extent_len(*to, ctx.sector_size)?;
                resize_slots(locked, *to)?;
                res.persist_folder(ctx, *folder)
            }
            Update::ShrinkFolder { folder, to, .. } => {
                let locked = res.folder(*folder)?;
                resize_slots(locked, *to)?;
                locked.folder.set_extent_len(*to, ctx.sector_size)?;
                res.persist_folder(ctx, *folder)
            }
        }
    }

    /// Bring extent, slots and metadata back to the pre-update state
    pub(crate) fn revert(&self, ctx: &Ctx<'_>, res: &mut Resources<'_>) -> Result<()> {
        match self {
            Update::AddSector { id, folder, index } => {
                if let Some(r) = ctx.meta.sector(id)? {
                    if r.folder == *folder && r.index == *index {
                        ctx.meta.delete_sector(id)?;
                    }
                }
                res.folder(*folder)?.state.slots.mark_free(*index);
                res.persist_folder(ctx, *folder)
            }
            Update::DeleteSector { id, folder, index } => {
                if ctx.meta.sector(id)?.is_none() {
                    ctx.meta.put_sector(
                        id,
                        &SectorRecord {
                            folder: *folder,
                            index: *index,
                            count: 1,
                        },
                    )?;
                }
                res.folder(*folder)?.state.slots.mark_used(*index);
                res.persist_folder(ctx, *folder)
            }
            Update::MoveSector {
                id,
                count,
                from,
                to,
            } => {
                let count = ctx.meta.sector(id)?.map(|r| r.count).unwrap_or(*count);
                ctx.meta.put_sector(
                    id,
                    &SectorRecord {
                        folder: from.folder,
                        index: from.index,
                        count,
                    },
                )?;
                res.folder(to.folder)?.state.slots.mark_free(to.index);
                res.folder(from.folder)?.state.slots.mark_used(from.index);
                res.persist_folder(ctx, from.folder)?;
                res.persist_folder(ctx, to.folder)
            }
            Update::ExpandFolder { folder, from, .. } | Update::ShrinkFolder { folder, from, .. } => {
                let locked = res.folder(*folder)?;
                resize_slots(locked, *from)?;
                locked.folder.set_extent_len(*from, ctx.sector_size)?;
                res.persist_folder(ctx, *folder)
            }
        }
    }
}

/// Resize a folder's slot index; an occupied slot past the new end means
/// evacuation was skipped, which must never be papered over
fn resize_slots(locked: &mut LockedFolder, capacity: u64) -> Result<()> {
    let id = locked.id();
    locked.state.slots.resize(capacity).map_err(|index| {
        VaultError::Corrupt(format!(
            "folder {} still stores a sector at slot {} beyond capacity {}",
            id, index, capacity
        ))
    })
}
