//! Sector operations
//!
//! Every path here takes the structural lock shared, then (when it needs
//! one) a folder lock, then the sector lock. An add that has to wait for a
//! folder drops all three before sleeping. Adds and deletes peek at the
//! sector record before locking and re-check it once the sector lock is
//! held, since the record can change in between.

use std::thread;

use bytes::Bytes;

use crate::error::{Result, VaultError};
use crate::folder::LockedFolder;
use crate::types::{Hash, SectorId};

use super::{Engine, Resources, Update};

/// Outcome of one add attempt under the structural lock
enum AddPass {
    Done,
    /// Selection found no folder; `add_sector` may back off and retry
    NoFolder(VaultError),
}

impl Engine {
    /// Store `data` under its content root
    ///
    /// Content already stored only gains a reference; nothing is written.
    /// When no folder can take the sector, the attempt is repeated up to
    /// `select_retries` times. The structural lock is released while
    /// backing off between attempts.
    pub fn add_sector(&self, root: &Hash, data: &[u8]) -> Result<()> {
        if data.len() as u64 != self.config.sector_size {
            return Err(VaultError::InvalidArgument(format!(
                "sector data is {} bytes, expected {}",
                data.len(),
                self.config.sector_size
            )));
        }

        let id = self.sector_id(root);
        let mut attempt = 1;
        loop {
            match self.add_sector_pass(&id, data)? {
                AddPass::Done => return Ok(()),
                AddPass::NoFolder(err) if attempt >= self.config.select_retries => {
                    return Err(err)
                }
                AddPass::NoFolder(err) => {
                    tracing::debug!(
                        "Add of sector {} found no folder (attempt {}): {}",
                        id,
                        attempt,
                        err
                    );
                    attempt += 1;
                    thread::sleep(self.select_backoff());
                }
            }
        }
    }

    /// Read the content stored under `root`
    pub fn read_sector(&self, root: &Hash) -> Result<Bytes> {
        let _structural = self.locks.structural_shared();
        let id = self.sector_id(root);
        let _sector = self.locks.lock_sector_shared(&id);

        let record = self
            .meta
            .sector(&id)?
            .ok_or_else(|| VaultError::NotFound(format!("sector {}", root)))?;
        let folder = self.folders.get(record.folder).ok_or_else(|| {
            VaultError::Corrupt(format!(
                "sector {} points at unknown folder {}",
                id, record.folder
            ))
        })?;

        let data = folder.read_slot(record.index, self.config.sector_size)?;
        Ok(Bytes::from(data))
    }

    /// Drop one reference to `root`; the slot is freed with the last one
    pub fn delete_sector(&self, root: &Hash) -> Result<()> {
        let _structural = self.locks.structural_shared();
        self.remove_reference(&self.sector_id(root))
            .map_err(|e| match e {
                VaultError::NotFound(_) => VaultError::NotFound(format!("sector {}", root)),
                e => e,
            })
    }

    /// Add one reference to each already stored root
    ///
    /// Every root is attempted; failures are reported together.
    pub fn add_sector_batch(&self, roots: &[Hash]) -> Result<()> {
        let _structural = self.locks.structural_shared();
        let errors = roots
            .iter()
            .filter_map(|root| self.increment(&self.sector_id(root)).err())
            .collect();
        compose_batch("add_sector_batch", errors)
    }

    /// Drop one reference from each root
    pub fn delete_sector_batch(&self, roots: &[Hash]) -> Result<()> {
        let _structural = self.locks.structural_shared();
        let errors = roots
            .iter()
            .filter_map(|root| self.remove_reference(&self.sector_id(root)).err())
            .collect();
        compose_batch("delete_sector_batch", errors)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn add_sector_pass(&self, id: &SectorId, data: &[u8]) -> Result<AddPass> {
        let _structural = self.locks.structural_shared();

        loop {
            if self.meta.sector(id)?.is_some() {
                match self.increment(id) {
                    Err(VaultError::NotFound(_)) => continue,
                    result => return result.map(|()| AddPass::Done),
                }
            }

            let selection = match self.folders.select() {
                Ok(selection) => selection,
                Err(err) => return Ok(AddPass::NoFolder(err)),
            };
            let sector = self.locks.lock_sector(id);
            if self.meta.sector(id)?.is_some() {
                // Someone stored the same content while we were selecting
                continue;
            }

            let update = Update::AddSector {
                id: *id,
                folder: selection.folder.id(),
                index: selection.index,
            };
            let mut res = Resources {
                folders: vec![selection.folder],
                sector: Some(sector),
            };
            self.run_update(&update, &mut res, Some(data))?;
            tracing::debug!("Added sector {} ({:?})", id, update);
            return Ok(AddPass::Done);
        }
    }

    // The callers below hold the structural lock

    fn increment(&self, id: &SectorId) -> Result<()> {
        let _sector = self.locks.lock_sector(id);
        let mut record = self
            .meta
            .sector(id)?
            .ok_or_else(|| VaultError::NotFound(format!("sector {}", id)))?;

        record.count = record.count.checked_add(1).ok_or_else(|| {
            VaultError::CapacityExceeded(format!("sector {} reference count", id))
        })?;
        self.meta.put_sector(id, &record)?;
        tracing::debug!("Sector {} now has {} references", id, record.count);
        Ok(())
    }

    fn remove_reference(&self, id: &SectorId) -> Result<()> {
        loop {
            let peek = self
                .meta
                .sector(id)?
                .ok_or_else(|| VaultError::NotFound(format!("sector {}", id)))?;
            let folder = self.folders.get(peek.folder).ok_or_else(|| {
                VaultError::Corrupt(format!("sector {} points at unknown folder {}", id, peek.folder))
            })?;
            let state = folder.lock();
            let sector = self.locks.lock_sector(id);

            let mut record = self
                .meta
                .sector(id)?
                .ok_or_else(|| VaultError::NotFound(format!("sector {}", id)))?;
            if record.folder != peek.folder {
                continue;
            }

            if record.count > 1 {
                record.count -= 1;
                self.meta.put_sector(id, &record)?;
                tracing::debug!("Sector {} now has {} references", id, record.count);
                return Ok(());
            }

            let update = Update::DeleteSector {
                id: *id,
                folder: record.folder,
                index: record.index,
            };
            let mut res = Resources {
                folders: vec![LockedFolder { folder, state }],
                sector: Some(sector),
            };
            self.run_update(&update, &mut res, None)?;
            tracing::debug!(
                "Deleted sector {} from folder {} slot {}",
                id,
                record.folder,
                record.index
            );
            return Ok(());
        }
    }
}

fn compose_batch(context: &str, errors: Vec<VaultError>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(VaultError::Composed {
        context: context.to_string(),
        errors: errors.iter().map(|e| e.to_string()).collect(),
    })
}
