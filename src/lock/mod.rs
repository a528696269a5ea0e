//! Lock Manager
//!
//! The lock hierarchy shared by regular operations and recovery.
//!
//! ## Hierarchy (always acquired top to bottom)
//! ```text
//! 1. structural   RwLock   shared: sector ops / listing
//!                          exclusive: folder add, resize, delete, recovery
//! 2. folder       Mutex    one per folder (lives in `Folder`)
//! 3. sector       RwLock   one per sector id, created on demand
//! ```
//! Folder selection only try-locks level 2, so a caller already holding a
//! sector lock never waits on a folder.

mod sector;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use sector::{SectorGuard, SectorLocks};

use crate::types::SectorId;

/// Owns the structural barrier and the sector lock table
#[derive(Debug, Default)]
pub struct LockManager {
    /// parking_lot's RwLock parks new readers behind a waiting writer, so a
    /// resize is not starved by a steady stream of sector operations
    structural: RwLock<()>,
    sectors: SectorLocks,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared structural lock for sector operations
    pub fn structural_shared(&self) -> RwLockReadGuard<'_, ()> {
        self.structural.read()
    }

    /// Exclusive structural lock for folder add/resize/delete
    pub fn structural_exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.structural.write()
    }

    /// Exclusive lock on one sector id
    pub fn lock_sector(&self, id: &SectorId) -> SectorGuard<'_> {
        self.sectors.lock(id)
    }

    /// Shared lock on one sector id (reads)
    pub fn lock_sector_shared(&self, id: &SectorId) -> SectorGuard<'_> {
        self.sectors.lock_shared(id)
    }

    /// Number of sector ids with a live lock entry
    pub fn sector_lock_count(&self) -> usize {
        self.sectors.len()
    }
}
