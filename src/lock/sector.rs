//! Per-sector locks
//!
//! Lock entries are created when first requested and dropped with the last
//! guard, so the table only holds ids that are in use right now.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};

use crate::types::SectorId;

type Entry = Arc<RwLock<()>>;

/// Table of sector locks keyed by sector id
#[derive(Default)]
pub struct SectorLocks {
    table: Mutex<HashMap<SectorId, Entry>>,
}

impl fmt::Debug for SectorLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectorLocks")
            .field("held", &self.len())
            .finish()
    }
}

// Guards are only held for their Drop
#[allow(dead_code)]
enum Held {
    Shared(ArcRwLockReadGuard<RawRwLock, ()>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, ()>),
}

/// Guard for one sector lock; removes the table entry when it was the last user
pub struct SectorGuard<'a> {
    locks: &'a SectorLocks,
    id: SectorId,
    held: Option<Held>,
}

impl SectorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, id: &SectorId) -> SectorGuard<'_> {
        let entry = self.entry(id);
        SectorGuard {
            locks: self,
            id: *id,
            held: Some(Held::Exclusive(entry.write_arc())),
        }
    }

    pub fn lock_shared(&self, id: &SectorId) -> SectorGuard<'_> {
        let entry = self.entry(id);
        SectorGuard {
            locks: self,
            id: *id,
            held: Some(Held::Shared(entry.read_arc())),
        }
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    fn entry(&self, id: &SectorId) -> Entry {
        Arc::clone(self.table.lock().entry(*id).or_default())
    }

    fn release(&self, id: &SectorId) {
        let mut table = self.table.lock();
        // Only the table's own reference left: nobody holds or waits on it.
        // Clones are taken under this same mutex, so the count can't race.
        if table.get(id).map(|e| Arc::strong_count(e) == 1).unwrap_or(false) {
            table.remove(id);
        }
    }
}

impl SectorGuard<'_> {
    pub fn id(&self) -> &SectorId {
        &self.id
    }
}

impl Drop for SectorGuard<'_> {
    fn drop(&mut self) {
        // Release the lock (and its Arc) before checking the table
        self.held.take();
        self.locks.release(&self.id);
    }
}
