//! Startup recovery
//!
//! ## Flow
//! ```text
//! folder records ──► Folder::load (unavailable if the extent is missing)
//! sector records ──► rebuild free-slot indexes (Corrupt on any overlap)
//! WAL            ──► open transactions, newest first
//!                      dispatcher: lock folders + sector like the original op
//!                      workers:    committed → finish, uncommitted → revert
//! folder records ◄─► check occupancy against the rebuilt indexes
//! ```
//! The dispatcher takes locks in reverse chronological order, so two
//! transactions on the same resource are processed newest first while
//! unrelated ones run in parallel.

use std::path::Path;
use std::sync::Arc;

use crossbeam::channel;
use parking_lot::Mutex;

use crate::error::{Result, VaultError};
use crate::folder::{Folder, FolderRegistry};
use crate::lock::LockManager;
use crate::meta::Metadata;
use crate::wal::{PendingTransaction, WalRecovery};

use super::{Ctx, Resources, Update};

/// One recovered transaction with its locks already held
struct Job<'a> {
    txn: u64,
    committed: bool,
    update: Update,
    resources: Resources<'a>,
}

/// Register persisted folders and mark every recorded sector's slot
pub(crate) fn load_folders(
    meta: &Metadata,
    folders: &FolderRegistry,
    sector_size: u64,
) -> Result<()> {
    for record in meta.folders()? {
        folders.insert(Arc::new(Folder::load(&record, sector_size)));
    }

    for (id, record) in meta.sectors()? {
        let folder = folders.get(record.folder).ok_or_else(|| {
            VaultError::Corrupt(format!(
                "sector {} points at unknown folder {}",
                id, record.folder
            ))
        })?;
        let mut state = folder.lock();
        if record.index >= state.capacity() {
            return Err(VaultError::Corrupt(format!(
                "sector {} at slot {} is outside folder {} (capacity {})",
                id,
                record.index,
                record.folder,
                state.capacity()
            )));
        }
        if !state.slots.mark_used(record.index) {
            return Err(VaultError::Corrupt(format!(
                "slot {} of folder {} is claimed by more than one sector",
                record.index, record.folder
            )));
        }
    }

    tracing::debug!("Loaded {} folders", folders.len());
    Ok(())
}

/// Revert or finish every transaction the WAL at `path` left open
pub(crate) fn replay_wal(
    path: &Path,
    ctx: &Ctx<'_>,
    folders: &FolderRegistry,
    locks: &LockManager,
    workers: usize,
) -> Result<()> {
    let (pending, stats) = WalRecovery::recover(path)?;
    if stats.entries_recovered > 0 || stats.entries_corrupted > 0 {
        tracing::info!(
            "WAL recovery: {} entries recovered, {} corrupted, {} transactions open, last_lsn={}",
            stats.entries_recovered,
            stats.entries_corrupted,
            stats.pending,
            stats.last_lsn
        );
    }
    if pending.is_empty() {
        return Ok(());
    }

    let updates: Vec<(PendingTransaction, Update)> = pending
        .into_iter()
        .filter_map(|p| match Update::decode(&p.name, &p.payload) {
            Ok(update) => Some((p, update)),
            Err(e) => {
                tracing::warn!("Skipping WAL transaction {}: {}", p.txn, e);
                None
            }
        })
        .collect();

    let failures = Mutex::new(Vec::new());
    crossbeam::scope(|scope| {
        let (tx, rx) = channel::bounded::<Job<'_>>(workers);

        for _ in 0..workers {
            let rx = rx.clone();
            let failures = &failures;
            scope.spawn(move |_| {
                for job in rx.iter() {
                    if let Err(e) = apply(ctx, job) {
                        failures.lock().push(e);
                    }
                }
            });
        }
        drop(rx);

        for (pending, update) in updates.into_iter().rev() {
            let resources = match update.lock(folders, locks) {
                Ok(resources) => resources,
                Err(e) => {
                    tracing::warn!("Skipping WAL transaction {}: {}", pending.txn, e);
                    continue;
                }
            };
            let job = Job {
                txn: pending.txn,
                committed: pending.committed,
                update,
                resources,
            };
            if tx.send(job).is_err() {
                break;
            }
        }
    })
    .map_err(|_| VaultError::Corrupt("recovery worker panicked".to_string()))?;

    let mut failures = failures.into_inner();
    if failures.is_empty() {
        return Ok(());
    }
    let primary = failures.remove(0);
    Err(VaultError::compose("WAL recovery failed", primary, failures))
}

fn apply(ctx: &Ctx<'_>, job: Job<'_>) -> Result<()> {
    let Job {
        txn,
        committed,
        update,
        mut resources,
    } = job;

    let result = if committed {
        update.finish(ctx, &mut resources)
    } else {
        update.revert(ctx, &mut resources)
    };

    match &result {
        Ok(()) if committed => tracing::info!("Finished {} txn {}", update.name(), txn),
        Ok(()) => tracing::info!("Reverted {} txn {}", update.name(), txn),
        Err(e) => tracing::error!("Recovering {} txn {} failed: {}", update.name(), txn, e),
    }
    result
}

/// Every folder record's occupancy must match its rebuilt slot index
pub(crate) fn verify_occupancy(meta: &Metadata, folders: &FolderRegistry) -> Result<()> {
    for record in meta.folders()? {
        let folder = folders.get(record.id).ok_or_else(|| {
            VaultError::Corrupt(format!("folder {} vanished during recovery", record.id))
        })?;
        let state = folder.lock();
        if record.occupied != state.occupied() || record.capacity != state.capacity() {
            return Err(VaultError::Corrupt(format!(
                "folder {} records {}/{} sectors but holds {}/{}",
                record.id,
                record.occupied,
                record.capacity,
                state.occupied(),
                state.capacity()
            )));
        }
    }
    Ok(())
}
