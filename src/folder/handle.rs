//! Storage folder handle
//!
//! A registered directory holding one fixed-size extent file. Slot `i` of
//! the extent lives at byte offset `i * sector_size`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::meta::FolderRecord;
use crate::types::FolderId;

use super::FreeSlots;

/// Extent file name inside every folder directory
pub const EXTENT_FILENAME: &str = "sectors.dat";

/// Availability of a folder's extent file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderStatus {
    Available,
    /// The extent file could not be opened; the folder is skipped for new
    /// sectors and reads from it fail
    Unavailable,
}

/// State guarded by the per-folder lock
#[derive(Debug)]
pub struct FolderState {
    pub slots: FreeSlots,
    pub status: FolderStatus,
}

impl FolderState {
    pub fn capacity(&self) -> u64 {
        self.slots.capacity()
    }

    pub fn occupied(&self) -> u64 {
        self.slots.used()
    }
}

/// Owned guard over a folder's state
pub type FolderGuard = ArcMutexGuard<RawMutex, FolderState>;

/// A registered storage folder
///
/// ## Concurrency:
/// - `state`: the folder lock. Held for the whole of any transaction that
///   changes the folder's slots or capacity.
/// - `extent`: I/O handle, locked only around a single read/write/resize so
///   reads never wait behind a transaction holding `state`.
#[derive(Debug)]
pub struct Folder {
    id: FolderId,
    path: PathBuf,
    state: Arc<Mutex<FolderState>>,
    extent: Mutex<Option<File>>,
}

impl Folder {
    /// Create the folder directory and a zero-filled extent of `capacity` slots
    pub fn create(id: FolderId, path: &Path, capacity: u64, sector_size: u64) -> Result<Self> {
        fs::create_dir_all(path)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path.join(EXTENT_FILENAME))?;
        file.set_len(byte_offset(capacity, sector_size)?)?;
        file.sync_all()?;

        Ok(Self::with_file(id, path, capacity, Some(file)))
    }

    /// Open the extent of a persisted folder; a missing or unreadable file
    /// yields an unavailable folder rather than an error
    pub fn load(record: &FolderRecord, sector_size: u64) -> Self {
        let extent_path = record.path.join(EXTENT_FILENAME);
        let file = match OpenOptions::new().read(true).write(true).open(&extent_path) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(
                    "Folder {} at {} is unavailable: {}",
                    record.id,
                    record.path.display(),
                    e
                );
                None
            }
        };

        if let Some(file) = &file {
            let expected = record.capacity.saturating_mul(sector_size);
            match file.metadata() {
                Ok(meta) if meta.len() != expected => tracing::warn!(
                    "Folder {} extent is {} bytes, expected {}",
                    record.id,
                    meta.len(),
                    expected
                ),
                _ => {}
            }
        }

        Self::with_file(record.id, &record.path, record.capacity, file)
    }

    fn with_file(id: FolderId, path: &Path, capacity: u64, file: Option<File>) -> Self {
        let status = if file.is_some() {
            FolderStatus::Available
        } else {
            FolderStatus::Unavailable
        };
        Self {
            id,
            path: path.to_path_buf(),
            state: Arc::new(Mutex::new(FolderState {
                slots: FreeSlots::new(capacity),
                status,
            })),
            extent: Mutex::new(file),
        }
    }

    pub fn id(&self) -> FolderId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Folder Lock
    // =========================================================================

    /// Block until the folder lock is held
    pub fn lock(&self) -> FolderGuard {
        self.state.lock_arc()
    }

    /// Take the folder lock only if nobody else holds it
    pub fn try_lock(&self) -> Option<FolderGuard> {
        self.state.try_lock_arc()
    }

    /// Persistable snapshot; caller holds the folder lock
    pub fn record(&self, state: &FolderState) -> FolderRecord {
        FolderRecord {
            id: self.id,
            path: self.path.clone(),
            capacity: state.capacity(),
            occupied: state.occupied(),
        }
    }

    // =========================================================================
    // Extent I/O
    // =========================================================================

    /// Read one slot
    pub fn read_slot(&self, index: u64, sector_size: u64) -> Result<Vec<u8>> {
        let mut extent = self.extent.lock();
        let file = extent
            .as_mut()
            .ok_or(VaultError::FolderUnavailable(self.id))?;

        let mut buf = vec![0u8; sector_size as usize];
        file.seek(SeekFrom::Start(byte_offset(index, sector_size)?))?;
        file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                VaultError::Corrupt(format!(
                    "folder {} extent too short for slot {}",
                    self.id, index
                ))
            } else {
                e.into()
            }
        })?;
        Ok(buf)
    }

    /// Write one slot and make it durable
    pub fn write_slot(&self, index: u64, data: &[u8]) -> Result<()> {
        let mut extent = self.extent.lock();
        let file = extent
            .as_mut()
            .ok_or(VaultError::FolderUnavailable(self.id))?;

        file.seek(SeekFrom::Start(byte_offset(index, data.len() as u64)?))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    /// Set the extent to exactly `capacity` slots and make it durable
    pub fn set_extent_len(&self, capacity: u64, sector_size: u64) -> Result<()> {
        let extent = self.extent.lock();
        let file = extent
            .as_ref()
            .ok_or(VaultError::FolderUnavailable(self.id))?;

        file.set_len(byte_offset(capacity, sector_size)?)?;
        file.sync_all()?;
        Ok(())
    }

    /// Flush the extent to disk
    pub fn sync(&self) -> Result<()> {
        if let Some(file) = self.extent.lock().as_ref() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Close the extent and remove it from disk
    pub fn remove_extent(&self) -> Result<()> {
        self.extent.lock().take();
        match fs::remove_file(self.path.join(EXTENT_FILENAME)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Byte offset of slot `index`; with `index == capacity`, the extent length
fn byte_offset(index: u64, sector_size: u64) -> Result<u64> {
    index.checked_mul(sector_size).ok_or_else(|| {
        VaultError::InvalidArgument(format!(
            "slot {} of {}-byte sectors is past the largest file offset",
            index, sector_size
        ))
    })
}

/// A folder together with its held lock
pub struct LockedFolder {
    pub folder: Arc<Folder>,
    pub state: FolderGuard,
}

impl LockedFolder {
    pub fn id(&self) -> FolderId {
        self.folder.id()
    }

    pub fn record(&self) -> FolderRecord {
        self.folder.record(&self.state)
    }
}
