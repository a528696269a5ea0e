//! WAL Writer
//!
//! Appends transaction records and trims the log once nothing is open.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{Result, VaultError};

use super::{Record, WalEntry};

/// Writes transaction records to the WAL file
///
/// Intent and commit records are always synced before returning. Release
/// records follow the configured `WalSyncStrategy`.
pub struct WalWriter {
    file: File,
    path: PathBuf,
    /// LSN the next record will get
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Release records written since the last sync
    unsynced: usize,
    /// Transactions with an intent but no release yet
    open: BTreeSet<u64>,
}

impl WalWriter {
    /// Create a fresh WAL at `path`, discarding any previous content
    ///
    /// Run `WalRecovery::recover` first: whatever was in the file is gone
    /// once this returns.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.sync_all()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            next_lsn: 1,
            sync_strategy,
            unsynced: 0,
            open: BTreeSet::new(),
        })
    }

    /// Log the intent of an update. Returns the transaction id.
    pub fn begin(&mut self, name: &str, payload: Vec<u8>) -> Result<u64> {
        let txn = self.next_lsn;
        self.append(Record::Intent {
            txn,
            name: name.to_string(),
            payload,
        })?;
        self.sync()?;
        self.open.insert(txn);
        Ok(txn)
    }

    /// Mark the physical part of `txn` durable
    pub fn commit(&mut self, txn: u64) -> Result<()> {
        self.ensure_open(txn)?;
        self.append(Record::Commit { txn })?;
        self.sync()
    }

    /// Close `txn`; truncates the log when it was the last open transaction
    pub fn release(&mut self, txn: u64) -> Result<()> {
        self.ensure_open(txn)?;
        self.append(Record::Release { txn })?;
        self.open.remove(&txn);

        if self.open.is_empty() {
            return self.truncate();
        }

        self.unsynced += 1;
        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => self.sync()?,
            WalSyncStrategy::EveryNEntries { count } => {
                if self.unsynced >= count {
                    self.sync()?;
                }
            }
        }
        Ok(())
    }

    /// Append a raw record and return its LSN
    pub fn append(&mut self, record: Record) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, record).serialize()?;
        self.file.write_all(&frame)?;
        self.next_lsn += 1;
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every record. LSNs keep increasing.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the LSN the next record will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Transactions still awaiting release
    pub fn open_transactions(&self) -> Vec<u64> {
        self.open.iter().copied().collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self, txn: u64) -> Result<()> {
        if self.open.contains(&txn) {
            Ok(())
        } else {
            Err(VaultError::InvalidArgument(format!(
                "WAL transaction {} is not open",
                txn
            )))
        }
    }
}
