//! WAL Recovery
//!
//! Reads a WAL left behind by a previous run and reports which transactions
//! never reached their release record.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

use super::{Frame, Record, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// A transaction that was open when the log was last written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Transaction id (LSN of its intent)
    pub txn: u64,

    /// Update kind recorded with the intent
    pub name: String,

    /// Encoded update
    pub payload: Vec<u8>,

    /// Whether a commit record followed the intent
    pub committed: bool,
}

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether a torn tail (partial write) was found at the end
    pub was_truncated: bool,

    /// Transactions without a release record
    pub pending: u64,
}

impl WalRecovery {
    /// Recover open transactions from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Skip corrupted entries (logged, counted)
    /// 3. Stop at a torn tail
    /// 4. Return the unreleased transactions in chronological order
    ///
    /// A missing file recovers to nothing.
    pub fn recover(path: &Path) -> Result<(Vec<PendingTransaction>, RecoveryResult)> {
        let mut result = RecoveryResult::default();
        if !path.exists() {
            return Ok((Vec::new(), result));
        }

        let mut open: BTreeMap<u64, PendingTransaction> = BTreeMap::new();
        let mut reader = WalReader::open(path)?;

        while let Some(frame) = reader.next_frame()? {
            match frame {
                Frame::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = result.last_lsn.max(entry.lsn);
                    Self::apply(&mut open, entry.record);
                }
                Frame::Corrupt { offset, reason } => {
                    tracing::warn!("Skipping corrupt WAL entry at offset {}: {}", offset, reason);
                    result.entries_corrupted += 1;
                }
                Frame::TornTail { offset } => {
                    tracing::warn!("WAL has a torn tail at offset {}", offset);
                    result.was_truncated = true;
                }
            }
        }

        result.pending = open.len() as u64;
        Ok((open.into_values().collect(), result))
    }

    /// Verify integrity of a WAL file without interpreting transactions
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::recover(path).map(|(_, result)| result)
    }

    fn apply(open: &mut BTreeMap<u64, PendingTransaction>, record: Record) {
        match record {
            Record::Intent { txn, name, payload } => {
                open.insert(
                    txn,
                    PendingTransaction {
                        txn,
                        name,
                        payload,
                        committed: false,
                    },
                );
            }
            Record::Commit { txn } => match open.get_mut(&txn) {
                Some(pending) => pending.committed = true,
                None => tracing::warn!("WAL commit for unknown transaction {}", txn),
            },
            Record::Release { txn } => {
                if open.remove(&txn).is_none() {
                    tracing::warn!("WAL release for unknown transaction {}", txn);
                }
            }
        }
    }
}
