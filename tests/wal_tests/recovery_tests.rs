//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery of a missing or empty WAL
//! - Open transactions are reported in order with their commit state
//! - Released transactions are dropped
//! - Corrupt entries and torn tails are counted, not fatal

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use sectorvault::config::WalSyncStrategy;
use sectorvault::wal::{Record, WalEntry, WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

/// Leave txn 1 committed, txn 2 uncommitted and txn 3 released
fn write_mixed_log(path: &PathBuf) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    let a = writer.begin("add-sector", vec![1]).unwrap();
    let b = writer.begin("delete-sector", vec![2]).unwrap();
    let c = writer.begin("expand-folder", vec![3]).unwrap();
    writer.commit(a).unwrap();
    writer.commit(c).unwrap();
    writer.release(c).unwrap();
    assert_eq!(writer.open_transactions(), vec![a, b]);
}

// =============================================================================
// Recover Tests
// =============================================================================

#[test]
fn test_recover_missing_file() {
    let (_temp, wal_path) = setup_temp_wal();

    let (pending, result) = WalRecovery::recover(&wal_path).unwrap();
    assert!(pending.is_empty());
    assert_eq!(result.entries_recovered, 0);
}

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (pending, result) = WalRecovery::recover(&wal_path).unwrap();
    assert!(pending.is_empty());
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_open_transactions() {
    let (_temp, wal_path) = setup_temp_wal();
    write_mixed_log(&wal_path);

    let (pending, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 6);
    assert_eq!(result.pending, 2);
    assert_eq!(result.last_lsn, 6);

    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].txn, 1);
    assert_eq!(pending[0].name, "add-sector");
    assert_eq!(pending[0].payload, vec![1]);
    assert!(pending[0].committed);
    assert_eq!(pending[1].txn, 2);
    assert!(!pending[1].committed);
}

#[test]
fn test_recover_fully_released_log() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut file = File::create(&wal_path).unwrap();
    for entry in [
        WalEntry::new(1, Record::Intent { txn: 1, name: "x".into(), payload: vec![] }),
        WalEntry::new(2, Record::Commit { txn: 1 }),
        WalEntry::new(3, Record::Release { txn: 1 }),
    ] {
        file.write_all(&entry.serialize().unwrap()).unwrap();
    }

    let (pending, result) = WalRecovery::recover(&wal_path).unwrap();
    assert!(pending.is_empty());
    assert_eq!(result.entries_recovered, 3);
}

// =============================================================================
// Damage Tests
// =============================================================================

#[test]
fn test_recover_skips_corrupt_commit() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut file = File::create(&wal_path).unwrap();
    file.write_all(
        &WalEntry::new(1, Record::Intent { txn: 1, name: "x".into(), payload: vec![] })
            .serialize()
            .unwrap(),
    )
    .unwrap();
    let mut commit = WalEntry::new(2, Record::Commit { txn: 1 }).serialize().unwrap();
    let last = commit.len() - 1;
    commit[last] ^= 0xff;
    file.write_all(&commit).unwrap();

    let (pending, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(pending.len(), 1);
    // The lost commit leaves the transaction in doubt
    assert!(!pending[0].committed);
}

#[test]
fn test_recover_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_mixed_log(&wal_path);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xab; 7]).unwrap();

    let (pending, result) = WalRecovery::recover(&wal_path).unwrap();
    assert!(result.was_truncated);
    assert_eq!(pending.len(), 2);
}

#[test]
fn test_verify_matches_recover() {
    let (_temp, wal_path) = setup_temp_wal();
    write_mixed_log(&wal_path);

    let (_, recovered) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(WalRecovery::verify(&wal_path).unwrap(), recovered);
}
