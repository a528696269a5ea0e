//! Tests for folder handles and the registry
//!
//! These tests verify:
//! - Extent creation, slot I/O and resizing
//! - Unavailable folders
//! - Selection: rotation, contention (Busy) and exhaustion (CapacityExceeded)
//! - Shrink validation

use std::path::PathBuf;
use std::sync::Arc;

use sectorvault::folder::{Folder, FolderRegistry, FolderStatus, EXTENT_FILENAME};
use sectorvault::meta::FolderRecord;
use sectorvault::VaultError;
use tempfile::TempDir;

const SECTOR: u64 = 64;

// =============================================================================
// Helper Functions
// =============================================================================

fn create(temp: &TempDir, id: u32, capacity: u64) -> Arc<Folder> {
    let path = temp.path().join(format!("folder{}", id));
    Arc::new(Folder::create(id, &path, capacity, SECTOR).unwrap())
}

fn fill(folder: &Folder, count: u64) {
    let mut state = folder.lock();
    for i in 0..count {
        state.slots.mark_used(i);
    }
}

// =============================================================================
// Folder Tests
// =============================================================================

#[test]
fn test_create_sizes_extent() {
    let temp = TempDir::new().unwrap();
    let folder = create(&temp, 1, 8);

    let len = std::fs::metadata(folder.path().join(EXTENT_FILENAME)).unwrap().len();
    assert_eq!(len, 8 * SECTOR);
    assert_eq!(folder.lock().capacity(), 8);
}

#[test]
fn test_slot_io() {
    let temp = TempDir::new().unwrap();
    let folder = create(&temp, 1, 8);

    folder.write_slot(5, &[7u8; SECTOR as usize]).unwrap();
    assert_eq!(folder.read_slot(5, SECTOR).unwrap(), vec![7u8; SECTOR as usize]);
    assert_eq!(folder.read_slot(4, SECTOR).unwrap(), vec![0u8; SECTOR as usize]);
}

#[test]
fn test_set_extent_len() {
    let temp = TempDir::new().unwrap();
    let folder = create(&temp, 1, 8);

    folder.set_extent_len(16, SECTOR).unwrap();
    let len = std::fs::metadata(folder.path().join(EXTENT_FILENAME)).unwrap().len();
    assert_eq!(len, 16 * SECTOR);
}

#[test]
fn test_missing_extent_loads_unavailable() {
    let record = FolderRecord {
        id: 9,
        path: PathBuf::from("/nonexistent/sectorvault/folder"),
        capacity: 8,
        occupied: 0,
    };
    let folder = Folder::load(&record, SECTOR);

    assert_eq!(folder.lock().status, FolderStatus::Unavailable);
    assert!(matches!(
        folder.read_slot(0, SECTOR),
        Err(VaultError::FolderUnavailable(9))
    ));
}

#[test]
fn test_record_snapshot() {
    let temp = TempDir::new().unwrap();
    let folder = create(&temp, 4, 8);
    fill(&folder, 3);

    let record = folder.record(&folder.lock());
    assert_eq!(record.id, 4);
    assert_eq!(record.capacity, 8);
    assert_eq!(record.occupied, 3);
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_next_id() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    assert_eq!(registry.next_id().unwrap(), 1);

    registry.insert(create(&temp, 1, 8));
    registry.insert(create(&temp, 5, 8));
    assert_eq!(registry.next_id().unwrap(), 6);
}

#[test]
fn test_lookup_by_path() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    let folder = create(&temp, 1, 8);
    registry.insert(Arc::clone(&folder));

    assert_eq!(registry.by_path(folder.path()).unwrap().id(), 1);
    assert!(registry.by_path(&temp.path().join("other")).is_none());

    registry.remove(1);
    assert!(registry.is_empty());
}

#[test]
fn test_select_spreads_across_folders() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    registry.insert(create(&temp, 1, 8));
    registry.insert(create(&temp, 2, 8));

    let a = registry.select().unwrap();
    let b = registry.select().unwrap();
    // The first selection still holds its folder, so the second must skip it
    assert_ne!(a.folder.id(), b.folder.id());
}

#[test]
fn test_select_skips_full_and_unavailable() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    let full = create(&temp, 1, 8);
    fill(&full, 8);
    registry.insert(full);
    registry.insert(Arc::new(Folder::load(
        &FolderRecord {
            id: 2,
            path: temp.path().join("missing"),
            capacity: 8,
            occupied: 0,
        },
        SECTOR,
    )));
    registry.insert(create(&temp, 3, 8));

    for _ in 0..4 {
        let selection = registry.select().unwrap();
        assert_eq!(selection.folder.id(), 3);
    }
}

#[test]
fn test_select_all_full() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    let folder = create(&temp, 1, 8);
    fill(&folder, 8);
    registry.insert(folder);

    assert!(matches!(
        registry.select(),
        Err(VaultError::CapacityExceeded(_))
    ));
}

#[test]
fn test_select_no_folders() {
    let registry = FolderRegistry::new();
    assert!(matches!(
        registry.select(),
        Err(VaultError::CapacityExceeded(_))
    ));
}

#[test]
fn test_select_contended_is_busy() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    let folder = create(&temp, 1, 8);
    registry.insert(Arc::clone(&folder));

    let _held = folder.lock();
    assert!(matches!(
        registry.select(),
        Err(VaultError::Busy(_))
    ));
}

#[test]
fn test_find_slot_excluding() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    registry.insert(create(&temp, 1, 8));
    registry.insert(create(&temp, 2, 8));

    let selection = registry.find_slot_excluding(1).unwrap();
    assert_eq!(selection.folder.id(), 2);
    drop(selection);

    registry.remove(2);
    assert!(registry.find_slot_excluding(1).is_none());
}

#[test]
fn test_validate_shrink() {
    let temp = TempDir::new().unwrap();
    let registry = FolderRegistry::new();
    let a = create(&temp, 1, 16);
    let b = create(&temp, 2, 8);
    fill(&a, 12);
    fill(&b, 6);
    registry.insert(Arc::clone(&a));
    registry.insert(b);

    // 12 sectors need a home: 8 kept slots + 2 free elsewhere = 10
    match registry.validate_shrink(&a, 8) {
        Err(VaultError::InsufficientFreeSpace { needed, available }) => {
            assert_eq!(needed, 12);
            assert_eq!(available, 10);
        }
        other => panic!("expected InsufficientFreeSpace, got {:?}", other),
    }
    assert!(registry.validate_shrink(&a, 10).is_ok());
}
