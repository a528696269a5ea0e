//! Tests for the lock manager
//!
//! These tests verify:
//! - Sector lock entries exist only while held
//! - Exclusive sector locks serialize, shared ones don't
//! - The structural lock excludes shared holders while held exclusively

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sectorvault::lock::LockManager;
use sectorvault::types::{Hash, Salt, SectorId};

fn sector_id(n: u8) -> SectorId {
    SectorId::derive(&Salt([1u8; 32]), &Hash::digest(&[n]))
}

#[test]
fn test_sector_entries_are_dropped_with_guard() {
    let locks = LockManager::new();
    {
        let _a = locks.lock_sector(&sector_id(1));
        let _b = locks.lock_sector_shared(&sector_id(2));
        assert_eq!(locks.sector_lock_count(), 2);
    }
    assert_eq!(locks.sector_lock_count(), 0);
}

#[test]
fn test_shared_sector_locks_coexist() {
    let locks = LockManager::new();
    let _a = locks.lock_sector_shared(&sector_id(1));
    let _b = locks.lock_sector_shared(&sector_id(1));
    assert_eq!(locks.sector_lock_count(), 1);
}

#[test]
fn test_exclusive_sector_lock_serializes() {
    let locks = Arc::new(LockManager::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let overlap = Arc::clone(&overlap);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _guard = locks.lock_sector(&sector_id(7));
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlap.store(true, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!overlap.load(Ordering::SeqCst));
    assert_eq!(locks.sector_lock_count(), 0);
}

#[test]
fn test_structural_exclusive_waits_for_shared() {
    let locks = Arc::new(LockManager::new());
    let acquired = Arc::new(AtomicBool::new(false));

    let shared = locks.structural_shared();
    let handle = {
        let locks = Arc::clone(&locks);
        let acquired = Arc::clone(&acquired);
        thread::spawn(move || {
            let _barrier = locks.structural_exclusive();
            acquired.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!acquired.load(Ordering::SeqCst));
    drop(shared);

    handle.join().unwrap();
    assert!(acquired.load(Ordering::SeqCst));
}
