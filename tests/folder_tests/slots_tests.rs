//! Tests for the free-slot index

use sectorvault::folder::FreeSlots;

#[test]
fn test_new_index_is_empty() {
    let mut slots = FreeSlots::new(10);
    assert_eq!(slots.capacity(), 10);
    assert_eq!(slots.used(), 0);
    assert_eq!(slots.free(), 10);
    assert_eq!(slots.next_free(), Some(0));
}

#[test]
fn test_mark_used_and_free() {
    let mut slots = FreeSlots::new(4);

    assert!(slots.mark_used(2));
    assert!(!slots.mark_used(2));
    assert!(!slots.mark_used(4));
    assert!(slots.is_used(2));
    assert_eq!(slots.used(), 1);

    assert!(slots.mark_free(2));
    assert!(!slots.mark_free(2));
    assert_eq!(slots.used(), 0);
}

#[test]
fn test_next_free_never_yields_used_slot() {
    let mut slots = FreeSlots::new(200);
    for _ in 0..200 {
        let index = slots.next_free().unwrap();
        assert!(!slots.is_used(index));
        assert!(slots.mark_used(index));
    }
    assert!(slots.is_full());
    assert_eq!(slots.next_free(), None);

    slots.mark_free(130);
    assert_eq!(slots.next_free(), Some(130));
}

#[test]
fn test_next_free_skips_full_words() {
    let mut slots = FreeSlots::new(130);
    for i in 0..129 {
        slots.mark_used(i);
    }
    assert_eq!(slots.next_free(), Some(129));
}

#[test]
fn test_next_free_stays_in_range() {
    let mut slots = FreeSlots::new(70);
    for i in 0..70 {
        slots.mark_used(i);
    }
    // Only bits past capacity are clear in the last word
    assert_eq!(slots.next_free(), None);
}

#[test]
fn test_first_free_below() {
    let mut slots = FreeSlots::new(8);
    for i in 0..5 {
        slots.mark_used(i);
    }
    assert_eq!(slots.first_free_below(8), Some(5));
    assert_eq!(slots.first_free_below(5), None);

    slots.mark_free(1);
    assert_eq!(slots.first_free_below(5), Some(1));
}

#[test]
fn test_used_from() {
    let mut slots = FreeSlots::new(100);
    for i in [3, 64, 70, 99] {
        slots.mark_used(i);
    }
    assert_eq!(slots.used_from(64), vec![64, 70, 99]);
    assert_eq!(slots.used_from(0), vec![3, 64, 70, 99]);
}

#[test]
fn test_resize() {
    let mut slots = FreeSlots::new(16);
    slots.mark_used(3);
    slots.mark_used(12);

    assert_eq!(slots.resize(8), Err(12));
    assert_eq!(slots.capacity(), 16);

    slots.mark_free(12);
    assert_eq!(slots.resize(8), Ok(()));
    assert_eq!(slots.capacity(), 8);
    assert_eq!(slots.free(), 7);

    assert_eq!(slots.resize(1000), Ok(()));
    assert!(slots.is_used(3));
    assert_eq!(slots.free(), 999);
}
