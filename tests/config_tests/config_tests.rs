//! Tests for configuration validation
//!
//! These tests verify:
//! - The defaults validate
//! - Zero counts and inverted bounds are rejected
//! - Folder extents whose byte length overflows u64 are rejected
//! - An engine refuses to open with an invalid configuration

use std::sync::Arc;

use sectorvault::{Config, Engine, MemoryStore, VaultError};
use tempfile::TempDir;

#[test]
fn test_default_validates() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_zero_and_inverted_values_rejected() {
    let configs = [
        Config::builder().sector_size(0).build(),
        Config::builder().folder_capacity_bounds(0, 16).build(),
        Config::builder().folder_capacity_bounds(32, 16).build(),
        Config::builder().max_folders(0).build(),
        Config::builder().recovery_workers(0).build(),
        Config::builder().select_retry(0, 1).build(),
        Config::builder().merkle_cache_height(33).build(),
    ];
    for config in configs {
        assert!(matches!(config.validate(), Err(VaultError::Config(_))));
    }
}

#[test]
fn test_extent_length_overflow_rejected() {
    let config = Config::builder()
        .sector_size(1 << 40)
        .folder_capacity_bounds(1, 1 << 30)
        .build();
    match config.validate() {
        Err(VaultError::Config(msg)) => assert!(msg.contains("overflows")),
        other => panic!("expected Config error, got {:?}", other),
    }

    // Largest capacity that still fits
    let config = Config::builder()
        .sector_size(1 << 40)
        .folder_capacity_bounds(1, (1 << 24) - 1)
        .build();
    assert!(config.validate().is_ok());
}

#[test]
fn test_engine_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .sector_size(u64::MAX)
        .folder_capacity_bounds(2, 2)
        .build();

    let result = Engine::open(config, Arc::new(MemoryStore::new()));
    assert!(matches!(result, Err(VaultError::Config(_))));
}
