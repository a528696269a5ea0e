//! # SectorVault
//!
//! A crash-safe sector storage engine for a storage host:
//! - Fixed-size, content-addressed sectors with reference-counted dedup
//! - Sectors spread over any number of folders, each one extent file
//! - Write-ahead log making every add/delete/resize atomic across crashes
//! - Lock hierarchy letting unrelated sectors and folders change in parallel
//! - Incremental Merkle roots over per-contract sector lists
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │     add/read/delete sector · add/resize/delete folder        │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//! ┌─────────────┐   ┌───────────────┐   ┌─────────────┐
//! │ LockManager │   │      WAL      │   │  Metadata   │
//! │ structural  │   │ intent/commit │   │  (KV store) │
//! │ folder      │   │ /release      │   └─────────────┘
//! │ sector      │   └───────────────┘
//! └──────┬──────┘
//!        ▼
//! ┌─────────────────────────────┐        ┌─────────────────┐
//! │ FolderRegistry              │        │  MerkleRoots    │
//! │  folder → extent + slots    │        │  ContractRoots  │
//! └─────────────────────────────┘        └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod types;

pub mod meta;
pub mod wal;
pub mod folder;
pub mod lock;
pub mod merkle;
pub mod disrupt;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, VaultError};
pub use config::{Config, WalSyncStrategy};
pub use types::{FolderId, Hash, Salt, SectorId};
pub use engine::{Engine, FolderInfo, HostSpace};
pub use merkle::{sector_root, ContractRoots, MerkleRoots};
pub use meta::{MemoryStore, MetadataStore, RocksStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SectorVault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
