//! Error types for SectorVault
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::types::FolderId;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for SectorVault operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup / Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Insufficient free space: need {needed} sectors, {available} available")]
    InsufficientFreeSpace { needed: u64, available: u64 },

    #[error("Folder {0} is unavailable")]
    FolderUnavailable(FolderId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    /// Undecodable WAL entry or a broken on-disk invariant
    #[error("Corruption detected: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The metadata store failed a read or write
    #[error("Metadata store error: {0}")]
    Store(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    /// Every candidate folder was locked by someone else; retry later
    #[error("Busy: {0}")]
    Busy(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Fault Injection / Composition
    // -------------------------------------------------------------------------
    /// An armed disruption point fired; the transaction is left open
    #[error("Disrupted at {0}")]
    Disrupted(String),

    #[error("{context}: {}", .errors.join("; "))]
    Composed { context: String, errors: Vec<String> },
}

impl VaultError {
    /// Compose a primary failure with any follow-up failures into one error.
    ///
    /// Returns the primary error untouched when there is nothing to add.
    pub fn compose(context: impl Into<String>, primary: VaultError, others: Vec<VaultError>) -> Self {
        if others.is_empty() {
            return primary;
        }
        let mut errors = vec![primary.to_string()];
        errors.extend(others.iter().map(|e| e.to_string()));
        VaultError::Composed {
            context: context.into(),
            errors,
        }
    }
}

impl From<rocksdb::Error> for VaultError {
    fn from(err: rocksdb::Error) -> Self {
        VaultError::Store(err.to_string())
    }
}

impl From<bincode::Error> for VaultError {
    fn from(err: bincode::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}
