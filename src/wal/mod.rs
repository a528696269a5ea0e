//! Write-Ahead Log (WAL) Module
//!
//! Makes multi-step updates (extent file + metadata) recoverable.
//!
//! ## Responsibilities
//! - Log an update's intent before it touches anything
//! - Record commit (physical write durable) and release (metadata durable)
//! - CRC32 checksums for corruption detection
//! - Report unreleased transactions on restart
//!
//! ## Transaction Protocol
//! ```text
//! Intent ──▶ physical write ──▶ Commit ──▶ metadata update ──▶ Release
//! ```
//! When no transaction is open the file is truncated to zero length.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Body   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Body   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Record, WalEntry, HEADER_SIZE, MAX_BODY_SIZE};
pub use reader::{Frame, WalIterator, WalReader};
pub use recovery::{PendingTransaction, RecoveryResult, WalRecovery};
pub use writer::WalWriter;
