//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest body accepted by the reader; anything bigger is treated as a torn
/// length field rather than trusted.
pub const MAX_BODY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing within one log file
    pub lsn: u64,

    /// What happened
    pub record: Record,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Transaction records
///
/// A transaction is identified by the LSN of its `Intent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// An update is about to touch an extent file and metadata
    Intent {
        txn: u64,
        /// Update kind, kept outside the payload so an undecodable payload
        /// can still be reported by kind
        name: String,
        payload: Vec<u8>,
    },

    /// The physical part of the update is durable
    Commit { txn: u64 },

    /// Metadata is durable; the transaction needs no recovery
    Release { txn: u64 },
}

impl Record {
    pub fn txn(&self) -> u64 {
        match self {
            Record::Intent { txn, .. } | Record::Commit { txn } | Record::Release { txn } => *txn,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Body {
    record: Record,
    timestamp: u64,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, record: Record) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            record,
            timestamp,
        }
    }

    /// Serialize to the on-disk frame: header followed by the bincode body
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(&Body {
            record: self.record.clone(),
            timestamp: self.timestamp,
        })?;
        if body.len() > MAX_BODY_SIZE as usize {
            return Err(VaultError::InvalidArgument(format!(
                "WAL entry body of {} bytes exceeds limit",
                body.len()
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&compute_crc(self.lsn, &body).to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Parse a complete frame, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(VaultError::Corrupt(format!(
                "WAL frame of {} bytes is shorter than header",
                bytes.len()
            )));
        }
        let header = FrameHeader::parse(&bytes[..HEADER_SIZE]);
        let body = &bytes[HEADER_SIZE..];
        if body.len() != header.len as usize {
            return Err(VaultError::Corrupt(format!(
                "WAL frame length mismatch: header says {}, got {}",
                header.len,
                body.len()
            )));
        }
        Self::from_body(&header, body)
    }

    pub(crate) fn from_body(header: &FrameHeader, body: &[u8]) -> Result<Self> {
        let crc = compute_crc(header.lsn, body);
        if crc != header.crc {
            return Err(VaultError::Corrupt(format!(
                "CRC mismatch at LSN {}: stored {:08x}, computed {:08x}",
                header.lsn, header.crc, crc
            )));
        }
        let decoded: Body = bincode::deserialize(body)
            .map_err(|e| VaultError::Corrupt(format!("undecodable WAL body: {}", e)))?;
        Ok(Self {
            lsn: header.lsn,
            record: decoded.record,
            timestamp: decoded.timestamp,
        })
    }
}

/// Parsed fixed-size frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub fn parse(bytes: &[u8]) -> Self {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);
        Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        }
    }
}

/// CRC over the LSN and body so a frame can't be replayed under another LSN
fn compute_crc(lsn: u64, body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(body);
    hasher.finalize()
}
