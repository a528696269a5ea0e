//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;

use super::entry::{FrameHeader, HEADER_SIZE, MAX_BODY_SIZE};
use super::WalEntry;

/// One frame as seen by the reader
#[derive(Debug)]
pub enum Frame {
    /// A well-formed entry
    Entry(WalEntry),

    /// Length was plausible but the checksum or body was bad; the reader has
    /// already moved past it
    Corrupt { offset: u64, reason: String },

    /// The file ends inside a frame (or its length field is garbage);
    /// nothing after `offset` can be trusted
    TornTail { offset: u64 },
}

/// Reads frames sequentially from a WAL file
pub struct WalReader {
    reader: BufReader<File>,
    position: u64,
    file_len: u64,
    done: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
            done: false,
        })
    }

    /// Read the next frame. `None` at a clean end of file or after a torn tail.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.done || self.position == self.file_len {
            return Ok(None);
        }

        let offset = self.position;
        let remaining = self.file_len - self.position;
        if remaining < HEADER_SIZE as u64 {
            return Ok(Some(self.torn(offset)));
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header_bytes)?;
        let header = FrameHeader::parse(&header_bytes);

        let body_len = header.len as u64;
        if header.len > MAX_BODY_SIZE || body_len > remaining - HEADER_SIZE as u64 {
            return Ok(Some(self.torn(offset)));
        }

        let mut body = vec![0u8; header.len as usize];
        self.reader.read_exact(&mut body)?;
        self.position += HEADER_SIZE as u64 + body_len;

        match WalEntry::from_body(&header, &body) {
            Ok(entry) => Ok(Some(Frame::Entry(entry))),
            Err(e) => Ok(Some(Frame::Corrupt {
                offset,
                reason: e.to_string(),
            })),
        }
    }

    /// Read the next valid entry, skipping corrupt frames
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        while let Some(frame) = self.next_frame()? {
            if let Frame::Entry(entry) = frame {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator { reader: self }
    }

    /// Byte offset of the next frame
    pub fn position(&self) -> u64 {
        self.position
    }

    fn torn(&mut self, offset: u64) -> Frame {
        self.done = true;
        Frame::TornTail { offset }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_entry().transpose()
    }
}
