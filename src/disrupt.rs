//! Fault injection
//!
//! Named one-shot points at which an update aborts as if the process had
//! died there: the WAL transaction stays open and nothing is cleaned up.
//! Points are `<update-name>/<stage>`, e.g. `add-sector/write`.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, VaultError};

/// Where in the transaction protocol a point sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Intent logged, nothing written
    Intent,
    /// Physical write done, commit not logged
    Write,
    /// Commit logged, metadata not updated
    Commit,
    /// Metadata updated, release not logged
    Metadata,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intent => "intent",
            Stage::Write => "write",
            Stage::Commit => "commit",
            Stage::Metadata => "metadata",
        }
    }
}

/// Set of armed disruption points; cheap to clone
#[derive(Debug, Clone, Default)]
pub struct Disruptor {
    armed: Arc<Mutex<HashSet<String>>>,
}

impl Disruptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the point for `update` at `stage`
    pub fn arm(&self, update: &str, stage: Stage) {
        self.armed.lock().insert(Self::point(update, stage));
    }

    pub fn disarm_all(&self) {
        self.armed.lock().clear();
    }

    /// Fire (and disarm) the point if armed
    pub fn check(&self, update: &str, stage: Stage) -> Result<()> {
        let point = Self::point(update, stage);
        if self.armed.lock().remove(&point) {
            tracing::warn!("Disruption point {} fired", point);
            return Err(VaultError::Disrupted(point));
        }
        Ok(())
    }

    fn point(update: &str, stage: Stage) -> String {
        format!("{}/{}", update, stage.as_str())
    }
}
