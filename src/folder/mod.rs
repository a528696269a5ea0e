//! Folder Module
//!
//! Storage folders, their free-slot indexes and the registry that selects
//! one for each new sector.
//!
//! ## Responsibilities
//! - Own each folder's extent file (`capacity × sector_size` bytes)
//! - Track occupied slots per folder
//! - Pick a folder with room without ever blocking on a folder lock
//! - Validate that a shrink/delete can be absorbed by the other folders
//!
//! ## On-disk Layout
//! ```text
//! {folder path}/
//!   └── sectors.dat     slot 0 | slot 1 | ... | slot capacity-1
//! ```

mod handle;
mod registry;
mod slots;

pub use handle::{Folder, FolderGuard, FolderState, FolderStatus, LockedFolder, EXTENT_FILENAME};
pub use registry::{FolderRegistry, Selection};
pub use slots::FreeSlots;
