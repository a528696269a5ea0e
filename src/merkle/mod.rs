//! Merkle Module
//!
//! Commitments over ordered sequences of 32-byte hashes.
//!
//! ## Responsibilities
//! - Hash sector content into its root (`sector_root`)
//! - Keep an append-only root cache whose cost per root does not grow with
//!   the full leaf count (`MerkleRoots`)
//! - Quote the root an append would produce before accepting it
//! - Persist each contract's ordered roots (`ContractRoots`)

mod contract;
mod roots;
mod tree;

pub use contract::ContractRoots;
pub use roots::{CachedSubTree, MerkleRoots, MAX_CACHE_HEIGHT};
pub use tree::{join, leaf_hash, root_of, sector_root, MerkleStack, SEGMENT_SIZE};
