//! Incremental root cache
//!
//! Leaves are grouped into runs of `K = 2^cache_height`. A full run is hashed
//! once into a cached subtree and never touched again; only the trailing
//! partial run is kept as raw leaves.
//!
//! ```text
//! leaves:  [0 .. K) [K .. 2K) ... [cK .. cK+r)
//!            │         │              │
//!          cached    cached        uncached (r < K)
//! ```
//! A root costs `O(c + K)` hashes instead of `O(n)`.

use super::tree::{root_of, MerkleStack};
use crate::types::Hash;

/// Largest accepted `cache_height`; larger values are clamped
pub const MAX_CACHE_HEIGHT: u32 = 32;

/// Root and height of one full run of leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedSubTree {
    pub height: u32,
    pub sum: Hash,
}

/// Append-only sequence of leaf hashes with a cached root
#[derive(Debug, Clone)]
pub struct MerkleRoots {
    cache_height: u32,
    cached: Vec<CachedSubTree>,
    uncached: Vec<Hash>,
    len: u64,
}

impl MerkleRoots {
    pub fn new(cache_height: u32) -> Self {
        Self {
            cache_height: cache_height.min(MAX_CACHE_HEIGHT),
            cached: Vec::new(),
            uncached: Vec::new(),
            len: 0,
        }
    }

    pub fn from_leaves(cache_height: u32, leaves: impl IntoIterator<Item = Hash>) -> Self {
        let mut roots = Self::new(cache_height);
        for leaf in leaves {
            roots.append(leaf);
        }
        roots
    }

    /// Leaves per cached subtree
    fn run_len(&self) -> usize {
        1usize << self.cache_height
    }

    pub fn append(&mut self, leaf: Hash) {
        self.uncached.push(leaf);
        self.len += 1;

        if self.uncached.len() == self.run_len() {
            let sum = root_of(&self.uncached);
            self.cached.push(CachedSubTree {
                height: self.cache_height,
                sum,
            });
            self.uncached.clear();
        }
    }

    /// Root the sequence would have after appending `leaf`, without
    /// appending it
    pub fn preview_root_with(&self, leaf: Hash) -> Hash {
        let mut stack = self.stack();
        stack.push(leaf);
        stack.root()
    }

    pub fn root(&self) -> Hash {
        self.stack().root()
    }

    pub fn cache_height(&self) -> u32 {
        self.cache_height
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn stack(&self) -> MerkleStack {
        let mut stack = MerkleStack::new();
        // All cached subtrees share one height, so pushes stay ordered
        for subtree in &self.cached {
            stack.push_unchecked(subtree.height, subtree.sum);
        }
        for leaf in &self.uncached {
            stack.push(*leaf);
        }
        stack
    }
}
