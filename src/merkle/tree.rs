//! Binary Merkle tree primitives
//!
//! Leaves and interior nodes are domain-separated so a node can never be
//! passed off as a leaf:
//! ```text
//! leaf = SHA-256(0x00 ‖ data)
//! node = SHA-256(0x01 ‖ left ‖ right)
//! ```
//! A tree over `n` leaves splits at the largest power of two below `n`, so
//! the left side is always a perfect subtree.

use sha2::{Digest, Sha256};

use crate::error::{Result, VaultError};
use crate::types::Hash;

/// Bytes per leaf segment of a sector
pub const SEGMENT_SIZE: usize = 64;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

pub fn leaf_hash(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(data);
    Hash(hasher.finalize().into())
}

pub fn join(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash(hasher.finalize().into())
}

/// Root over `leaves` computed from scratch
pub fn root_of(leaves: &[Hash]) -> Hash {
    match leaves.len() {
        0 => Hash::ZERO,
        1 => leaves[0],
        n => {
            let split = largest_power_of_two_below(n);
            join(&root_of(&leaves[..split]), &root_of(&leaves[split..]))
        }
    }
}

fn largest_power_of_two_below(n: usize) -> usize {
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

/// Content root of a sector: the Merkle root over its 64-byte segments
pub fn sector_root(data: &[u8]) -> Hash {
    let mut stack = MerkleStack::new();
    for segment in data.chunks(SEGMENT_SIZE) {
        stack.push(leaf_hash(segment));
    }
    stack.root()
}

// =============================================================================
// Streaming Stack
// =============================================================================

/// Streaming tree builder holding one root per perfect subtree
///
/// Heights on the stack strictly decrease from bottom to top, exactly like
/// the set bits of the leaf count.
#[derive(Debug, Clone, Default)]
pub struct MerkleStack {
    subtrees: Vec<(u32, Hash)>,
}

impl MerkleStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one leaf hash
    pub fn push(&mut self, leaf: Hash) {
        self.push_unchecked(0, leaf);
    }

    /// Append the root of a perfect subtree of `height`
    ///
    /// The subtree must not be taller than the smallest subtree already on
    /// the stack, otherwise leaf order would be broken.
    pub fn push_subtree(&mut self, height: u32, root: Hash) -> Result<()> {
        if let Some(&(top, _)) = self.subtrees.last() {
            if height > top {
                return Err(VaultError::InvalidArgument(format!(
                    "subtree of height {} pushed above height {}",
                    height, top
                )));
            }
        }
        self.push_unchecked(height, root);
        Ok(())
    }

    pub(crate) fn push_unchecked(&mut self, mut height: u32, mut root: Hash) {
        while let Some(&(top, left)) = self.subtrees.last() {
            if top != height {
                break;
            }
            self.subtrees.pop();
            root = join(&left, &root);
            height += 1;
        }
        self.subtrees.push((height, root));
    }

    /// Root over everything pushed so far
    pub fn root(&self) -> Hash {
        let mut iter = self.subtrees.iter().rev();
        let Some(&(_, mut acc)) = iter.next() else {
            return Hash::ZERO;
        };
        for (_, left) in iter {
            acc = join(left, &acc);
        }
        acc
    }

    pub fn is_empty(&self) -> bool {
        self.subtrees.is_empty()
    }
}

