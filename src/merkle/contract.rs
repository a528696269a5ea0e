//! Persisted per-contract roots
//!
//! Each sector root a contract covers is stored under
//! `roots/{contract hex}/{index:016x}`, so a prefix scan returns them in
//! leaf order.

use crate::error::{Result, VaultError};
use crate::meta::{Metadata, ROOTS_PREFIX};
use crate::types::Hash;

use super::MerkleRoots;

/// The ordered sector roots of one contract and their cached Merkle root
#[derive(Debug)]
pub struct ContractRoots {
    meta: Metadata,
    contract: Hash,
    roots: MerkleRoots,
}

impl ContractRoots {
    /// Rebuild the cache from the persisted roots of `contract`
    pub fn load(meta: Metadata, contract: Hash, cache_height: u32) -> Result<Self> {
        let stored = Self::scan(&meta, &contract)?;
        let roots = MerkleRoots::from_leaves(cache_height, stored);
        tracing::debug!(
            "Loaded {} roots for contract {}",
            roots.len(),
            contract.to_hex()
        );
        Ok(Self {
            meta,
            contract,
            roots,
        })
    }

    pub fn contract(&self) -> &Hash {
        &self.contract
    }

    /// Persist `root` as the next leaf, then add it to the cache
    pub fn push(&mut self, root: Hash) -> Result<()> {
        let key = root_key(&self.contract, self.roots.len());
        self.meta.store().put(&key, root.as_bytes())?;
        self.roots.append(root);
        Ok(())
    }

    /// All persisted roots, checked against the cache
    pub fn roots(&self) -> Result<Vec<Hash>> {
        let stored = Self::scan(&self.meta, &self.contract)?;
        if stored.len() as u64 != self.roots.len() {
            return Err(VaultError::Corrupt(format!(
                "contract {} has {} stored roots but {} cached",
                self.contract.to_hex(),
                stored.len(),
                self.roots.len()
            )));
        }
        Ok(stored)
    }

    pub fn root(&self) -> Hash {
        self.roots.root()
    }

    pub fn preview_root_with(&self, root: Hash) -> Hash {
        self.roots.preview_root_with(root)
    }

    pub fn len(&self) -> u64 {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    fn scan(meta: &Metadata, contract: &Hash) -> Result<Vec<Hash>> {
        let prefix = contract_prefix(contract);
        let entries = meta.store().scan_prefix(&prefix)?;

        let mut roots = Vec::with_capacity(entries.len());
        for (expected, (key, value)) in entries.into_iter().enumerate() {
            let index = u64::from_str_radix(&key[prefix.len()..], 16)
                .map_err(|_| VaultError::Corrupt(format!("bad root key {}", key)))?;
            if index != expected as u64 {
                return Err(VaultError::Corrupt(format!(
                    "contract {} is missing root {}",
                    contract.to_hex(),
                    expected
                )));
            }
            let bytes: [u8; 32] = value
                .as_slice()
                .try_into()
                .map_err(|_| VaultError::Corrupt(format!("root {} has {} bytes", key, value.len())))?;
            roots.push(Hash(bytes));
        }
        Ok(roots)
    }
}

fn contract_prefix(contract: &Hash) -> String {
    format!("{}{}/", ROOTS_PREFIX, contract.to_hex())
}

fn root_key(contract: &Hash, index: u64) -> String {
    format!("{}{:016x}", contract_prefix(contract), index)
}
