use serde::Deserialize;
use serde::Serialize;

use super::coin::CoinCommitment;
use super::domain_hash;
use crate::macros::bytes32_newtype;

bytes32_newtype! {
    pub struct TreeRoot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TreeError {
    #[error("update starts at leaf {start} but the tree expects leaf {first_free}")]
    Gap { start: u64, first_free: u64 },

    #[error("update range [{start}, {end}) is inverted")]
    InvertedRange { start: u64, end: u64 },
}

/// the root of the commitment tree after a range of leaves, without the
/// leaves themselves.  Used to skip over commitments the wallet does not
/// care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapsedUpdate {
    pub start: u64,
    pub end: u64,
    pub root: TreeRoot,
}

/// append-only commitment accumulator.
///
/// Stands in for the ledger's Merkle tree: the root is a hash chain over all
/// appended commitments, and leaves are addressed by their append position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentTree {
    first_free: u64,
    root: TreeRoot,
}

impl Default for CommitmentTree {
    fn default() -> Self {
        Self {
            first_free: 0,
            root: TreeRoot::from_bytes([0u8; 32]),
        }
    }
}

impl CommitmentTree {
    pub fn first_free(&self) -> u64 {
        self.first_free
    }

    pub fn root(&self) -> TreeRoot {
        self.root
    }

    /// append a commitment and return its leaf index.
    pub fn append(&mut self, commitment: &CoinCommitment) -> u64 {
        let index = self.first_free;
        self.root = TreeRoot::from_bytes(domain_hash(
            "tree-append",
            &[self.root.as_bytes(), commitment.as_bytes()],
        ));
        self.first_free += 1;
        index
    }

    /// collapsed update taking a tree at `start` leaves to this tree.
    pub fn collapsed_since(&self, start: u64) -> CollapsedUpdate {
        CollapsedUpdate {
            start,
            end: self.first_free,
            root: self.root,
        }
    }

    /// merge a collapsed update.  Updates entirely behind the tree are
    /// ignored (they were already applied); an update that does not start
    /// at the first free leaf is rejected.
    pub fn merge(&mut self, update: &CollapsedUpdate) -> Result<(), TreeError> {
        if update.end < update.start {
            return Err(TreeError::InvertedRange {
                start: update.start,
                end: update.end,
            });
        }
        if update.end <= self.first_free && update.start < self.first_free {
            return Ok(());
        }
        if update.start != self.first_free {
            return Err(TreeError::Gap {
                start: update.start,
                first_free: self.first_free,
            });
        }
        self.first_free = update.end;
        self.root = update.root;
        Ok(())
    }
}
