//! reference model of the shielded ledger.
//!
//! The types here mirror the shape of a real shielded ledger closely enough
//! for the wallet to be driven end to end: coins are hidden behind
//! commitments, spends reveal nullifiers, recipients learn about new coins
//! through encrypted notifications.  Hashing is SHA3-256 with domain
//! separation; it is deterministic but makes no zero-knowledge claims.

use sha3::Digest;
use sha3::Sha3_256;

pub mod address;
pub mod coin;
pub mod commitment_tree;
pub mod fees;
pub mod imbalances;
pub mod keys;
pub mod notification;
pub mod token;
pub mod transaction;

pub use address::AddressError;
pub use address::ShieldedAddress;
pub use coin::CoinCommitment;
pub use coin::CoinInfo;
pub use coin::Nonce;
pub use coin::Nullifier;
pub use coin::QualifiedCoinInfo;
pub use commitment_tree::CollapsedUpdate;
pub use commitment_tree::CommitmentTree;
pub use fees::FeeSchedule;
pub use imbalances::Imbalances;
pub use imbalances::TransactionImbalances;
pub use keys::PublicKeys;
pub use keys::SecretKeys;
pub use token::TokenType;
pub use transaction::ApplyStage;
pub use transaction::Offer;
pub use transaction::ProofState;
pub use transaction::Transaction;
pub use transaction::TransactionHash;

/// SHA3-256 over a domain tag and length-prefixed parts.
pub(crate) fn domain_hash(domain: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(domain.as_bytes());
    hasher.update([0u8]);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}
