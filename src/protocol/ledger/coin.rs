use serde::Deserialize;
use serde::Serialize;

use super::domain_hash;
use super::keys::CoinPublicKey;
use super::keys::CoinSecretKey;
use super::token::TokenType;
use crate::macros::bytes32_newtype;

bytes32_newtype! {
    /// makes otherwise identical coins distinct.
    pub struct Nonce;
}

bytes32_newtype! {
    pub struct CoinCommitment;
}

bytes32_newtype! {
    pub struct Nullifier;
}

impl Nonce {
    pub fn random() -> Self {
        Self::from_bytes(rand::random())
    }
}

/// a coin as its owner sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "arbitrary-impls"), derive(arbitrary::Arbitrary))]
pub struct CoinInfo {
    pub nonce: Nonce,
    pub token_type: TokenType,
    pub value: u128,
}

impl CoinInfo {
    /// a fresh coin with a random nonce.
    pub fn new(token_type: TokenType, value: u128) -> Self {
        Self {
            nonce: Nonce::random(),
            token_type,
            value,
        }
    }

    fn encode(&self) -> [u8; 80] {
        let mut bytes = [0u8; 80];
        bytes[..32].copy_from_slice(self.nonce.as_bytes());
        bytes[32..64].copy_from_slice(self.token_type.as_bytes());
        bytes[64..].copy_from_slice(&self.value.to_le_bytes());
        bytes
    }

    /// the public commitment to this coin when owned by `owner`.
    pub fn commitment(&self, owner: &CoinPublicKey) -> CoinCommitment {
        CoinCommitment::from_bytes(domain_hash(
            "coin-commitment",
            &[&self.encode(), owner.as_bytes()],
        ))
    }

    /// the nullifier revealed when this coin is spent.
    pub fn nullifier(&self, secret_key: &CoinSecretKey) -> Nullifier {
        Nullifier::from_bytes(domain_hash(
            "coin-nullifier",
            &[&self.encode(), secret_key.as_bytes()],
        ))
    }

    pub fn qualify(self, mt_index: u64) -> QualifiedCoinInfo {
        QualifiedCoinInfo {
            nonce: self.nonce,
            token_type: self.token_type,
            value: self.value,
            mt_index,
        }
    }
}

/// a coin together with the position of its commitment in the commitment
/// tree.  Only qualified coins can be spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "arbitrary-impls"), derive(arbitrary::Arbitrary))]
pub struct QualifiedCoinInfo {
    pub nonce: Nonce,
    pub token_type: TokenType,
    pub value: u128,
    pub mt_index: u64,
}

impl QualifiedCoinInfo {
    pub fn coin(&self) -> CoinInfo {
        CoinInfo {
            nonce: self.nonce,
            token_type: self.token_type,
            value: self.value,
        }
    }
}

impl From<QualifiedCoinInfo> for CoinInfo {
    fn from(q: QualifiedCoinInfo) -> Self {
        q.coin()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::super::keys::SecretKeys;
    use super::*;

    #[test]
    fn commitment_and_nullifier_depend_on_keys() {
        let alice = SecretKeys::from_seed([1u8; 32]);
        let bob = SecretKeys::from_seed([2u8; 32]);
        let coin = CoinInfo::new(TokenType::native(), 10);

        assert_ne!(
            coin.commitment(&alice.public_keys().coin_public_key),
            coin.commitment(&bob.public_keys().coin_public_key)
        );
        assert_ne!(
            coin.nullifier(alice.coin_secret_key()),
            coin.nullifier(bob.coin_secret_key())
        );
    }

    #[test]
    fn qualified_coin_keeps_identity() {
        let coin = CoinInfo::new(TokenType::custom("x"), 3);
        let qualified = coin.qualify(9);
        assert_eq!(coin, qualified.coin());
        assert_eq!(9, qualified.mt_index);
    }
}
