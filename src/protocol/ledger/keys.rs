use serde::Deserialize;
use serde::Serialize;

use super::domain_hash;
use crate::macros::bytes32_newtype;

bytes32_newtype! {
    pub struct CoinSecretKey;
}

bytes32_newtype! {
    pub struct CoinPublicKey;
}

bytes32_newtype! {
    /// also serves as the viewing key handed to the indexer.
    pub struct EncryptionSecretKey;
}

bytes32_newtype! {
    pub struct EncryptionPublicKey;
}

impl CoinSecretKey {
    pub fn public_key(&self) -> CoinPublicKey {
        CoinPublicKey::from_bytes(domain_hash("coin-public-key", &[self.as_bytes()]))
    }
}

impl EncryptionSecretKey {
    pub fn public_key(&self) -> EncryptionPublicKey {
        EncryptionPublicKey::from_bytes(domain_hash("encryption-public-key", &[self.as_bytes()]))
    }
}

/// the wallet's secret key material.
///
/// `Debug` is redacted; secret keys must never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKeys {
    coin_secret_key: CoinSecretKey,
    encryption_secret_key: EncryptionSecretKey,
}

impl std::fmt::Debug for SecretKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKeys(<redacted>)")
    }
}

impl SecretKeys {
    /// derive both secret keys from a 32 byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            coin_secret_key: CoinSecretKey::from_bytes(domain_hash("coin-secret-key", &[&seed])),
            encryption_secret_key: EncryptionSecretKey::from_bytes(domain_hash(
                "encryption-secret-key",
                &[&seed],
            )),
        }
    }

    pub fn random() -> Self {
        Self::from_seed(rand::random())
    }

    pub fn coin_secret_key(&self) -> &CoinSecretKey {
        &self.coin_secret_key
    }

    pub fn encryption_secret_key(&self) -> &EncryptionSecretKey {
        &self.encryption_secret_key
    }

    pub fn public_keys(&self) -> PublicKeys {
        PublicKeys {
            coin_public_key: self.coin_secret_key.public_key(),
            encryption_public_key: self.encryption_secret_key.public_key(),
        }
    }
}

/// public half of [SecretKeys].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeys {
    pub coin_public_key: CoinPublicKey,
    pub encryption_public_key: EncryptionPublicKey,
}
