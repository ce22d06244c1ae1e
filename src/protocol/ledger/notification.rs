//! encrypted output notifications and trial decryption.
//!
//! The AES-256-GCM key is hashed from the recipient's *public* encryption
//! key.  Anyone who knows the address can therefore derive it and open a
//! notification; trial decryption only tells a wallet which outputs are
//! its own.  This models notification delivery for the simulated ledger
//! and is not a viewing-key scheme: it gives no confidentiality.

use aes_gcm::aead::Aead;
use aes_gcm::aead::KeyInit;
use aes_gcm::Aes256Gcm;
use aes_gcm::Key;
use serde::Deserialize;
use serde::Serialize;

use super::coin::CoinInfo;
use super::domain_hash;
use super::keys::EncryptionPublicKey;
use super::keys::EncryptionSecretKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum NotificationError {
    #[error("could not encode coin for notification: {0}")]
    Encoding(String),

    #[error("notification encryption failed")]
    Encryption,
}

/// an encrypted message telling the recipient of an output which coin it
/// received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Notification {
    nonce: [u8; 12],
    ciphertext: Vec<u8>,
}

fn cipher_for(recipient: &EncryptionPublicKey) -> Aes256Gcm {
    let key = domain_hash("notification-key", &[recipient.as_bytes()]);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
}

impl Notification {
    pub fn encrypt(coin: &CoinInfo, recipient: &EncryptionPublicKey) -> Result<Self, NotificationError> {
        let plaintext =
            bincode::serialize(coin).map_err(|e| NotificationError::Encoding(e.to_string()))?;
        let nonce: [u8; 12] = rand::random();
        let ciphertext = cipher_for(recipient)
            .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| NotificationError::Encryption)?;
        Ok(Self { nonce, ciphertext })
    }

    /// returns the coin if this notification was addressed to the public key
    /// of `secret_key`.
    pub fn try_decrypt(&self, secret_key: &EncryptionSecretKey) -> Option<CoinInfo> {
        let plaintext = cipher_for(&secret_key.public_key())
            .decrypt(
                aes_gcm::Nonce::from_slice(&self.nonce),
                self.ciphertext.as_slice(),
            )
            .ok()?;
        bincode::deserialize(&plaintext).ok()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::super::keys::SecretKeys;
    use super::super::token::TokenType;
    use super::*;

    #[test]
    fn other_keys_do_not_decrypt() {
        let alice = SecretKeys::from_seed([1u8; 32]);
        let bob = SecretKeys::from_seed([2u8; 32]);
        let coin = CoinInfo::new(TokenType::native(), 42);

        let notification =
            Notification::encrypt(&coin, &alice.public_keys().encryption_public_key).unwrap();
        assert_eq!(
            Some(coin),
            notification.try_decrypt(alice.encryption_secret_key())
        );
        assert_eq!(None, notification.try_decrypt(bob.encryption_secret_key()));
    }

    #[test]
    fn recipient_public_key_alone_opens_a_notification() {
        let alice = SecretKeys::from_seed([1u8; 32]);
        let address_key = alice.public_keys().encryption_public_key;
        let coin = CoinInfo::new(TokenType::native(), 7);

        let notification = Notification::encrypt(&coin, &address_key).unwrap();
        let plaintext = cipher_for(&address_key)
            .decrypt(
                aes_gcm::Nonce::from_slice(&notification.nonce),
                notification.ciphertext.as_slice(),
            )
            .unwrap();
        assert_eq!(coin, bincode::deserialize::<CoinInfo>(&plaintext).unwrap());
    }
}
