use bech32::FromBase32;
use bech32::ToBase32;
use bech32::Variant;
use serde::Deserialize;
use serde::Serialize;

use super::keys::CoinPublicKey;
use super::keys::EncryptionPublicKey;
use super::keys::EncryptionSecretKey;
use super::keys::PublicKeys;
use crate::application::config::Network;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AddressError {
    #[error("invalid address `{original_address}`: {reason}")]
    InvalidAddress {
        original_address: String,
        reason: String,
    },

    #[error("invalid viewing key: {0}")]
    InvalidViewingKey(String),

    #[error("could not encode as bech32m: {0}")]
    Encoding(String),
}

/// where shielded coins are sent: the recipient's coin public key (owner of
/// the commitment) and encryption public key (for the notification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShieldedAddress {
    pub coin_public_key: CoinPublicKey,
    pub encryption_public_key: EncryptionPublicKey,
}

impl From<PublicKeys> for ShieldedAddress {
    fn from(keys: PublicKeys) -> Self {
        Self {
            coin_public_key: keys.coin_public_key,
            encryption_public_key: keys.encryption_public_key,
        }
    }
}

impl ShieldedAddress {
    fn payload(&self) -> Vec<u8> {
        [
            self.coin_public_key.as_bytes().as_slice(),
            self.encryption_public_key.as_bytes().as_slice(),
        ]
        .concat()
    }

    pub fn to_bech32m(&self, network: Network) -> Result<String, AddressError> {
        bech32::encode(
            &network.address_hrp(),
            self.payload().to_base32(),
            Variant::Bech32m,
        )
        .map_err(|e| AddressError::Encoding(e.to_string()))
    }

    pub fn from_bech32m(encoded: &str, network: Network) -> Result<Self, AddressError> {
        let invalid = |reason: String| AddressError::InvalidAddress {
            original_address: encoded.to_string(),
            reason,
        };

        let (hrp, data, variant) = bech32::decode(encoded).map_err(|e| invalid(e.to_string()))?;
        if variant != Variant::Bech32m {
            return Err(invalid("not bech32m".to_string()));
        }
        if hrp != network.address_hrp() {
            return Err(invalid(format!(
                "prefix `{}` does not belong to network {}",
                hrp, network
            )));
        }

        let payload = Vec::<u8>::from_base32(&data).map_err(|e| invalid(e.to_string()))?;
        let (cpk, epk) = match <[u8; 64]>::try_from(payload.as_slice()) {
            Ok(bytes) => {
                let mut cpk = [0u8; 32];
                let mut epk = [0u8; 32];
                cpk.copy_from_slice(&bytes[..32]);
                epk.copy_from_slice(&bytes[32..]);
                (cpk, epk)
            }
            Err(_) => {
                return Err(invalid(format!(
                    "expected 64 payload bytes, got {}",
                    payload.len()
                )))
            }
        };

        Ok(Self {
            coin_public_key: CoinPublicKey::from_bytes(cpk),
            encryption_public_key: EncryptionPublicKey::from_bytes(epk),
        })
    }
}

/// bech32m encoding of the viewing key handed to the indexer.
pub fn encode_viewing_key(
    key: &EncryptionSecretKey,
    network: Network,
) -> Result<String, AddressError> {
    bech32::encode(
        &network.viewing_key_hrp(),
        key.as_bytes().to_base32(),
        Variant::Bech32m,
    )
    .map_err(|e| AddressError::Encoding(e.to_string()))
}

pub fn decode_viewing_key(
    encoded: &str,
    network: Network,
) -> Result<EncryptionSecretKey, AddressError> {
    let (hrp, data, variant) =
        bech32::decode(encoded).map_err(|e| AddressError::InvalidViewingKey(e.to_string()))?;
    if variant != Variant::Bech32m || hrp != network.viewing_key_hrp() {
        return Err(AddressError::InvalidViewingKey(format!(
            "unexpected prefix `{}`",
            hrp
        )));
    }
    let bytes = Vec::<u8>::from_base32(&data)
        .map_err(|e| AddressError::InvalidViewingKey(e.to_string()))?;
    let bytes = <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| AddressError::InvalidViewingKey("expected 32 bytes".to_string()))?;
    Ok(EncryptionSecretKey::from_bytes(bytes))
}
