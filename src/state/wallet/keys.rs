// private module.  no need for module docs.

use super::wallet_state::WalletState;
use crate::protocol::ledger::address::AddressError;
use crate::protocol::ledger::keys::CoinPublicKey;
use crate::protocol::ledger::keys::EncryptionPublicKey;
use crate::protocol::ledger::ShieldedAddress;

impl WalletState {
    pub fn coin_public_key(&self) -> CoinPublicKey {
        self.public_keys.coin_public_key
    }

    pub fn encryption_public_key(&self) -> EncryptionPublicKey {
        self.public_keys.encryption_public_key
    }

    /// the wallet's own receiving address.
    pub fn address(&self) -> ShieldedAddress {
        self.public_keys.into()
    }

    pub fn address_bech32m(&self) -> Result<String, AddressError> {
        self.address().to_bech32m(self.network)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use crate::application::config::Network;
    use crate::protocol::ledger::SecretKeys;
    use crate::protocol::ledger::ShieldedAddress;
    use crate::state::WalletState;

    #[test]
    fn address_decodes_to_own_keys() {
        let state = WalletState::new(SecretKeys::from_seed([2u8; 32]), Network::Devnet);
        let encoded = state.address_bech32m().unwrap();
        let decoded = ShieldedAddress::from_bech32m(&encoded, Network::Devnet).unwrap();
        assert_eq!(state.coin_public_key(), decoded.coin_public_key);
        assert_eq!(state.encryption_public_key(), decoded.encryption_public_key);
    }
}
