//! persists wallet state.
//!
//! The serialized form is hex encoded bincode with a schema version.  Secret
//! keys are never written; they are supplied again on deserialization and
//! checked against the public keys stored with the state.

use serde::Deserialize;
use serde::Serialize;

use crate::application::config::Network;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::CommitmentTree;
use crate::protocol::ledger::PublicKeys;
use crate::protocol::ledger::QualifiedCoinInfo;
use crate::protocol::ledger::SecretKeys;
use crate::protocol::ProtocolVersion;
use crate::state::wallet::SyncProgress;
use crate::state::wallet::TransactionHistory;
use crate::state::WalletState;

pub const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SerializationError {
    #[error("could not encode wallet state: {0}")]
    Encode(String),

    #[error("could not decode wallet state: {0}")]
    Decode(String),

    #[error("unsupported state schema version {found}, expected {expected}")]
    UnsupportedSchema { found: u32, expected: u32 },

    #[error("serialized state belongs to different keys")]
    KeyMismatch,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    schema_version: u32,
    network: Network,
    public_keys: PublicKeys,
    coins: Vec<QualifiedCoinInfo>,
    pending_spends: Vec<QualifiedCoinInfo>,
    pending_outputs: Vec<CoinInfo>,
    commitment_tree: CommitmentTree,
    progress: SyncProgress,
    transaction_history: TransactionHistory,
    protocol_version: ProtocolVersion,
}

/// converts wallet state to and from its persisted string form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateSerializer;

impl StateSerializer {
    pub fn serialize(&self, state: &WalletState) -> Result<String, SerializationError> {
        let persisted = PersistedState {
            schema_version: STATE_SCHEMA_VERSION,
            network: state.network,
            public_keys: state.public_keys,
            coins: state.coins.values().copied().collect(),
            pending_spends: state.pending_spends.values().copied().collect(),
            pending_outputs: state.pending_outputs.values().copied().collect(),
            commitment_tree: state.commitment_tree,
            progress: state.progress,
            transaction_history: state.transaction_history.clone(),
            protocol_version: state.protocol_version,
        };
        let bytes =
            bincode::serialize(&persisted).map_err(|e| SerializationError::Encode(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    /// restore a state serialized for `secret_keys`.  The restored state is
    /// disconnected until it hears from an indexer again.
    pub fn deserialize(
        &self,
        secret_keys: SecretKeys,
        serialized: &str,
    ) -> Result<WalletState, SerializationError> {
        let bytes =
            hex::decode(serialized.trim()).map_err(|e| SerializationError::Decode(e.to_string()))?;
        let persisted: PersistedState =
            bincode::deserialize(&bytes).map_err(|e| SerializationError::Decode(e.to_string()))?;

        if persisted.schema_version != STATE_SCHEMA_VERSION {
            return Err(SerializationError::UnsupportedSchema {
                found: persisted.schema_version,
                expected: STATE_SCHEMA_VERSION,
            });
        }
        if persisted.public_keys != secret_keys.public_keys() {
            return Err(SerializationError::KeyMismatch);
        }

        let mut state = WalletState::new(secret_keys, persisted.network);
        state.coins = persisted.coins.into_iter().map(|c| (c.nonce, c)).collect();
        state.pending_spends = persisted
            .pending_spends
            .into_iter()
            .map(|c| (c.nonce, c))
            .collect();
        state.pending_outputs = persisted
            .pending_outputs
            .into_iter()
            .map(|c| (c.nonce, c))
            .collect();
        state.commitment_tree = persisted.commitment_tree;
        state.progress = persisted.progress.disconnected();
        state.transaction_history = persisted.transaction_history;
        state.protocol_version = persisted.protocol_version;

        Ok(state)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use proptest::collection::vec;
    use proptest::prop_assert_eq;
    use test_strategy::proptest;

    use super::*;
    use crate::protocol::ledger::TokenType;
    use crate::tests::shared::funded_state;
    use crate::tests::shared::TEST_SEED;
    use crate::transacting::coin_selection::CoinSelectionPolicy;
    use crate::transacting::TokenTransfer;
    use crate::transacting::TransactingCapability;

    #[proptest(cases = 24)]
    fn roundtrip_preserves_coins_and_progress(
        #[strategy(vec(1u128..10_000, 0..8))] values: Vec<u128>,
        #[strategy(0u128..5_000)] amount: u128,
    ) {
        let coins: Vec<_> = values.iter().map(|v| (TokenType::native(), *v)).collect();
        let mut state = funded_state(&coins);
        state.progress = state.progress.with_indexer_progress(40, 38, 20).with_applied_index(19);

        // book something, if possible, so pending sets are non-empty
        let capability = TransactingCapability::new(
            crate::protocol::ledger::FeeSchedule::zero(),
            CoinSelectionPolicy::SmallestFirst,
            Network::Undeployed,
        );
        let own = state.address_bech32m().unwrap();
        if let Ok((_, booked)) =
            capability.make_transfer(&state, &[TokenTransfer::new(TokenType::native(), amount.max(1), own)])
        {
            state = booked;
        }

        let serialized = StateSerializer.serialize(&state).unwrap();
        let restored = StateSerializer
            .deserialize(SecretKeys::from_seed(TEST_SEED), &serialized)
            .unwrap();

        prop_assert_eq!(state.available_balances(), restored.available_balances());
        prop_assert_eq!(state.pending_balances(), restored.pending_balances());
        prop_assert_eq!(state.booked_coins(), restored.booked_coins());
        prop_assert_eq!(state.progress().applied_index(), restored.progress().applied_index());
        prop_assert_eq!(state.progress().highest_index(), restored.progress().highest_index());
        prop_assert_eq!(state.commitment_tree(), restored.commitment_tree());
        prop_assert_eq!(state.protocol_version(), restored.protocol_version());
    }

    #[test]
    fn restored_state_is_disconnected() {
        let mut state = funded_state(&[(TokenType::native(), 3)]);
        state.progress = state.progress.with_indexer_progress(1, 1, 0);
        assert!(state.progress().is_connected());

        let serialized = StateSerializer.serialize(&state).unwrap();
        let restored = StateSerializer
            .deserialize(SecretKeys::from_seed(TEST_SEED), &serialized)
            .unwrap();
        assert!(!restored.progress().is_connected());
    }

    #[test]
    fn foreign_keys_are_rejected() {
        let serialized = StateSerializer
            .serialize(&funded_state(&[(TokenType::native(), 3)]))
            .unwrap();
        assert_eq!(
            Err(SerializationError::KeyMismatch),
            StateSerializer.deserialize(SecretKeys::from_seed([42u8; 32]), &serialized)
        );
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            StateSerializer.deserialize(SecretKeys::from_seed(TEST_SEED), "zz"),
            Err(SerializationError::Decode(_))
        ));
    }
}
