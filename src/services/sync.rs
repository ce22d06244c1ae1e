//! folds indexer updates into wallet state.
//!
//! [apply_update] is a pure function; everything stateful (the session, the
//! stream) lives in [SyncSession], which is owned by exactly one background
//! task of a running variant.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use super::indexer::IndexerClient;
use super::indexer::IndexerError;
use super::indexer::RawUpdate;
use super::indexer::SessionId;
use crate::application::config::Network;
use crate::protocol::ledger::address::encode_viewing_key;
use crate::protocol::ledger::commitment_tree::TreeError;
use crate::protocol::ledger::ApplyStage;
use crate::protocol::ledger::CollapsedUpdate;
use crate::protocol::ledger::Transaction;
use crate::protocol::ProtocolVersion;
use crate::state::wallet::HistoryEntry;
use crate::state::WalletState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error("could not decode update at index {index}: {reason}")]
    Decode { index: u64, reason: String },

    #[error("could not derive viewing key: {0}")]
    ViewingKey(String),

    #[error("commitment tree update rejected: {0}")]
    Tree(#[from] TreeError),

    #[error("indexer subscription ended unexpectedly")]
    SubscriptionEnded,
}

/// a decoded indexer update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    Progress {
        highest_index: u64,
        highest_relevant_index: u64,
        highest_relevant_wallet_index: u64,
        protocol_version: ProtocolVersion,
    },
    MerkleTree {
        index: u64,
        update: CollapsedUpdate,
        protocol_version: ProtocolVersion,
    },
    Transaction {
        offset: u64,
        transaction: Transaction,
        stage: ApplyStage,
        protocol_version: ProtocolVersion,
    },
}

impl SyncUpdate {
    pub fn protocol_version(&self) -> ProtocolVersion {
        match self {
            Self::Progress {
                protocol_version, ..
            }
            | Self::MerkleTree {
                protocol_version, ..
            }
            | Self::Transaction {
                protocol_version, ..
            } => *protocol_version,
        }
    }

    pub fn decode(raw: RawUpdate) -> Result<Self, SyncError> {
        Ok(match raw {
            RawUpdate::Progress {
                highest_index,
                highest_relevant_index,
                highest_relevant_wallet_index,
                protocol_version,
            } => Self::Progress {
                highest_index,
                highest_relevant_index,
                highest_relevant_wallet_index,
                protocol_version,
            },
            RawUpdate::MerkleTree {
                index,
                update,
                protocol_version,
            } => Self::MerkleTree {
                index,
                update,
                protocol_version,
            },
            RawUpdate::Transaction {
                offset,
                transaction,
                stage,
                protocol_version,
            } => Self::Transaction {
                offset,
                transaction: Transaction::from_bytes(&transaction).map_err(|e| {
                    SyncError::Decode {
                        index: offset,
                        reason: e.to_string(),
                    }
                })?,
                stage,
                protocol_version,
            },
        })
    }
}

/// the applied index after a transaction update at `offset`.
///
/// a failed transaction leaves the applied index at `offset`; a (partially)
/// successful one at `offset - 1`, since the next scan position begins after
/// it.  Getting this wrong re-applies or skips the next update.
pub fn applied_index_after(offset: u64, stage: ApplyStage) -> Option<u64> {
    match stage {
        ApplyStage::Failure => Some(offset),
        ApplyStage::Success | ApplyStage::PartialSuccess => offset.checked_sub(1),
    }
}

/// fold one update into a state.
pub fn apply_update(mut state: WalletState, update: &SyncUpdate) -> Result<WalletState, SyncError> {
    match update {
        SyncUpdate::Progress {
            highest_index,
            highest_relevant_index,
            highest_relevant_wallet_index,
            ..
        } => {
            state.progress = state.progress.with_indexer_progress(
                *highest_index,
                *highest_relevant_index,
                *highest_relevant_wallet_index,
            );
        }
        SyncUpdate::MerkleTree { update, .. } => {
            state.commitment_tree.merge(update)?;
        }
        SyncUpdate::Transaction {
            offset,
            transaction,
            stage,
            protocol_version,
        } => {
            let net_effect = state.apply_transaction(transaction, *stage);
            if let Some(applied) = applied_index_after(*offset, *stage) {
                state.progress = state.progress.with_applied_index(applied);
            }
            state.record_history(HistoryEntry {
                hash: transaction.hash(),
                offset: *offset,
                stage: *stage,
                protocol_version: *protocol_version,
                net_effect,
            });
        }
    }

    if update.protocol_version() > state.protocol_version {
        state.protocol_version = update.protocol_version();
    }
    Ok(state)
}

/// opens indexer subscriptions for a wallet.
#[derive(Debug, Clone)]
pub struct SyncService {
    indexer: Arc<dyn IndexerClient>,
    network: Network,
}

impl SyncService {
    pub fn new(indexer: Arc<dyn IndexerClient>, network: Network) -> Self {
        Self { indexer, network }
    }

    /// subscribe to updates for `state`, resuming after its applied index.
    pub async fn updates(&self, state: &WalletState) -> Result<SyncSession, SyncError> {
        let viewing_key = encode_viewing_key(state.secret_keys().encryption_secret_key(), self.network)
            .map_err(|e| SyncError::ViewingKey(e.to_string()))?;

        let session = self.indexer.connect(&viewing_key).await?;
        let from = state.progress().resume_from();
        let raw = self.indexer.subscribe(&session, from).await?;

        tracing::debug!("opened sync session {} from index {:?}", session, from);

        Ok(SyncSession {
            indexer: self.indexer.clone(),
            session,
            updates: raw
                .map(|item| item.map_err(SyncError::from).and_then(SyncUpdate::decode))
                .boxed(),
        })
    }
}

/// one open indexer subscription.
pub struct SyncSession {
    indexer: Arc<dyn IndexerClient>,
    session: SessionId,
    updates: BoxStream<'static, Result<SyncUpdate, SyncError>>,
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SyncSession {
    pub async fn next(&mut self) -> Option<Result<SyncUpdate, SyncError>> {
        self.updates.next().await
    }

    /// end the subscription and release the session.
    pub async fn close(self) {
        drop(self.updates);
        match self.indexer.disconnect(&self.session).await {
            Ok(()) => tracing::debug!("closed sync session {}", self.session),
            Err(e) => tracing::warn!("could not close sync session {}: {}", self.session, e),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use proptest::prop_assert_eq;
    use test_strategy::proptest;

    use super::*;
    use crate::protocol::ledger::transaction::Offer;
    use crate::protocol::ledger::transaction::Output;
    use crate::protocol::ledger::CoinInfo;
    use crate::protocol::ledger::TokenType;
    use crate::tests::shared::empty_state;

    fn incoming(state: &WalletState, value: u128) -> Transaction {
        let output = Output::create(
            &CoinInfo::new(TokenType::native(), value),
            &state.address(),
        )
        .unwrap();
        Transaction::new(Offer::new(vec![], vec![output]).unwrap(), None)
    }

    #[test]
    fn failure_keeps_offset_success_steps_back() {
        assert_eq!(Some(7), applied_index_after(7, ApplyStage::Failure));
        assert_eq!(Some(6), applied_index_after(7, ApplyStage::Success));
        assert_eq!(Some(6), applied_index_after(7, ApplyStage::PartialSuccess));
        assert_eq!(None, applied_index_after(0, ApplyStage::Success));
    }

    #[proptest]
    fn index_arithmetic(offset: u64) {
        prop_assert_eq!(Some(offset), applied_index_after(offset, ApplyStage::Failure));
        prop_assert_eq!(offset.checked_sub(1), applied_index_after(offset, ApplyStage::Success));
        prop_assert_eq!(
            offset.checked_sub(1),
            applied_index_after(offset, ApplyStage::PartialSuccess)
        );
    }

    #[test]
    fn transaction_update_credits_and_records_history() {
        let state = empty_state();
        let tx = incoming(&state, 25);
        let update = SyncUpdate::Transaction {
            offset: 4,
            transaction: tx.clone(),
            stage: ApplyStage::Success,
            protocol_version: ProtocolVersion::new(3),
        };

        let state = apply_update(state, &update).unwrap();
        assert_eq!(25, state.available_balance(&TokenType::native()));
        assert_eq!(Some(3), state.progress().applied_index());
        assert_eq!(ProtocolVersion::new(3), state.protocol_version());
        assert_eq!(Some(tx.hash()), state.transaction_history().last().map(|e| e.hash));
    }

    #[test]
    fn failed_update_advances_index_without_credit() {
        let state = empty_state();
        let tx = incoming(&state, 25);
        let update = SyncUpdate::Transaction {
            offset: 4,
            transaction: tx,
            stage: ApplyStage::Failure,
            protocol_version: ProtocolVersion::GENESIS,
        };

        let state = apply_update(state, &update).unwrap();
        assert_eq!(0, state.available_balance(&TokenType::native()));
        assert_eq!(Some(4), state.progress().applied_index());
        assert_eq!(1, state.transaction_history().len());
    }

    #[test]
    fn older_protocol_version_does_not_regress_state() {
        let state = empty_state().with_protocol_version(ProtocolVersion::new(5));
        let update = SyncUpdate::Progress {
            highest_index: 1,
            highest_relevant_index: 1,
            highest_relevant_wallet_index: 0,
            protocol_version: ProtocolVersion::new(2),
        };
        let state = apply_update(state, &update).unwrap();
        assert_eq!(ProtocolVersion::new(5), state.protocol_version());
        assert!(state.progress().is_connected());
    }

    #[test]
    fn undecodable_transaction_is_a_decode_error() {
        let raw = RawUpdate::Transaction {
            offset: 2,
            transaction: vec![0xff; 3],
            stage: ApplyStage::Success,
            protocol_version: ProtocolVersion::GENESIS,
        };
        assert!(matches!(
            SyncUpdate::decode(raw),
            Err(SyncError::Decode { index: 2, .. })
        ));
    }

    #[test]
    fn gap_in_tree_updates_is_an_error() {
        let update = SyncUpdate::MerkleTree {
            index: 1,
            update: CollapsedUpdate {
                start: 3,
                end: 4,
                root: crate::protocol::ledger::commitment_tree::TreeRoot::from_bytes([1u8; 32]),
            },
            protocol_version: ProtocolVersion::GENESIS,
        };
        assert!(matches!(
            apply_update(empty_state(), &update),
            Err(SyncError::Tree(_))
        ));
    }
}
