use std::collections::BTreeMap;

use super::sync_progress::SyncProgress;
use super::transaction_history::HistoryEntry;
use super::transaction_history::TransactionHistory;
use crate::application::config::Network;
use crate::protocol::ledger::imbalances::Imbalances;
use crate::protocol::ledger::transaction::Offer;
use crate::protocol::ledger::ApplyStage;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::CommitmentTree;
use crate::protocol::ledger::Nonce;
use crate::protocol::ledger::PublicKeys;
use crate::protocol::ledger::QualifiedCoinInfo;
use crate::protocol::ledger::SecretKeys;
use crate::protocol::ledger::Transaction;
use crate::protocol::ProtocolVersion;

/// everything a wallet knows, as of one point in time.
///
/// invariants:
///  * `pending_spends` is a subset of `coins`; a coin is available iff it is
///    in `coins` but not in `pending_spends`.
///  * no nonce is in both `coins` and `pending_outputs`.
///  * balances are never stored; they are summed from the sets above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletState {
    pub(crate) secret_keys: SecretKeys,
    pub(crate) public_keys: PublicKeys,
    pub(crate) network: Network,

    /// coins the wallet controls on chain, booked or not.
    pub(crate) coins: BTreeMap<Nonce, QualifiedCoinInfo>,

    /// coins booked as inputs of transactions that are not confirmed yet.
    pub(crate) pending_spends: BTreeMap<Nonce, QualifiedCoinInfo>,

    /// coins the wallet expects to receive once a pending transaction lands.
    pub(crate) pending_outputs: BTreeMap<Nonce, CoinInfo>,

    pub(crate) commitment_tree: CommitmentTree,
    pub(crate) progress: SyncProgress,
    pub(crate) transaction_history: TransactionHistory,
    pub(crate) protocol_version: ProtocolVersion,
}

impl WalletState {
    /// an empty wallet that has not synced anything yet.
    pub fn new(secret_keys: SecretKeys, network: Network) -> Self {
        Self {
            public_keys: secret_keys.public_keys(),
            secret_keys,
            network,
            coins: BTreeMap::new(),
            pending_spends: BTreeMap::new(),
            pending_outputs: BTreeMap::new(),
            commitment_tree: CommitmentTree::default(),
            progress: SyncProgress::default(),
            transaction_history: TransactionHistory::default(),
            protocol_version: ProtocolVersion::GENESIS,
        }
    }

    pub(crate) fn secret_keys(&self) -> &SecretKeys {
        &self.secret_keys
    }

    pub fn public_keys(&self) -> &PublicKeys {
        &self.public_keys
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn with_protocol_version(mut self, protocol_version: ProtocolVersion) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    pub fn progress(&self) -> SyncProgress {
        self.progress
    }

    pub fn transaction_history(&self) -> &TransactionHistory {
        &self.transaction_history
    }

    pub fn commitment_tree(&self) -> &CommitmentTree {
        &self.commitment_tree
    }

    pub fn is_booked(&self, nonce: &Nonce) -> bool {
        self.pending_spends.contains_key(nonce)
    }

    /// mark coins as inputs of a pending transaction.
    pub(crate) fn book_spends<'a>(&mut self, coins: impl IntoIterator<Item = &'a QualifiedCoinInfo>) {
        for coin in coins {
            self.pending_spends.insert(coin.nonce, *coin);
        }
    }

    /// expect coins from a pending transaction.
    pub(crate) fn watch_outputs<'a>(&mut self, coins: impl IntoIterator<Item = &'a CoinInfo>) {
        for coin in coins {
            if !self.coins.contains_key(&coin.nonce) {
                self.pending_outputs.insert(coin.nonce, *coin);
            }
        }
    }

    pub(crate) fn release_spend(&mut self, nonce: &Nonce) -> bool {
        self.pending_spends.remove(nonce).is_some()
    }

    pub(crate) fn release_output(&mut self, nonce: &Nonce) -> bool {
        self.pending_outputs.remove(nonce).is_some()
    }

    /// apply the effects of a ledger transaction: spent coins disappear,
    /// received coins appear, the commitment tree grows.  Only the segments
    /// that the ledger applied are considered.
    ///
    /// returns the effect on this wallet's balances.
    pub(crate) fn apply_transaction(&mut self, transaction: &Transaction, stage: ApplyStage) -> Imbalances {
        let mut net_effect = Imbalances::new();

        let applied: Vec<&Offer> = std::iter::once(&transaction.guaranteed)
            .filter(|_| stage.guaranteed_applied())
            .chain(transaction.fallible.as_ref().filter(|_| stage.fallible_applied()))
            .collect();

        let by_nullifier: BTreeMap<_, _> = self
            .coins
            .values()
            .map(|c| (c.coin().nullifier(self.secret_keys.coin_secret_key()), c.nonce))
            .collect();

        for offer in applied {
            for input in offer.inputs() {
                if let Some(nonce) = by_nullifier.get(&input.nullifier) {
                    if let Some(spent) = self.coins.remove(nonce) {
                        self.pending_spends.remove(nonce);
                        net_effect.add(spent.token_type, signed(spent.value).saturating_neg());
                    }
                }
            }

            for output in offer.outputs() {
                let mt_index = self.commitment_tree.append(&output.commitment);
                let Some(coin) = output
                    .notification
                    .try_decrypt(self.secret_keys.encryption_secret_key())
                else {
                    continue;
                };
                if coin.commitment(&self.public_keys.coin_public_key) != output.commitment {
                    tracing::warn!("ignoring notification that does not match its commitment");
                    continue;
                }
                self.pending_outputs.remove(&coin.nonce);
                self.coins.insert(coin.nonce, coin.qualify(mt_index));
                net_effect.add(coin.token_type, signed(coin.value));
            }
        }

        net_effect
    }

    pub(crate) fn record_history(&mut self, entry: HistoryEntry) {
        self.transaction_history.push(entry);
    }
}

fn signed(value: u128) -> i128 {
    i128::try_from(value).unwrap_or(i128::MAX)
}
