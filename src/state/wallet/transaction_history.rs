// private module.  no need for module docs.

use serde::Deserialize;
use serde::Serialize;

use crate::protocol::ledger::imbalances::Imbalances;
use crate::protocol::ledger::ApplyStage;
use crate::protocol::ledger::TransactionHash;
use crate::protocol::ProtocolVersion;

/// a transaction the wallet observed on chain that affected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub hash: TransactionHash,

    /// indexer offset the transaction was delivered at.
    pub offset: u64,

    pub stage: ApplyStage,
    pub protocol_version: ProtocolVersion,

    /// what the transaction did to the wallet's balances: received minus
    /// spent, per token.
    pub net_effect: Imbalances,
}

/// append-only, in the order transactions were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHistory(Vec<HistoryEntry>);

impl TransactionHistory {
    pub fn push(&mut self, entry: HistoryEntry) {
        self.0.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }

    pub fn find(&self, hash: &TransactionHash) -> Option<&HistoryEntry> {
        self.0.iter().find(|e| e.hash == *hash)
    }
}
