use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

/// how far the wallet is in consuming the indexer's view of the chain.
///
/// All four counters only ever move forward.  Two gaps are derived from
/// them:
///
/// `source_gap`: how far the indexer's chain tip is ahead of what it has
/// scanned for relevance.
///
/// `apply_gap`: how far the last transaction relevant to this wallet is
/// ahead of what the wallet has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "arbitrary-impls"), derive(arbitrary::Arbitrary))]
pub struct SyncProgress {
    applied_index: Option<u64>,
    highest_relevant_wallet_index: u64,
    highest_index: u64,
    highest_relevant_index: u64,

    /// whether the current subscription has reported progress yet.  Not
    /// persisted: a restored wallet is disconnected until it hears from
    /// the indexer.
    #[serde(skip)]
    is_connected: bool,
}

impl SyncProgress {
    pub fn applied_index(&self) -> Option<u64> {
        self.applied_index
    }

    pub fn highest_relevant_wallet_index(&self) -> u64 {
        self.highest_relevant_wallet_index
    }

    pub fn highest_index(&self) -> u64 {
        self.highest_index
    }

    pub fn highest_relevant_index(&self) -> u64 {
        self.highest_relevant_index
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn source_gap(&self) -> u64 {
        self.highest_index
            .saturating_sub(self.highest_relevant_index)
    }

    pub fn apply_gap(&self) -> u64 {
        self.highest_relevant_wallet_index
            .saturating_sub(self.applied_index.unwrap_or(0))
    }

    /// connected, and both gaps within `max_gap`.
    pub fn is_synced_within(&self, max_gap: u64) -> bool {
        self.is_connected && self.source_gap() <= max_gap && self.apply_gap() <= max_gap
    }

    pub fn is_strictly_complete(&self) -> bool {
        self.is_synced_within(0)
    }

    /// the index a fresh subscription resumes from.
    pub fn resume_from(&self) -> Option<u64> {
        self.applied_index
    }

    /// record the indexer's view of the chain.  Counters never move back.
    pub fn with_indexer_progress(
        mut self,
        highest_index: u64,
        highest_relevant_index: u64,
        highest_relevant_wallet_index: u64,
    ) -> Self {
        self.highest_index = self.highest_index.max(highest_index);
        self.highest_relevant_index = self.highest_relevant_index.max(highest_relevant_index);
        self.highest_relevant_wallet_index = self
            .highest_relevant_wallet_index
            .max(highest_relevant_wallet_index);
        self.is_connected = true;
        self
    }

    pub fn with_applied_index(mut self, applied_index: u64) -> Self {
        self.applied_index = Some(self.applied_index.map_or(applied_index, |a| a.max(applied_index)));
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.is_connected = false;
        self
    }
}

impl Display for SyncProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let applied = self
            .applied_index
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "applied {} of {} (source gap: {}, apply gap: {})",
            applied,
            self.highest_index,
            self.source_gap(),
            self.apply_gap()
        )
    }
}
