//! ordering and picking of coins to spend.

use serde::Deserialize;
use serde::Serialize;

use crate::protocol::ledger::QualifiedCoinInfo;
use crate::protocol::ledger::TokenType;

/// the order in which available coins are considered as inputs.
///
/// Ties are broken by nonce so that selection is deterministic for a given
/// wallet state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[cfg_attr(any(test, feature = "arbitrary-impls"), derive(arbitrary::Arbitrary))]
pub enum CoinSelectionPolicy {
    /// spend small coins first, consolidating dust.
    #[default]
    SmallestFirst,

    /// spend large coins first, minimizing the number of inputs.
    LargestFirst,

    /// spend coins in the order they entered the commitment tree.
    OldestFirst,
}

impl CoinSelectionPolicy {
    pub fn sort(&self, coins: &mut [QualifiedCoinInfo]) {
        match self {
            Self::SmallestFirst => coins.sort_by(|a, b| a.value.cmp(&b.value).then(a.nonce.cmp(&b.nonce))),
            Self::LargestFirst => coins.sort_by(|a, b| b.value.cmp(&a.value).then(a.nonce.cmp(&b.nonce))),
            Self::OldestFirst => {
                coins.sort_by(|a, b| a.mt_index.cmp(&b.mt_index).then(a.nonce.cmp(&b.nonce)))
            }
        }
    }
}

/// the coins still available for selection during one balancing run, in
/// policy order.
#[derive(Debug, Clone)]
pub struct CoinPool {
    coins: Vec<QualifiedCoinInfo>,
}

impl CoinPool {
    pub fn new(mut coins: Vec<QualifiedCoinInfo>, policy: CoinSelectionPolicy) -> Self {
        policy.sort(&mut coins);
        Self { coins }
    }

    /// remove and return the first coin of `token_type` matching `accept`.
    pub fn take_first(
        &mut self,
        token_type: &TokenType,
        accept: impl Fn(&QualifiedCoinInfo) -> bool,
    ) -> Option<QualifiedCoinInfo> {
        let position = self
            .coins
            .iter()
            .position(|c| c.token_type == *token_type && accept(c))?;
        Some(self.coins.remove(position))
    }

    pub fn take(&mut self, token_type: &TokenType) -> Option<QualifiedCoinInfo> {
        self.take_first(token_type, |_| true)
    }

    /// sum of all remaining coins of `token_type`.
    pub fn balance(&self, token_type: &TokenType) -> u128 {
        self.coins
            .iter()
            .filter(|c| c.token_type == *token_type)
            .fold(0u128, |acc, c| acc.saturating_add(c.value))
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}
