//! read-only projections of coins and balances.

use std::collections::BTreeMap;

use super::wallet_state::WalletState;
use crate::protocol::ledger::CoinCommitment;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::Nullifier;
use crate::protocol::ledger::QualifiedCoinInfo;
use crate::protocol::ledger::TokenType;

/// summed coin values per token.
pub type Balances = BTreeMap<TokenType, u128>;

/// an unbooked coin the wallet can spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableCoin {
    pub coin: QualifiedCoinInfo,
    pub commitment: CoinCommitment,
    pub nullifier: Nullifier,
}

/// a coin the wallet expects to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCoin {
    pub coin: CoinInfo,
    pub commitment: CoinCommitment,
    pub nullifier: Nullifier,
}

fn sum_by_token(coins: impl Iterator<Item = (TokenType, u128)>) -> Balances {
    let mut balances = Balances::new();
    for (token, value) in coins {
        let entry = balances.entry(token).or_default();
        *entry = entry.saturating_add(value);
    }
    balances
}

impl WalletState {
    pub fn available_coins(&self) -> Vec<AvailableCoin> {
        let cpk = &self.public_keys.coin_public_key;
        let csk = self.secret_keys.coin_secret_key();
        self.coins
            .values()
            .filter(|c| !self.pending_spends.contains_key(&c.nonce))
            .map(|c| AvailableCoin {
                coin: *c,
                commitment: c.coin().commitment(cpk),
                nullifier: c.coin().nullifier(csk),
            })
            .collect()
    }

    pub fn pending_coins(&self) -> Vec<PendingCoin> {
        let cpk = &self.public_keys.coin_public_key;
        let csk = self.secret_keys.coin_secret_key();
        self.pending_outputs
            .values()
            .map(|c| PendingCoin {
                coin: *c,
                commitment: c.commitment(cpk),
                nullifier: c.nullifier(csk),
            })
            .collect()
    }

    /// available coins followed by pending ones.
    pub fn total_coins(&self) -> Vec<CoinInfo> {
        self.available_coins()
            .into_iter()
            .map(|c| c.coin.coin())
            .chain(self.pending_outputs.values().copied())
            .collect()
    }

    /// coins booked as inputs of pending transactions.
    pub fn booked_coins(&self) -> Vec<QualifiedCoinInfo> {
        self.pending_spends.values().copied().collect()
    }

    pub fn available_balances(&self) -> Balances {
        sum_by_token(
            self.coins
                .values()
                .filter(|c| !self.pending_spends.contains_key(&c.nonce))
                .map(|c| (c.token_type, c.value)),
        )
    }

    pub fn pending_balances(&self) -> Balances {
        sum_by_token(
            self.pending_outputs
                .values()
                .map(|c| (c.token_type, c.value)),
        )
    }

    /// available merged with pending.
    pub fn total_balances(&self) -> Balances {
        let mut total = self.available_balances();
        for (token, value) in self.pending_balances() {
            let entry = total.entry(token).or_default();
            *entry = entry.saturating_add(value);
        }
        total
    }

    pub fn available_balance(&self, token_type: &TokenType) -> u128 {
        self.available_balances()
            .get(token_type)
            .copied()
            .unwrap_or(0)
    }
}
