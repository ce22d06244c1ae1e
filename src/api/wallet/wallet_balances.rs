// private module.  no need for module docs.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::state::wallet::Balances;
use crate::state::WalletState;

/// the three per-token balances of a wallet.
///
/// `available` coins can be spent now; coins booked as inputs of an
/// unconfirmed transaction are not available.  `pending` coins are change
/// or incoming coins of an unconfirmed transaction.  `total` is the sum of
/// both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalances {
    pub available: Balances,
    pub pending: Balances,
    pub total: Balances,
}

impl WalletBalances {
    pub(super) fn from_state(state: &WalletState) -> Self {
        Self {
            available: state.available_balances(),
            pending: state.pending_balances(),
            total: state.total_balances(),
        }
    }
}

impl fmt::Display for WalletBalances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (token, total) in &self.total {
            writeln!(
                f,
                "{}  -- total: {}, available: {}, pending: {}",
                token,
                total,
                self.available.get(token).copied().unwrap_or(0),
                self.pending.get(token).copied().unwrap_or(0),
            )?;
        }
        Ok(())
    }
}
