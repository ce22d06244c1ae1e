use serde::Deserialize;
use serde::Serialize;

use crate::protocol::ledger::Transaction;

/// what still has to be proven before a transaction can be submitted.
///
/// Returned by the balancing operations and consumed by the proving
/// service.  Until it is proven, a recipe can be reverted, which releases
/// every coin it booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
pub enum ProvingRecipe {
    /// the transaction is final as is.
    NothingToProve(Transaction),

    /// the whole transaction needs a proof.
    TransactionToProve(Transaction),

    /// only `to_prove` needs a proof; it is then merged into the already
    /// proven `to_balance`.
    BalanceTransactionToProve {
        to_prove: Transaction,
        to_balance: Transaction,
    },
}

impl ProvingRecipe {
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// every transaction the recipe holds, in merge order.
    pub fn transactions(&self) -> Vec<&Transaction> {
        match self {
            Self::NothingToProve(tx) | Self::TransactionToProve(tx) => vec![tx],
            Self::BalanceTransactionToProve {
                to_prove,
                to_balance,
            } => vec![to_balance, to_prove],
        }
    }
}
