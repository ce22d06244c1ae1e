use crate::protocol::ledger::address::AddressError;
use crate::protocol::ledger::notification::NotificationError;
use crate::protocol::ledger::transaction::TransactionError;
use crate::protocol::ledger::TokenType;
use crate::runtime::RuntimeError;

/// errors building, balancing or reverting a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// the wallet's available coins cannot cover `amount` more of
    /// `token_type`.  The caller may retry with a smaller amount or after
    /// more funds arrive.
    #[error("insufficient funds: {amount} more of token {token_type} needed")]
    InsufficientFunds { token_type: TokenType, amount: u128 },

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// an internal invariant was violated.
    #[error("wallet error: {0}")]
    Other(String),
}

impl From<TransactionError> for WalletError {
    fn from(e: TransactionError) -> Self {
        Self::Other(e.to_string())
    }
}

impl From<NotificationError> for WalletError {
    fn from(e: NotificationError) -> Self {
        Self::Other(e.to_string())
    }
}
