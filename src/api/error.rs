//! errors returned by the wallet facade.

use crate::runtime::RuntimeError;
use crate::services::proving::ProvingError;
use crate::services::serialization::SerializationError;
use crate::services::submission::SubmissionError;
use crate::transacting::WalletError;

/// every error a [Wallet](super::wallet::Wallet) operation can return.
///
/// per-call errors (funds, addresses, proving, submission) are returned as
/// they are and never retried.  A [WalletApiError::Runtime] means the
/// runtime itself has failed and the wallet must be started again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum WalletApiError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Proving(#[from] ProvingError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("wallet state stream ended")]
    StreamEnded,
}

impl WalletApiError {
    /// whether the error is a shortfall the caller can fix by sending less
    /// or waiting for funds.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            Self::Wallet(WalletError::InsufficientFunds { .. })
        )
    }
}
