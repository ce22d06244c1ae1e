//! turns proving recipes into final transactions.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::ledger::transaction::TransactionError;
use crate::protocol::ledger::Transaction;
use crate::protocol::ledger::TransactionHash;
use crate::transacting::ProvingRecipe;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProvingError {
    #[error("prover unreachable: {0}")]
    Transport(String),

    #[error("could not (de)serialize transaction for the prover: {0}")]
    Serialization(String),

    #[error("prover returned transaction {actual}, expected {expected}")]
    HashMismatch {
        expected: TransactionHash,
        actual: TransactionHash,
    },

    #[error("could not merge proven transaction: {0}")]
    Merge(#[from] TransactionError),
}

/// client of an external proof server.
#[async_trait]
pub trait ProverClient: Send + Sync + fmt::Debug {
    /// prove a serialized, unproven transaction.  Returns the serialized
    /// proven transaction.
    async fn prove_transaction(&self, unproven: Vec<u8>) -> Result<Vec<u8>, ProvingError>;
}

/// produces a final transaction from a recipe.
#[async_trait]
pub trait ProvingService: Send + Sync + fmt::Debug {
    async fn prove(&self, recipe: ProvingRecipe) -> Result<Transaction, ProvingError>;
}

/// proves through a [ProverClient].
///
/// For a [ProvingRecipe::BalanceTransactionToProve] only the balancing
/// part is sent to the prover; the transaction being balanced is already
/// final and is merged in afterwards.
#[derive(Debug, Clone)]
pub struct ServerProving {
    client: Arc<dyn ProverClient>,
}

impl ServerProving {
    pub fn new(client: Arc<dyn ProverClient>) -> Self {
        Self { client }
    }

    async fn prove_one(&self, transaction: &Transaction) -> Result<Transaction, ProvingError> {
        let expected = transaction.hash();
        let unproven = transaction
            .to_bytes()
            .map_err(|e| ProvingError::Serialization(e.to_string()))?;

        let proven = self.client.prove_transaction(unproven).await?;
        let proven = Transaction::from_bytes(&proven)
            .map_err(|e| ProvingError::Serialization(e.to_string()))?;

        let actual = proven.hash();
        if actual != expected {
            return Err(ProvingError::HashMismatch { expected, actual });
        }
        Ok(proven)
    }
}

#[async_trait]
impl ProvingService for ServerProving {
    async fn prove(&self, recipe: ProvingRecipe) -> Result<Transaction, ProvingError> {
        tracing::debug!("proving recipe {}", recipe.kind());
        match recipe {
            ProvingRecipe::NothingToProve(tx) => Ok(tx),
            ProvingRecipe::TransactionToProve(tx) => self.prove_one(&tx).await,
            ProvingRecipe::BalanceTransactionToProve {
                to_prove,
                to_balance,
            } => {
                let proven = self.prove_one(&to_prove).await?;
                Ok(to_balance.merge(&proven)?)
            }
        }
    }
}

/// erases proofs instead of computing them.  Transactions it produces are
/// only accepted by the ledger simulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedProving;

#[async_trait]
impl ProvingService for SimulatedProving {
    async fn prove(&self, recipe: ProvingRecipe) -> Result<Transaction, ProvingError> {
        tracing::debug!("erasing proofs of recipe {}", recipe.kind());
        match recipe {
            ProvingRecipe::NothingToProve(tx) => Ok(tx),
            ProvingRecipe::TransactionToProve(tx) => Ok(tx.erase_proofs()),
            ProvingRecipe::BalanceTransactionToProve {
                to_prove,
                to_balance,
            } => Ok(to_balance.merge(&to_prove.erase_proofs())?),
        }
    }
}
