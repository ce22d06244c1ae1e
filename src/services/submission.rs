//! hands final transactions to a node and reports their lifecycle.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::protocol::ledger::transaction::BlockHash;
use crate::protocol::ledger::Transaction;
use crate::protocol::ledger::TransactionHash;

/// lifecycle stages of a submitted transaction, in the order they occur.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum SubmissionStage {
    Submitted,
    InBlock,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionEvent {
    Submitted {
        tx_hash: TransactionHash,
    },
    InBlock {
        tx_hash: TransactionHash,
        block_hash: BlockHash,
        block_height: u64,
    },
    Finalized {
        tx_hash: TransactionHash,
        block_hash: BlockHash,
        block_height: u64,
    },
}

impl SubmissionEvent {
    pub fn stage(&self) -> SubmissionStage {
        match self {
            Self::Submitted { .. } => SubmissionStage::Submitted,
            Self::InBlock { .. } => SubmissionStage::InBlock,
            Self::Finalized { .. } => SubmissionStage::Finalized,
        }
    }

    pub fn tx_hash(&self) -> TransactionHash {
        match self {
            Self::Submitted { tx_hash }
            | Self::InBlock { tx_hash, .. }
            | Self::Finalized { tx_hash, .. } => *tx_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("node unreachable: {0}")]
    Transport(String),

    #[error("could not serialize transaction: {0}")]
    Serialization(String),

    #[error("ledger rejected transaction: {0}")]
    Rejected(String),

    #[error("submission service is closed")]
    Closed,
}

/// what a node reports once the requested stage is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReceipt {
    pub tx_hash: TransactionHash,
    pub block_hash: Option<BlockHash>,
    pub block_height: Option<u64>,
}

/// client of a chain node.
#[async_trait]
pub trait NodeClient: Send + Sync + fmt::Debug {
    /// send a serialized transaction and resolve once `wait_for` is reached.
    async fn send_transaction_and_wait(
        &self,
        transaction: Vec<u8>,
        wait_for: SubmissionStage,
    ) -> Result<NodeReceipt, SubmissionError>;

    async fn disconnect(&self);
}

#[async_trait]
pub trait SubmissionService: Send + Sync + fmt::Debug {
    /// submit and wait until `wait_for` is observed.  Reverting the
    /// wallet's bookings after a failure is up to the caller.
    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        wait_for: SubmissionStage,
    ) -> Result<SubmissionEvent, SubmissionError>;

    /// release the underlying connection.  Idempotent.
    async fn close(&self);
}

/// submits through a [NodeClient].
#[derive(Debug)]
pub struct NodeSubmission {
    client: Arc<dyn NodeClient>,
    closed: AtomicBool,
}

impl NodeSubmission {
    pub fn new(client: Arc<dyn NodeClient>) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    fn event_from_receipt(
        receipt: NodeReceipt,
        wait_for: SubmissionStage,
    ) -> Result<SubmissionEvent, SubmissionError> {
        let tx_hash = receipt.tx_hash;
        if wait_for == SubmissionStage::Submitted {
            return Ok(SubmissionEvent::Submitted { tx_hash });
        }

        let (Some(block_hash), Some(block_height)) = (receipt.block_hash, receipt.block_height)
        else {
            return Err(SubmissionError::Transport(format!(
                "node reported no block for transaction {} at stage {}",
                tx_hash, wait_for
            )));
        };
        Ok(match wait_for {
            SubmissionStage::Finalized => SubmissionEvent::Finalized {
                tx_hash,
                block_hash,
                block_height,
            },
            SubmissionStage::Submitted | SubmissionStage::InBlock => SubmissionEvent::InBlock {
                tx_hash,
                block_hash,
                block_height,
            },
        })
    }
}

#[async_trait]
impl SubmissionService for NodeSubmission {
    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        wait_for: SubmissionStage,
    ) -> Result<SubmissionEvent, SubmissionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubmissionError::Closed);
        }
        let bytes = transaction
            .to_bytes()
            .map_err(|e| SubmissionError::Serialization(e.to_string()))?;

        tracing::info!(
            "submitting transaction {} (waiting for {})",
            transaction.hash(),
            wait_for
        );
        let receipt = self.client.send_transaction_and_wait(bytes, wait_for).await?;
        let event = Self::event_from_receipt(receipt, wait_for)?;
        tracing::info!("transaction {} reached {}", event.tx_hash(), event.stage());
        Ok(event)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.client.disconnect().await;
            tracing::debug!("node submission closed");
        }
    }
}
