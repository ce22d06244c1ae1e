use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use super::LedgerSimulator;
use crate::protocol::ledger::ApplyStage;
use crate::protocol::ledger::Transaction;
use crate::services::submission::SubmissionError;
use crate::services::submission::SubmissionEvent;
use crate::services::submission::SubmissionService;
use crate::services::submission::SubmissionStage;

/// submits to a [LedgerSimulator].  A transaction is final as soon as the
/// simulator records it, so every stage is reached immediately.
#[derive(Debug)]
pub struct SimulatedSubmission {
    ledger: LedgerSimulator,
    closed: AtomicBool,
}

impl SimulatedSubmission {
    pub fn new(ledger: LedgerSimulator) -> Self {
        Self {
            ledger,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SubmissionService for SimulatedSubmission {
    async fn submit_transaction(
        &self,
        transaction: &Transaction,
        wait_for: SubmissionStage,
    ) -> Result<SubmissionEvent, SubmissionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubmissionError::Closed);
        }

        let entry = self
            .ledger
            .apply_transaction(transaction)
            .await
            .map_err(|e| SubmissionError::Rejected(e.to_string()))?;
        let tx_hash = entry.transaction.hash();
        if entry.stage == ApplyStage::Failure {
            return Err(SubmissionError::Rejected(format!(
                "transaction {} failed in block {}",
                tx_hash, entry.block_height
            )));
        }

        let event = match wait_for {
            SubmissionStage::Submitted => SubmissionEvent::Submitted { tx_hash },
            SubmissionStage::InBlock => SubmissionEvent::InBlock {
                tx_hash,
                block_hash: entry.block_hash,
                block_height: entry.block_height,
            },
            SubmissionStage::Finalized => SubmissionEvent::Finalized {
                tx_hash,
                block_hash: entry.block_hash,
                block_height: entry.block_height,
            },
        };
        tracing::info!("simulated submission of {} reached {}", tx_hash, event.stage());
        Ok(event)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("simulated submission closed");
        }
    }
}
