use std::collections::HashSet;

use tokio::sync::broadcast;

use crate::application::locks::tokio::AtomicRw;
use crate::protocol::ledger::domain_hash;
use crate::protocol::ledger::transaction::BlockHash;
use crate::protocol::ledger::transaction::Output;
use crate::protocol::ledger::ApplyStage;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::CommitmentTree;
use crate::protocol::ledger::FeeSchedule;
use crate::protocol::ledger::Nullifier;
use crate::protocol::ledger::Offer;
use crate::protocol::ledger::ProofState;
use crate::protocol::ledger::ShieldedAddress;
use crate::protocol::ledger::TokenType;
use crate::protocol::ledger::Transaction;
use crate::protocol::ledger::TransactionImbalances;
use crate::protocol::ProtocolVersion;

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("transaction has not been proven")]
    Unproven,

    #[error("transaction is not balanced: {0}")]
    Unbalanced(String),

    #[error("transaction neither spends nor creates coins")]
    Empty,

    #[error("protocol version {requested} does not follow {current}")]
    VersionRegression {
        current: ProtocolVersion,
        requested: ProtocolVersion,
    },

    #[error("could not create output: {0}")]
    Output(String),
}

/// one transaction as the chain recorded it.  Every transaction gets a
/// block of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// position in the ledger, starting at 1.
    pub index: u64,
    pub block_height: u64,
    pub block_hash: BlockHash,
    pub transaction: Transaction,
    pub stage: ApplyStage,
    pub protocol_version: ProtocolVersion,

    /// the commitment tree right before and right after the applied
    /// outputs of this transaction.
    pub tree_before: CommitmentTree,
    pub tree_after: CommitmentTree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Applied(LedgerEntry),
    ProtocolUpgrade { version: ProtocolVersion, tip: u64 },
}

#[derive(Debug)]
struct LedgerState {
    fees: FeeSchedule,
    protocol_version: ProtocolVersion,
    nullifiers: HashSet<Nullifier>,
    tree: CommitmentTree,
    entries: Vec<LedgerEntry>,
}

impl LedgerState {
    fn tip(&self) -> u64 {
        self.entries.len() as u64
    }

    /// check well-formedness and decide which segments apply.
    fn classify(&self, transaction: &Transaction) -> Result<ApplyStage, LedgerError> {
        if transaction.proof == ProofState::Unproven {
            return Err(LedgerError::Unproven);
        }
        if transaction.num_inputs() == 0 && transaction.num_outputs() == 0 {
            return Err(LedgerError::Empty);
        }

        let imbalances = TransactionImbalances::of(transaction, &self.fees);
        for (segment, imbalance) in [
            ("guaranteed", &imbalances.guaranteed),
            ("fallible", &imbalances.fallible),
        ] {
            if let Some((token, amount)) = imbalance.iter().find(|(_, amount)| **amount < 0) {
                return Err(LedgerError::Unbalanced(format!(
                    "{} segment is short {} of token {}",
                    segment,
                    amount.unsigned_abs(),
                    token
                )));
            }
        }

        let mut spent = HashSet::new();
        let guaranteed_ok = transaction
            .guaranteed
            .inputs()
            .iter()
            .all(|i| !self.nullifiers.contains(&i.nullifier) && spent.insert(i.nullifier));
        if !guaranteed_ok {
            return Ok(ApplyStage::Failure);
        }

        let fallible_ok = transaction.fallible.as_ref().map_or(true, |offer| {
            offer
                .inputs()
                .iter()
                .all(|i| !self.nullifiers.contains(&i.nullifier) && spent.insert(i.nullifier))
        });
        Ok(if fallible_ok {
            ApplyStage::Success
        } else {
            ApplyStage::PartialSuccess
        })
    }

    fn record(&mut self, transaction: Transaction, stage: ApplyStage) -> LedgerEntry {
        let tree_before = self.tree;

        let applied = std::iter::once(&transaction.guaranteed)
            .filter(|_| stage.guaranteed_applied())
            .chain(transaction.fallible.as_ref().filter(|_| stage.fallible_applied()));
        for offer in applied {
            for input in offer.inputs() {
                self.nullifiers.insert(input.nullifier);
            }
            for output in offer.outputs() {
                self.tree.append(&output.commitment);
            }
        }

        let index = self.tip() + 1;
        let tx_hash = transaction.hash();
        let entry = LedgerEntry {
            index,
            block_height: index,
            block_hash: BlockHash::from_bytes(domain_hash(
                "block-hash",
                &[&index.to_le_bytes(), tx_hash.as_bytes()],
            )),
            transaction,
            stage,
            protocol_version: self.protocol_version,
            tree_before,
            tree_after: self.tree,
        };
        self.entries.push(entry.clone());
        entry
    }
}

/// an in-memory chain.
///
/// Clones share the same chain.  Transactions are applied one per block, in
/// the order they arrive.
#[derive(Debug, Clone)]
pub struct LedgerSimulator {
    state: AtomicRw<LedgerState>,
    events: broadcast::Sender<LedgerEvent>,
}

impl LedgerSimulator {
    pub fn new(fees: FeeSchedule) -> Self {
        let state = LedgerState {
            fees,
            protocol_version: ProtocolVersion::GENESIS,
            nullifiers: HashSet::new(),
            tree: CommitmentTree::default(),
            entries: vec![],
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: AtomicRw::from((state, Some("ledger-simulator"), None)),
            events,
        }
    }

    pub async fn fees(&self) -> FeeSchedule {
        self.state.lock(|s| s.fees).await
    }

    pub async fn protocol_version(&self) -> ProtocolVersion {
        self.state.lock(|s| s.protocol_version).await
    }

    /// index of the last recorded transaction, 0 for an empty chain.
    pub async fn tip(&self) -> u64 {
        self.state.lock(|s| s.tip()).await
    }

    pub async fn entry(&self, index: u64) -> Option<LedgerEntry> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.state.lock(|s| s.entries.get(position).cloned()).await
    }

    pub async fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.state.lock(|s| s.nullifiers.contains(nullifier)).await
    }

    /// recorded entries plus a receiver for everything recorded afterwards.
    /// Nothing is missed or seen twice between the two.
    pub async fn subscribe(&self) -> (Vec<LedgerEntry>, broadcast::Receiver<LedgerEvent>) {
        let events = self.events.clone();
        self.state
            .lock(|s| (s.entries.clone(), events.subscribe()))
            .await
    }

    /// record a transaction.  Malformed transactions are rejected and leave
    /// no trace; double spends are recorded as (partial) failures.
    pub async fn apply_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<LedgerEntry, LedgerError> {
        let events = self.events.clone();
        let mut state = self.state.clone();
        let entry = state
            .lock_mut(|s| {
                let stage = s.classify(transaction)?;
                let entry = s.record(transaction.clone(), stage);
                let _ = events.send(LedgerEvent::Applied(entry.clone()));
                Ok::<_, LedgerError>(entry)
            })
            .await?;

        tracing::debug!(
            "ledger recorded transaction {} at {} ({})",
            entry.transaction.hash(),
            entry.index,
            entry.stage
        );
        Ok(entry)
    }

    /// create coins out of nothing for `recipient`.
    pub async fn mint(
        &self,
        recipient: &ShieldedAddress,
        coins: &[(TokenType, u128)],
    ) -> Result<LedgerEntry, LedgerError> {
        let outputs = coins
            .iter()
            .map(|(token, value)| {
                Output::create(&CoinInfo::new(*token, *value), recipient)
                    .map_err(|e| LedgerError::Output(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if outputs.is_empty() {
            return Err(LedgerError::Empty);
        }
        let offer = Offer::new(vec![], outputs).map_err(|e| LedgerError::Output(e.to_string()))?;
        let transaction = Transaction::new(offer, None).erase_proofs();

        let events = self.events.clone();
        let mut state = self.state.clone();
        let entry = state
            .lock_mut(|s| {
                let entry = s.record(transaction, ApplyStage::Success);
                let _ = events.send(LedgerEvent::Applied(entry.clone()));
                entry
            })
            .await;
        tracing::debug!("ledger minted {} coins at {}", coins.len(), entry.index);
        Ok(entry)
    }

    /// move the chain to a newer protocol version.
    pub async fn upgrade_protocol(&self, version: ProtocolVersion) -> Result<(), LedgerError> {
        let events = self.events.clone();
        let mut state = self.state.clone();
        state
            .lock_mut(|s| {
                if version <= s.protocol_version {
                    return Err(LedgerError::VersionRegression {
                        current: s.protocol_version,
                        requested: version,
                    });
                }
                s.protocol_version = version;
                let _ = events.send(LedgerEvent::ProtocolUpgrade {
                    version,
                    tip: s.tip(),
                });
                Ok(())
            })
            .await?;
        tracing::info!("ledger upgraded to protocol version {}", version);
        Ok(())
    }

    /// change the fee schedule, as a protocol upgrade would.
    pub async fn set_fees(&self, fees: FeeSchedule) {
        let mut state = self.state.clone();
        state.lock_mut(|s| s.fees = fees).await;
    }
}
