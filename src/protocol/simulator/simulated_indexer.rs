use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;

use super::LedgerEntry;
use super::LedgerEvent;
use super::LedgerSimulator;
use crate::application::config::Network;
use crate::protocol::ledger::address::decode_viewing_key;
use crate::protocol::ledger::keys::EncryptionSecretKey;
use crate::protocol::ledger::CollapsedUpdate;
use crate::protocol::ledger::CommitmentTree;
use crate::protocol::ProtocolVersion;
use crate::services::indexer::IndexerClient;
use crate::services::indexer::IndexerError;
use crate::services::indexer::RawUpdate;
use crate::services::indexer::SessionId;
use crate::services::indexer::UpdateStream;

/// serves indexer sessions straight from a [LedgerSimulator].
///
/// A subscription first replays the recorded entries after its start index,
/// then follows the ledger live.  Only transactions with an output the
/// viewing key can decrypt are sent; the commitments in between reach the
/// wallet as collapsed tree updates.
#[derive(Clone)]
pub struct SimulatedIndexer {
    ledger: LedgerSimulator,
    network: Network,
    sessions: Arc<Mutex<HashMap<SessionId, EncryptionSecretKey>>>,
    next_session: Arc<AtomicU64>,
}

impl SimulatedIndexer {
    pub fn new(ledger: LedgerSimulator, network: Network) -> Self {
        Self {
            ledger,
            network,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions
            .lock()
            .expect("lock should not be poisoned")
            .len()
    }
}

// viewing keys stay out of debug output
impl std::fmt::Debug for SimulatedIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedIndexer")
            .field("network", &self.network)
            .field("open_sessions", &self.open_sessions())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IndexerClient for SimulatedIndexer {
    async fn connect(&self, viewing_key: &str) -> Result<SessionId, IndexerError> {
        let key = decode_viewing_key(viewing_key, self.network)
            .map_err(|e| IndexerError::InvalidViewingKey(e.to_string()))?;
        let session = SessionId(format!(
            "sim-{}",
            self.next_session.fetch_add(1, Ordering::SeqCst)
        ));
        self.sessions
            .lock()
            .expect("lock should not be poisoned")
            .insert(session.clone(), key);
        tracing::debug!("simulated indexer opened session {}", session);
        Ok(session)
    }

    async fn subscribe(
        &self,
        session: &SessionId,
        from_index: Option<u64>,
    ) -> Result<UpdateStream, IndexerError> {
        let key = self
            .sessions
            .lock()
            .expect("lock should not be poisoned")
            .get(session)
            .cloned()
            .ok_or_else(|| IndexerError::UnknownSession(session.clone()))?;

        let (backlog, mut live) = self.ledger.subscribe().await;
        let protocol_version = self.ledger.protocol_version().await;
        let mut scan = WalletScan::new(key, from_index, &backlog);

        let stream = async_stream::stream! {
            for entry in &backlog {
                for update in scan.entry(entry) {
                    yield Ok(update);
                }
            }
            yield Ok(scan.progress(backlog.len() as u64, protocol_version));

            loop {
                match live.recv().await {
                    Ok(LedgerEvent::Applied(entry)) => {
                        for update in scan.entry(&entry) {
                            yield Ok(update);
                        }
                    }
                    Ok(LedgerEvent::ProtocolUpgrade { version, tip }) => {
                        yield Ok(scan.progress(tip, version));
                    }
                    Err(RecvError::Lagged(n)) => {
                        yield Err(IndexerError::Connection(format!(
                            "subscription fell {} ledger events behind",
                            n
                        )));
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };
        Ok(stream.boxed())
    }

    async fn disconnect(&self, session: &SessionId) -> Result<(), IndexerError> {
        self.sessions
            .lock()
            .expect("lock should not be poisoned")
            .remove(session)
            .map(|_| tracing::debug!("simulated indexer closed session {}", session))
            .ok_or_else(|| IndexerError::UnknownSession(session.clone()))
    }
}

/// the view one subscription has of the ledger.
struct WalletScan {
    key: EncryptionSecretKey,
    from_index: u64,

    /// how far the wallet's commitment tree has been brought.
    tree: CommitmentTree,
    last_relevant: u64,
}

impl WalletScan {
    fn new(key: EncryptionSecretKey, from_index: Option<u64>, backlog: &[LedgerEntry]) -> Self {
        let from_index = from_index.unwrap_or(0);
        let tree = backlog
            .iter()
            .take_while(|e| e.index <= from_index)
            .last()
            .map(|e| e.tree_after)
            .unwrap_or_default();
        Self {
            key,
            from_index,
            tree,
            last_relevant: from_index,
        }
    }

    fn is_relevant(&self, entry: &LedgerEntry) -> bool {
        entry
            .transaction
            .offers()
            .flat_map(|o| o.outputs())
            .any(|o| o.notification.try_decrypt(&self.key).is_some())
    }

    /// updates for one ledger entry.  Entries at or before the start index
    /// produce nothing.
    fn entry(&mut self, entry: &LedgerEntry) -> Vec<RawUpdate> {
        if entry.index <= self.from_index {
            return vec![];
        }

        let mut updates = vec![];
        if self.is_relevant(entry) {
            if entry.tree_before.first_free() > self.tree.first_free() {
                updates.push(RawUpdate::MerkleTree {
                    index: entry.index,
                    update: CollapsedUpdate {
                        start: self.tree.first_free(),
                        end: entry.tree_before.first_free(),
                        root: entry.tree_before.root(),
                    },
                    protocol_version: entry.protocol_version,
                });
            }

            // reported at the next scan position, unless nothing applied
            let offset = if entry.stage.is_failure() {
                entry.index
            } else {
                entry.index + 1
            };
            match entry.transaction.to_bytes() {
                Ok(transaction) => updates.push(RawUpdate::Transaction {
                    offset,
                    transaction,
                    stage: entry.stage,
                    protocol_version: entry.protocol_version,
                }),
                Err(e) => tracing::error!(
                    "simulated indexer could not serialize entry {}: {}",
                    entry.index,
                    e
                ),
            }
            self.tree = entry.tree_after;
            self.last_relevant = entry.index;
        }

        updates.push(self.progress(entry.index, entry.protocol_version));
        updates
    }

    fn progress(&self, tip: u64, protocol_version: ProtocolVersion) -> RawUpdate {
        RawUpdate::Progress {
            highest_index: tip,
            highest_relevant_index: tip,
            highest_relevant_wallet_index: self.last_relevant,
            protocol_version,
        }
    }
}
