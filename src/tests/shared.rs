//! fixtures shared by unit tests.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::application::config::Network;
use crate::application::scope::TaskScope;
use crate::protocol::ledger::transaction::Output;
use crate::protocol::ledger::ApplyStage;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::Offer;
use crate::protocol::ledger::SecretKeys;
use crate::protocol::ledger::TokenType;
use crate::protocol::ledger::Transaction;
use crate::protocol::ProtocolVersion;
use crate::runtime::RunningVariant;
use crate::runtime::RuntimeError;
use crate::runtime::Variant;
use crate::runtime::VariantContext;
use crate::runtime::VariantEvent;
use crate::runtime::VariantTag;
use crate::runtime::VersionChange;
use crate::runtime::WalletStateCell;
use crate::services::indexer::IndexerClient;
use crate::services::indexer::IndexerError;
use crate::services::indexer::RawUpdate;
use crate::services::indexer::SessionId;
use crate::services::indexer::UpdateStream;
use crate::state::wallet::SyncProgress;
use crate::state::WalletState;

pub const TEST_SEED: [u8; 32] = [1u8; 32];

/// a fresh wallet on the undeployed network.
pub fn empty_state() -> WalletState {
    WalletState::new(SecretKeys::from_seed(TEST_SEED), Network::Undeployed)
}

/// a wallet that owns one confirmed coin per `(token, value)` pair.
pub fn funded_state(coins: &[(TokenType, u128)]) -> WalletState {
    funded_wallet(SecretKeys::from_seed(TEST_SEED), coins)
}

/// like [funded_state], for a wallet with the given keys.
///
/// coins are appended to the wallet's commitment tree as if they had been
/// received in order, so their tree indices are `0..coins.len()`.
pub fn funded_wallet(secret_keys: SecretKeys, coins: &[(TokenType, u128)]) -> WalletState {
    coins
        .iter()
        .fold(WalletState::new(secret_keys, Network::Undeployed), |state, (token, value)| {
            with_coin(&state, *token, *value)
        })
}

/// `state` plus one confirmed coin.
pub fn with_coin(state: &WalletState, token: TokenType, value: u128) -> WalletState {
    let mut state = state.clone();
    let coin = CoinInfo::new(token, value);
    let mt_index = state
        .commitment_tree
        .append(&coin.commitment(&state.coin_public_key()));
    state.coins.insert(coin.nonce, coin.qualify(mt_index));
    state
}

/// what a [ScriptedVariant] does next.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Credit(TokenType, u128),
    Progress(SyncProgress),
    VersionChange(VersionChange),
    Fail(RuntimeError),
}

/// a variant whose background task follows steps sent by the test.
#[derive(Debug)]
pub struct ScriptedVariant {
    tag: VariantTag,
    since: ProtocolVersion,
    script: Mutex<Option<mpsc::UnboundedReceiver<ScriptStep>>>,
    pub migrations: AtomicUsize,
    migrated_from: Mutex<Vec<WalletState>>,
}

impl ScriptedVariant {
    pub fn new(
        tag: VariantTag,
        since: ProtocolVersion,
    ) -> (Arc<Self>, mpsc::UnboundedSender<ScriptStep>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let variant = Self {
            tag,
            since,
            script: Mutex::new(Some(rx)),
            migrations: AtomicUsize::new(0),
            migrated_from: Mutex::new(vec![]),
        };
        (Arc::new(variant), tx)
    }

    pub fn migrated_from(&self) -> Vec<WalletState> {
        self.migrated_from.lock().unwrap().clone()
    }
}

#[async_trait]
impl Variant for ScriptedVariant {
    fn tag(&self) -> VariantTag {
        self.tag
    }

    fn since_version(&self) -> ProtocolVersion {
        self.since
    }

    async fn start(
        &self,
        context: VariantContext,
        initial_state: WalletState,
    ) -> Result<RunningVariant, RuntimeError> {
        let cell = WalletStateCell::new(initial_state, context.events.clone());
        let mut scope = TaskScope::new(format!("scripted-{}", self.tag));

        if let Some(mut script) = self.script.lock().unwrap().take() {
            let mut cell = cell.clone();
            let events = context.events.clone();
            scope.spawn(|mut stop| async move {
                loop {
                    let step = tokio::select! {
                        _ = stop.stopped() => break,
                        step = script.recv() => step,
                    };
                    match step {
                        None => break,
                        Some(ScriptStep::Credit(token, value)) => {
                            let _ = cell
                                .modify(|s| Ok::<_, RuntimeError>((with_coin(s, token, value), ())))
                                .await;
                        }
                        Some(ScriptStep::Progress(progress)) => {
                            events.send(VariantEvent::ProgressUpdate(progress));
                        }
                        Some(ScriptStep::VersionChange(change)) => {
                            events.send(VariantEvent::VersionChange(change));
                        }
                        Some(ScriptStep::Fail(error)) => events.fail(error),
                    }
                }
            });
        }

        Ok(RunningVariant::new(
            self.tag,
            cell,
            scope,
            context.valid_range,
            context.protocol_version,
        ))
    }

    fn migrate_state(&self, previous: WalletState) -> Result<WalletState, RuntimeError> {
        self.migrations.fetch_add(1, Ordering::SeqCst);
        self.migrated_from.lock().unwrap().push(previous.clone());
        Ok(previous)
    }
}

/// an indexer that serves a fixed list of updates to every subscription,
/// then either stays silent or fails.
#[derive(Debug)]
pub struct ScriptedIndexer {
    updates: Vec<RawUpdate>,
    failure: Option<IndexerError>,
    subscriptions: Mutex<Vec<Option<u64>>>,
    disconnects: AtomicUsize,
}

impl ScriptedIndexer {
    pub fn new(updates: Vec<RawUpdate>) -> Self {
        Self {
            updates,
            failure: None,
            subscriptions: Mutex::new(vec![]),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn failing_after(updates: Vec<RawUpdate>, error: IndexerError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(updates)
        }
    }

    /// the `from_index` of every subscription so far.
    pub fn subscriptions(&self) -> Vec<Option<u64>> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerClient for ScriptedIndexer {
    async fn connect(&self, viewing_key: &str) -> Result<SessionId, IndexerError> {
        Ok(SessionId(format!("scripted-{}", &viewing_key[..viewing_key.len().min(12)])))
    }

    async fn subscribe(
        &self,
        _session: &SessionId,
        from_index: Option<u64>,
    ) -> Result<UpdateStream, IndexerError> {
        self.subscriptions.lock().unwrap().push(from_index);

        let updates = stream::iter(self.updates.clone().into_iter().map(Ok));
        Ok(match self.failure.clone() {
            Some(error) => updates.chain(stream::iter([Err(error)])).boxed(),
            None => updates.chain(stream::pending()).boxed(),
        })
    }

    async fn disconnect(&self, _session: &SessionId) -> Result<(), IndexerError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// a successful transaction at `offset` that pays `value` native tokens to
/// the owner of `state`.
pub fn incoming_update(
    state: &WalletState,
    offset: u64,
    value: u128,
    protocol_version: ProtocolVersion,
) -> RawUpdate {
    let output = Output::create(&CoinInfo::new(TokenType::native(), value), &state.address()).unwrap();
    RawUpdate::Transaction {
        offset,
        transaction: Transaction::new(Offer::new(vec![], vec![output]).unwrap(), None)
            .to_bytes()
            .unwrap(),
        stage: ApplyStage::Success,
        protocol_version,
    }
}

/// an indexer progress report with everything up to `index` scanned.
pub fn progress_update(index: u64, protocol_version: ProtocolVersion) -> RawUpdate {
    RawUpdate::Progress {
        highest_index: index,
        highest_relevant_index: index,
        highest_relevant_wallet_index: index,
        protocol_version,
    }
}
