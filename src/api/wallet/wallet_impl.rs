// private module.  no need for module docs.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use super::WalletBalances;
use crate::api::error::WalletApiError;
use crate::application::config::WalletConfiguration;
use crate::macros::fn_name;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::SecretKeys;
use crate::protocol::ledger::TokenType;
use crate::protocol::ledger::Transaction;
use crate::protocol::ProtocolVersion;
use crate::runtime::DispatchTable;
use crate::runtime::RunningVariantHandle;
use crate::runtime::Runtime;
use crate::runtime::RuntimeError;
use crate::runtime::StartTag;
use crate::runtime::StateChange;
use crate::runtime::Variant;
use crate::runtime::VariantTag;
use crate::services::serialization::StateSerializer;
use crate::services::submission::SubmissionEvent;
use crate::services::submission::SubmissionStage;
use crate::state::SyncProgress;
use crate::state::WalletState;
use crate::transacting::ProvingRecipe;
use crate::transacting::TokenTransfer;
use crate::transacting::WalletError;
use crate::variants::BuiltVariant;
use crate::variants::VariantCapabilities;

/// the wallet facade.
///
/// Every operation is carried out by the capabilities of the variant that
/// is running when it is called.  Operations that book or release coins go
/// through the running variant's state cell, so they never interleave with
/// each other or with sync.
///
/// Reverting bookings after a failed proof or submission is up to the
/// caller; see [Wallet::revert_recipe] and [Wallet::revert_transaction].
#[derive(Debug)]
pub struct Wallet {
    config: WalletConfiguration,
    runtime: Runtime,
    capabilities: DispatchTable<VariantCapabilities>,
}

/// the variant whose activation version is the latest one not after
/// `version`.
fn start_tag(variants: &[Arc<dyn Variant>], version: ProtocolVersion) -> StartTag {
    variants
        .iter()
        .rev()
        .find(|v| v.since_version() <= version)
        .map(|v| StartTag::Tag(v.tag()))
        .unwrap_or(StartTag::Head)
}

impl Wallet {
    /// start a wallet from `initial_state` over `variants`, which must be
    /// listed in activation order.
    pub async fn start(
        config: WalletConfiguration,
        variants: Vec<BuiltVariant>,
        initial_state: WalletState,
    ) -> Result<Self, WalletApiError> {
        let capabilities: DispatchTable<_> = variants
            .iter()
            .map(|b| (b.variant.tag(), b.capabilities.clone()))
            .collect();
        let variants: Vec<Arc<dyn Variant>> = variants.into_iter().map(|b| b.variant).collect();

        let start = start_tag(&variants, initial_state.protocol_version());
        let runtime = Runtime::init(
            variants,
            start,
            initial_state,
            config.event_channel_capacity,
        )
        .await?;

        tracing::info!("wallet started on {} network", config.network);
        Ok(Self {
            config,
            runtime,
            capabilities,
        })
    }

    /// start a fresh wallet for keys derived from `seed`.
    pub async fn from_seed(
        config: WalletConfiguration,
        variants: Vec<BuiltVariant>,
        seed: [u8; 32],
    ) -> Result<Self, WalletApiError> {
        let state = WalletState::new(SecretKeys::from_seed(seed), config.network);
        Self::start(config, variants, state).await
    }

    /// start a wallet from a state produced by [Wallet::serialize_state].
    pub async fn restore(
        config: WalletConfiguration,
        variants: Vec<BuiltVariant>,
        secret_keys: SecretKeys,
        serialized: &str,
    ) -> Result<Self, WalletApiError> {
        let state = StateSerializer.deserialize(secret_keys, serialized)?;
        tracing::info!(
            "restored wallet state at protocol version {} (applied index {:?})",
            state.protocol_version(),
            state.progress().applied_index()
        );
        Self::start(config, variants, state).await
    }

    pub fn configuration(&self) -> &WalletConfiguration {
        &self.config
    }

    fn running(&self) -> Result<(&VariantCapabilities, RunningVariantHandle), WalletApiError> {
        Ok(self.runtime.dispatch(&self.capabilities)?)
    }

    /// every state change from the most recent one onward, tagged with the
    /// protocol version it was published under.
    pub fn state_changes(&self) -> BoxStream<'static, Result<StateChange, RuntimeError>> {
        self.runtime.state_changes()
    }

    /// the live state of the running variant.
    pub async fn state(&self) -> Result<WalletState, WalletApiError> {
        let (_, variant) = self.running()?;
        Ok(variant.snapshot().await)
    }

    pub async fn balances(&self) -> Result<WalletBalances, WalletApiError> {
        Ok(WalletBalances::from_state(&self.state().await?))
    }

    /// bech32m address other wallets send to.
    pub async fn address(&self) -> Result<String, WalletApiError> {
        let state = self.state().await?;
        Ok(state.address_bech32m().map_err(WalletError::from)?)
    }

    pub fn progress(&self) -> SyncProgress {
        self.runtime.progress()
    }

    pub fn variant_tag(&self) -> Result<VariantTag, WalletApiError> {
        Ok(self.runtime.current_variant()?.tag())
    }

    /// protocol version the running variant runs under.
    pub fn protocol_version(&self) -> Result<ProtocolVersion, WalletApiError> {
        Ok(self.runtime.current_variant()?.protocol_version())
    }

    /// resolves with the first state whose sync gaps are both within
    /// `max_gap`, by default the configured tolerance.
    pub async fn wait_for_synced_state(
        &self,
        max_gap: Option<u64>,
    ) -> Result<WalletState, WalletApiError> {
        let max_gap = max_gap.unwrap_or(self.config.sync_gap_tolerance);
        let mut changes = self.runtime.state_changes();
        while let Some(change) = changes.next().await {
            let (_, state) = change?;
            if state.progress().is_synced_within(max_gap) {
                return Ok(state);
            }
        }
        Err(WalletApiError::StreamEnded)
    }

    /// fund the imbalances of `transaction` from this wallet and watch
    /// `new_coins` as incoming.
    pub async fn balance_transaction(
        &self,
        transaction: &Transaction,
        new_coins: &[CoinInfo],
    ) -> Result<ProvingRecipe, WalletApiError> {
        let (capabilities, variant) = self.running()?;
        let recipe = variant
            .modify(|state| {
                capabilities
                    .transacting
                    .balance_transaction(state, transaction, new_coins)
                    .map(|(recipe, state)| (state, recipe))
            })
            .await?;
        tracing::debug!("{}: prepared {}", fn_name!(), recipe.kind());
        Ok(recipe)
    }

    pub async fn transfer_transaction(
        &self,
        transfers: &[TokenTransfer],
    ) -> Result<ProvingRecipe, WalletApiError> {
        let (capabilities, variant) = self.running()?;
        let recipe = variant
            .modify(|state| {
                capabilities
                    .transacting
                    .make_transfer(state, transfers)
                    .map(|(recipe, state)| (state, recipe))
            })
            .await?;
        tracing::debug!("{}: prepared {} transfers", fn_name!(), transfers.len());
        Ok(recipe)
    }

    /// the first half of a swap: this wallet offers `desired_inputs` and
    /// asks for `desired_outputs`, which the counterparty funds with
    /// [Wallet::balance_transaction].
    pub async fn init_swap(
        &self,
        desired_inputs: &BTreeMap<TokenType, u128>,
        desired_outputs: &[TokenTransfer],
    ) -> Result<ProvingRecipe, WalletApiError> {
        let (capabilities, variant) = self.running()?;
        let recipe = variant
            .modify(|state| {
                capabilities
                    .transacting
                    .init_swap(state, desired_inputs, desired_outputs)
                    .map(|(recipe, state)| (state, recipe))
            })
            .await?;
        tracing::debug!("{}: prepared swap offer", fn_name!());
        Ok(recipe)
    }

    /// prove a recipe.  On failure the recipe's bookings stay in place.
    pub async fn finalize_transaction(
        &self,
        recipe: ProvingRecipe,
    ) -> Result<Transaction, WalletApiError> {
        let (capabilities, _) = self.running()?;
        Ok(capabilities.proving.prove(recipe).await?)
    }

    /// submit and wait for `wait_for`, by default the configured stage.
    pub async fn submit_transaction(
        &self,
        transaction: &Transaction,
        wait_for: Option<SubmissionStage>,
    ) -> Result<SubmissionEvent, WalletApiError> {
        let (capabilities, _) = self.running()?;
        let wait_for = wait_for.unwrap_or(self.config.submission_wait);
        Ok(capabilities
            .submission
            .submit_transaction(transaction, wait_for)
            .await?)
    }

    /// release the coins booked for `recipe`.
    pub async fn revert_recipe(&self, recipe: &ProvingRecipe) -> Result<(), WalletApiError> {
        let (capabilities, variant) = self.running()?;
        variant
            .modify(|state| {
                Ok::<_, RuntimeError>((capabilities.transacting.revert_recipe(state, recipe), ()))
            })
            .await?;
        Ok(())
    }

    /// release the coins booked for `transaction`.
    pub async fn revert_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<(), WalletApiError> {
        let (capabilities, variant) = self.running()?;
        variant
            .modify(|state| {
                Ok::<_, RuntimeError>((
                    capabilities.transacting.revert_transaction(state, transaction),
                    (),
                ))
            })
            .await?;
        Ok(())
    }

    pub async fn serialize_state(&self) -> Result<String, WalletApiError> {
        let (capabilities, variant) = self.running()?;
        Ok(capabilities
            .serialization
            .serialize(&variant.snapshot().await)?)
    }

    /// close every submission service, then the runtime.  Idempotent.
    pub async fn close(&self) {
        for tag in self.capabilities.tags() {
            if let Ok(capabilities) = self.capabilities.get(tag) {
                capabilities.submission.close().await;
            }
        }
        self.runtime.close().await;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use macro_rules_attr::apply;

    use super::*;
    use crate::application::config::Network;
    use crate::protocol::ledger::FeeSchedule;
    use crate::protocol::simulator::LedgerSimulator;
    use crate::protocol::simulator::SimulatedIndexer;
    use crate::protocol::simulator::SimulatedSubmission;
    use crate::services::proving::SimulatedProving;
    use crate::tests::shared_tokio_runtime;
    use crate::variants::standard_variants;
    use crate::variants::VariantServices;
    use crate::variants::V2_ACTIVATION_VERSION;

    fn variants(ledger: &LedgerSimulator) -> Vec<BuiltVariant> {
        let services = VariantServices {
            indexer: Arc::new(SimulatedIndexer::new(ledger.clone(), Network::Undeployed)),
            proving: Arc::new(SimulatedProving),
            submission: Arc::new(SimulatedSubmission::new(ledger.clone())),
        };
        let config = WalletConfiguration::default().with_fee_schedule(FeeSchedule::zero());
        standard_variants(&config, &services).unwrap()
    }

    #[test]
    fn start_tag_follows_state_version() {
        let ledger = LedgerSimulator::new(FeeSchedule::zero());
        let variants: Vec<_> = variants(&ledger).into_iter().map(|b| b.variant).collect();

        assert_eq!(
            StartTag::Tag(VariantTag::V1),
            start_tag(&variants, ProtocolVersion::GENESIS)
        );
        assert_eq!(
            StartTag::Tag(VariantTag::V2),
            start_tag(&variants, V2_ACTIVATION_VERSION)
        );
        assert_eq!(StartTag::Head, start_tag(&[], ProtocolVersion::GENESIS));
    }

    #[apply(shared_tokio_runtime)]
    async fn fresh_wallet_syncs_and_reports_funds() {
        let ledger = LedgerSimulator::new(FeeSchedule::zero());
        let seed = [3u8; 32];
        ledger
            .mint(
                &SecretKeys::from_seed(seed).public_keys().into(),
                &[(TokenType::native(), 40)],
            )
            .await
            .unwrap();

        let wallet = Wallet::from_seed(WalletConfiguration::default(), variants(&ledger), seed)
            .await
            .unwrap();

        let synced = wallet.wait_for_synced_state(None).await.unwrap();
        assert_eq!(40, synced.available_balance(&TokenType::native()));
        assert_eq!(
            Some(&40),
            wallet.balances().await.unwrap().total.get(&TokenType::native())
        );

        wallet.close().await;
        wallet.close().await;
        assert_eq!(
            Err(WalletApiError::Runtime(RuntimeError::ShutDown)),
            wallet.state().await.map(|_| ())
        );
    }

    #[apply(shared_tokio_runtime)]
    async fn shortfall_is_reported_as_insufficient_funds() {
        let ledger = LedgerSimulator::new(FeeSchedule::zero());
        let wallet = Wallet::from_seed(WalletConfiguration::default(), variants(&ledger), [4u8; 32])
            .await
            .unwrap();
        let own = wallet.address().await.unwrap();

        let err = wallet
            .transfer_transaction(&[TokenTransfer::new(TokenType::native(), 5, own)])
            .await
            .unwrap_err();
        assert!(err.is_insufficient_funds());
        wallet.close().await;
    }
}
