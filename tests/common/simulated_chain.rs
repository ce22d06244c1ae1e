use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use shielded_wallet::api::export::*;
use shielded_wallet::api::wallet::Wallet;
use shielded_wallet::protocol::simulator::LedgerSimulator;
use shielded_wallet::protocol::simulator::SimulatedIndexer;
use shielded_wallet::protocol::simulator::SimulatedSubmission;
use shielded_wallet::services::proving::SimulatedProving;
use shielded_wallet::variants::standard_variants;

/// how long a test waits for a wallet to observe something.
pub const OBSERVE_TIMEOUT: Duration = Duration::from_secs(10);

/// a simulated chain plus the services wallets use to reach it.
pub struct SimulatedChain {
    pub ledger: LedgerSimulator,
    pub config: WalletConfiguration,
    pub services: VariantServices,
}

impl SimulatedChain {
    /// a chain that charges `fees`, with wallets configured to match.
    pub fn new(fees: FeeSchedule) -> Self {
        let config = WalletConfiguration::default().with_fee_schedule(fees);
        let ledger = LedgerSimulator::new(fees);
        let services = VariantServices {
            indexer: Arc::new(SimulatedIndexer::new(ledger.clone(), config.network)),
            proving: Arc::new(SimulatedProving),
            submission: Arc::new(SimulatedSubmission::new(ledger.clone())),
        };
        Self {
            ledger,
            config,
            services,
        }
    }

    pub fn free() -> Self {
        Self::new(FeeSchedule::zero())
    }

    pub fn variants(&self) -> Vec<BuiltVariant> {
        standard_variants(&self.config, &self.services).unwrap()
    }

    pub async fn wallet(&self, seed: u8) -> Wallet {
        Wallet::from_seed(self.config.clone(), self.variants(), [seed; 32])
            .await
            .unwrap()
    }

    pub async fn address_of(&self, wallet: &Wallet) -> ShieldedAddress {
        ShieldedAddress::from_bech32m(&wallet.address().await.unwrap(), self.config.network)
            .unwrap()
    }

    /// mint coins to `wallet` and wait until it has seen them.
    pub async fn fund(&self, wallet: &Wallet, coins: &[(TokenType, u128)]) {
        let entry = self
            .ledger
            .mint(&self.address_of(wallet).await, coins)
            .await
            .unwrap();
        wait_until_applied(wallet, entry.index).await;
    }
}

/// the first state of `wallet` satisfying `done`.
pub async fn wait_for(wallet: &Wallet, done: impl Fn(&WalletState) -> bool) -> WalletState {
    let mut changes = wallet.state_changes();
    tokio::time::timeout(OBSERVE_TIMEOUT, async {
        while let Some(change) = changes.next().await {
            let (_, state) = change.unwrap();
            if done(&state) {
                return state;
            }
        }
        panic!("state stream ended");
    })
    .await
    .expect("wallet did not reach the expected state in time")
}

pub async fn wait_until_applied(wallet: &Wallet, index: u64) -> WalletState {
    wait_for(wallet, |s| s.progress().applied_index() >= Some(index)).await
}

/// transfer, prove and submit in one go.
pub async fn pay(
    from: &Wallet,
    to: &Wallet,
    token: TokenType,
    amount: u128,
) -> Result<SubmissionEvent, shielded_wallet::api::error::WalletApiError> {
    let receiver = to.address().await?;
    let recipe = from
        .transfer_transaction(&[TokenTransfer::new(token, amount, receiver)])
        .await?;
    let transaction = from.finalize_transaction(recipe).await?;
    from.submit_transaction(&transaction, None).await
}
