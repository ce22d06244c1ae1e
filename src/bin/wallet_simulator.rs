//! runs two wallets against the in-process ledger simulator: alice is
//! funded, pays bob, and bob pays part of it back.  With `--upgrade` the
//! chain moves to the V2 protocol in between.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use shielded_wallet::api::export::*;
use shielded_wallet::api::wallet::Wallet;
use shielded_wallet::protocol::simulator::LedgerSimulator;
use shielded_wallet::protocol::simulator::SimulatedIndexer;
use shielded_wallet::protocol::simulator::SimulatedSubmission;
use shielded_wallet::services::proving::SimulatedProving;
use shielded_wallet::variants::standard_variants;
use shielded_wallet::variants::V1_FEE_SCHEDULE;
use shielded_wallet::variants::V2_ACTIVATION_VERSION;
use shielded_wallet::variants::V2_FEE_SCHEDULE;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[clap(name = "wallet-simulator", about = "two shielded wallets on a simulated chain")]
struct Args {
    /// wallet configuration as JSON.  Defaults apply when omitted.
    #[clap(long)]
    config: Option<PathBuf>,

    /// native tokens minted to alice.
    #[clap(long, default_value_t = 1_000)]
    funds: u128,

    /// native tokens alice sends to bob.
    #[clap(long, default_value_t = 250)]
    amount: u128,

    /// stage to wait for after each submission.
    #[clap(long, default_value = "InBlock")]
    wait: SubmissionStage,

    /// upgrade the chain to the V2 protocol after the first transfer.
    #[clap(long)]
    upgrade: bool,
}

/// wait for the first state of `wallet` that satisfies `done`.
async fn wait_for(wallet: &Wallet, done: impl Fn(&WalletState) -> bool) -> Result<WalletState> {
    let mut changes = wallet.state_changes();
    while let Some(change) = changes.next().await {
        let (_, state) = change?;
        if done(&state) {
            return Ok(state);
        }
    }
    bail!("wallet stopped before reaching the expected state")
}

async fn pay(from: &Wallet, to: &Wallet, amount: u128, wait: SubmissionStage) -> Result<()> {
    let receiver = to.address().await?;
    let recipe = from
        .transfer_transaction(&[TokenTransfer::new(TokenType::native(), amount, receiver)])
        .await?;
    let transaction = from.finalize_transaction(recipe.clone()).await?;
    match from.submit_transaction(&transaction, Some(wait)).await {
        Ok(event) => {
            tracing::info!("transfer of {} {:?}", amount, event);
            Ok(())
        }
        Err(e) => {
            from.revert_recipe(&recipe).await?;
            Err(e).context("transfer was not accepted")
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => WalletConfiguration::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WalletConfiguration::default(),
    };

    let ledger = LedgerSimulator::new(config.fee_schedule.unwrap_or(V1_FEE_SCHEDULE));
    let services = VariantServices {
        indexer: Arc::new(SimulatedIndexer::new(ledger.clone(), config.network)),
        proving: Arc::new(SimulatedProving),
        submission: Arc::new(SimulatedSubmission::new(ledger.clone())),
    };

    let alice = Wallet::from_seed(
        config.clone(),
        standard_variants(&config, &services)?,
        [0xa1; 32],
    )
    .await?;
    let bob = Wallet::from_seed(
        config.clone(),
        standard_variants(&config, &services)?,
        [0xb0; 32],
    )
    .await?;

    let alice_address = ShieldedAddress::from_bech32m(&alice.address().await?, config.network)?;
    ledger
        .mint(&alice_address, &[(TokenType::native(), args.funds)])
        .await?;
    wait_for(&alice, |s| s.available_balance(&TokenType::native()) > 0).await?;

    pay(&alice, &bob, args.amount, args.wait).await?;
    wait_for(&bob, |s| s.available_balance(&TokenType::native()) >= args.amount).await?;

    if args.upgrade {
        ledger
            .set_fees(config.fee_schedule.unwrap_or(V2_FEE_SCHEDULE))
            .await;
        ledger.upgrade_protocol(V2_ACTIVATION_VERSION).await?;
        wait_for(&bob, |s| s.protocol_version() >= V2_ACTIVATION_VERSION).await?;
        wait_for(&alice, |s| s.protocol_version() >= V2_ACTIVATION_VERSION).await?;
        println!("chain upgraded to protocol version {}", V2_ACTIVATION_VERSION);
    }

    let tip = ledger.tip().await;
    pay(&bob, &alice, args.amount / 2, args.wait).await?;
    for wallet in [&alice, &bob] {
        wait_for(wallet, |s| s.progress().applied_index() > Some(tip)).await?;
    }

    for (name, wallet) in [("alice", &alice), ("bob", &bob)] {
        println!(
            "{} (variant {}, protocol {}):\n{}",
            name,
            wallet.variant_tag()?,
            wallet.protocol_version()?,
            wallet.balances().await?
        );
    }

    alice.close().await;
    bob.close().await;
    Ok(())
}

pub fn main() -> Result<()> {
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("could not create tokio runtime")?;

    // Configure logger to use ISO-8601, of which rfc3339 is a subset.
    // Accepted `RUST_LOG` values are `trace`, `debug`, `info`, `warn`,
    // and `error`.
    let info_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(info_env_filter)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("unable to set global default subscriber")?;

    let args = Args::parse();
    let result = tokio_runtime.block_on(run(args));

    tokio_runtime.shutdown_timeout(tokio::time::Duration::from_secs(10));
    result
}
