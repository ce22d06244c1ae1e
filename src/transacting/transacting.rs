use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use super::balancer::Balancer;
use super::balancer::BalancingRequest;
use super::coin_selection::CoinSelectionPolicy;
use super::error::WalletError;
use super::proving_recipe::ProvingRecipe;
use crate::application::config::Network;
use crate::protocol::ledger::imbalances::Imbalances;
use crate::protocol::ledger::transaction::Offer;
use crate::protocol::ledger::transaction::Output;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::FeeSchedule;
use crate::protocol::ledger::ShieldedAddress;
use crate::protocol::ledger::TokenType;
use crate::protocol::ledger::Transaction;
use crate::protocol::ledger::TransactionImbalances;
use crate::state::WalletState;

/// one payment: `amount` of `token_type` to a bech32m encoded address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub token_type: TokenType,
    pub amount: u128,
    pub receiver_address: String,
}

impl TokenTransfer {
    pub fn new(token_type: TokenType, amount: u128, receiver_address: impl Into<String>) -> Self {
        Self {
            token_type,
            amount,
            receiver_address: receiver_address.into(),
        }
    }
}

/// outputs built from a list of transfers.
struct TransferOutputs {
    outputs: Vec<Output>,

    /// coins among `outputs` that are addressed to this wallet.
    own_coins: Vec<CoinInfo>,
}

/// builds balanced transactions for one protocol variant.
///
/// Each operation takes the current state and returns a recipe together
/// with the state that results from booking the recipe's inputs and
/// watching its outputs.  Nothing is committed until the caller stores
/// that state.
#[derive(Debug, Clone, Copy)]
pub struct TransactingCapability {
    fees: FeeSchedule,
    policy: CoinSelectionPolicy,
    network: Network,
}

impl TransactingCapability {
    pub fn new(fees: FeeSchedule, policy: CoinSelectionPolicy, network: Network) -> Self {
        Self {
            fees,
            policy,
            network,
        }
    }

    pub fn fees(&self) -> FeeSchedule {
        self.fees
    }

    pub fn policy(&self) -> CoinSelectionPolicy {
        self.policy
    }

    fn balancer(&self) -> Balancer {
        Balancer::new(self.fees, self.policy)
    }

    /// balance a transaction created elsewhere, e.g. the other half of a
    /// swap.  `new_coins` are outputs of `transaction` addressed to this
    /// wallet, which the wallet starts watching for.
    pub fn balance_transaction(
        &self,
        state: &WalletState,
        transaction: &Transaction,
        new_coins: &[CoinInfo],
    ) -> Result<(ProvingRecipe, WalletState), WalletError> {
        if new_coins.is_empty() && TransactionImbalances::of(transaction, &self.fees).is_balanced()
        {
            tracing::debug!("transaction {} already balanced", transaction.hash());
            return Ok((ProvingRecipe::NothingToProve(transaction.clone()), state.clone()));
        }

        let request = BalancingRequest {
            guaranteed: Imbalances::from(transaction.guaranteed.deltas()),
            fallible: transaction
                .fallible
                .as_ref()
                .map(|f| Imbalances::from(f.deltas()))
                .unwrap_or_default(),
            guaranteed_target: Imbalances::new(),
            base_inputs: transaction.num_inputs(),
            base_outputs: transaction.num_outputs(),
            known_self_outputs: new_coins.len(),
        };
        let outcome = self.balancer().balance(state, &request)?;
        let to_prove = outcome.to_transaction(state.secret_keys(), &state.address())?;

        let mut new_state = state.clone();
        outcome.book_into(&mut new_state);
        new_state.watch_outputs(new_coins);

        tracing::debug!(
            "balancing transaction {}: booked {} input(s), {} change output(s)",
            transaction.hash(),
            outcome.inputs().count(),
            outcome.change().count()
        );

        Ok((
            ProvingRecipe::BalanceTransactionToProve {
                to_prove,
                to_balance: transaction.clone(),
            },
            new_state,
        ))
    }

    /// pay each transfer's receiver, funded from the wallet's own coins.
    pub fn make_transfer(
        &self,
        state: &WalletState,
        transfers: &[TokenTransfer],
    ) -> Result<(ProvingRecipe, WalletState), WalletError> {
        if transfers.is_empty() {
            return Err(WalletError::Other("no transfers given".to_string()));
        }
        let TransferOutputs { outputs, own_coins } = self.build_outputs(state, transfers)?;

        let offer = Offer::new(vec![], outputs)?;
        let request = BalancingRequest {
            guaranteed: Imbalances::from(offer.deltas()),
            base_outputs: offer.outputs().len(),
            known_self_outputs: own_coins.len(),
            ..Default::default()
        };
        let outcome = self.balancer().balance(state, &request)?;

        let transaction = Transaction::new(offer, None)
            .merge(&outcome.to_transaction(state.secret_keys(), &state.address())?)?;

        let mut new_state = state.clone();
        outcome.book_into(&mut new_state);
        new_state.watch_outputs(&own_coins);

        tracing::debug!(
            "transfer {}: {} output(s), booked {} input(s)",
            transaction.hash(),
            transfers.len(),
            outcome.inputs().count()
        );

        Ok((ProvingRecipe::TransactionToProve(transaction), new_state))
    }

    /// offer `desired_outputs` in exchange for `desired_inputs`.
    ///
    /// The result is deliberately unbalanced: it leaves a surplus of what
    /// the wallet gives and a deficit of what it wants, for a counterparty
    /// to balance.
    pub fn init_swap(
        &self,
        state: &WalletState,
        desired_inputs: &BTreeMap<TokenType, u128>,
        desired_outputs: &[TokenTransfer],
    ) -> Result<(ProvingRecipe, WalletState), WalletError> {
        if desired_inputs.is_empty() && desired_outputs.is_empty() {
            return Err(WalletError::Other("swap offers and asks nothing".to_string()));
        }
        if desired_inputs.values().any(|v| *v == 0) {
            return Err(WalletError::Other("swap input amounts must be positive".to_string()));
        }
        let TransferOutputs { outputs, own_coins } = self.build_outputs(state, desired_outputs)?;

        let offer = Offer::new(vec![], outputs)?;
        let mut target = Imbalances::new();
        for (token, amount) in desired_inputs {
            target.add(*token, i128::try_from(*amount).unwrap_or(i128::MAX));
        }
        for (token, delta) in offer.deltas() {
            target.add(*token, *delta);
        }

        let request = BalancingRequest {
            guaranteed: Imbalances::from(offer.deltas()),
            guaranteed_target: target,
            base_outputs: offer.outputs().len(),
            known_self_outputs: own_coins.len(),
            ..Default::default()
        };
        let outcome = self.balancer().balance(state, &request)?;

        let transaction = Transaction::new(offer, None)
            .merge(&outcome.to_transaction(state.secret_keys(), &state.address())?)?;

        let mut new_state = state.clone();
        outcome.book_into(&mut new_state);
        new_state.watch_outputs(&own_coins);

        tracing::debug!(
            "swap {}: {} ask(s), {} output(s), booked {} input(s)",
            transaction.hash(),
            desired_inputs.len(),
            desired_outputs.len(),
            outcome.inputs().count()
        );

        Ok((ProvingRecipe::TransactionToProve(transaction), new_state))
    }

    /// release every coin `transaction` booked or was expected to deliver.
    /// Coins that belong to other transactions are untouched.
    pub fn revert_transaction(&self, state: &WalletState, transaction: &Transaction) -> WalletState {
        let nullifiers: HashSet<_> = transaction.nullifiers().collect();
        let commitments: HashSet<_> = transaction.commitments().collect();

        let csk = state.secret_keys().coin_secret_key();
        let spends: Vec<_> = state
            .pending_spends
            .values()
            .filter(|c| nullifiers.contains(&c.coin().nullifier(csk)))
            .map(|c| c.nonce)
            .collect();
        let outputs: Vec<_> = state
            .pending_outputs
            .values()
            .filter(|c| commitments.contains(&c.commitment(&state.coin_public_key())))
            .map(|c| c.nonce)
            .collect();

        let mut new_state = state.clone();
        for nonce in &spends {
            new_state.release_spend(nonce);
        }
        for nonce in &outputs {
            new_state.release_output(nonce);
        }

        tracing::debug!(
            "reverted transaction {}: released {} spend(s), {} pending output(s)",
            transaction.hash(),
            spends.len(),
            outputs.len()
        );
        new_state
    }

    /// revert every transaction held by `recipe`.
    pub fn revert_recipe(&self, state: &WalletState, recipe: &ProvingRecipe) -> WalletState {
        match recipe {
            ProvingRecipe::NothingToProve(_) => state.clone(),
            ProvingRecipe::TransactionToProve(tx) => self.revert_transaction(state, tx),
            ProvingRecipe::BalanceTransactionToProve {
                to_prove,
                to_balance,
            } => {
                let state = self.revert_transaction(state, to_prove);
                self.revert_transaction(&state, to_balance)
            }
        }
    }

    fn build_outputs(
        &self,
        state: &WalletState,
        transfers: &[TokenTransfer],
    ) -> Result<TransferOutputs, WalletError> {
        let own = state.address();
        let mut outputs = Vec::with_capacity(transfers.len());
        let mut own_coins = vec![];

        for transfer in transfers {
            if transfer.amount == 0 {
                return Err(WalletError::Other(format!(
                    "transfer of token {} to {} has zero amount",
                    transfer.token_type, transfer.receiver_address
                )));
            }
            let receiver = ShieldedAddress::from_bech32m(&transfer.receiver_address, self.network)?;
            let coin = CoinInfo::new(transfer.token_type, transfer.amount);
            outputs.push(Output::create(&coin, &receiver)?);
            if receiver == own {
                own_coins.push(coin);
            }
        }

        Ok(TransferOutputs { outputs, own_coins })
    }
}
