//! resolves the imbalances of a transaction by selecting inputs and
//! creating change.
//!
//! Segments are balanced fallible first, then guaranteed.  The fallible
//! segment pays no fees itself, but every input and output it gains raises
//! the fee that the guaranteed segment must cover, so its size has to be
//! known before the guaranteed segment is costed.
//!
//! Within the guaranteed segment the fee depends on how many inputs and
//! outputs balancing adds.  The segment is first costed with the inputs and
//! outputs the transaction already has, and each coin selected or change
//! output created then adds its own marginal fee.

use super::coin_selection::CoinPool;
use super::coin_selection::CoinSelectionPolicy;
use super::error::WalletError;
use crate::protocol::ledger::imbalances::Imbalances;
use crate::protocol::ledger::transaction::Input;
use crate::protocol::ledger::transaction::Offer;
use crate::protocol::ledger::transaction::Output;
use crate::protocol::ledger::CoinInfo;
use crate::protocol::ledger::FeeSchedule;
use crate::protocol::ledger::QualifiedCoinInfo;
use crate::protocol::ledger::SecretKeys;
use crate::protocol::ledger::ShieldedAddress;
use crate::protocol::ledger::TokenType;
use crate::protocol::ledger::Transaction;
use crate::state::WalletState;

/// value of the output synthesized when a balanced transaction would
/// otherwise contain nothing the wallet can watch for.
pub const SELF_OUTPUT_VALUE: u128 = 1;

fn signed(value: u128) -> i128 {
    i128::try_from(value).unwrap_or(i128::MAX)
}

fn unsigned(value: i128) -> u128 {
    u128::try_from(value).unwrap_or(0)
}

/// inputs selected and change created for one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentBalance {
    pub inputs: Vec<QualifiedCoinInfo>,
    pub change: Vec<CoinInfo>,
}

impl SegmentBalance {
    fn to_offer(&self, keys: &SecretKeys, own: &ShieldedAddress) -> Result<Offer, WalletError> {
        let inputs = self.inputs.iter().map(|c| Input::spend(c, keys)).collect();
        let outputs = self
            .change
            .iter()
            .map(|c| Output::create(c, own))
            .collect::<Result<Vec<_>, _>>()?;
        Offer::new(inputs, outputs).map_err(WalletError::from)
    }
}

/// what a transaction has and what it should end up with.
#[derive(Debug, Clone, Default)]
pub struct BalancingRequest {
    /// current deltas of the guaranteed segment, fees not included.
    pub guaranteed: Imbalances,

    pub fallible: Imbalances,

    /// imbalance the guaranteed segment should be left with.  Zero for a
    /// complete transaction; non-zero for one half of a swap.
    pub guaranteed_target: Imbalances,

    /// inputs and outputs the transaction already has.  They count toward
    /// the fee.
    pub base_inputs: usize,
    pub base_outputs: usize,

    /// outputs addressed to this wallet that the caller already created.
    pub known_self_outputs: usize,
}

/// result of balancing both segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalancingOutcome {
    pub guaranteed: SegmentBalance,
    pub fallible: SegmentBalance,
}

impl BalancingOutcome {
    pub fn inputs(&self) -> impl Iterator<Item = &QualifiedCoinInfo> {
        self.guaranteed.inputs.iter().chain(&self.fallible.inputs)
    }

    pub fn change(&self) -> impl Iterator<Item = &CoinInfo> {
        self.guaranteed.change.iter().chain(&self.fallible.change)
    }

    /// the balancing transaction: selected inputs spent, change paid to
    /// `own`.
    pub fn to_transaction(
        &self,
        keys: &SecretKeys,
        own: &ShieldedAddress,
    ) -> Result<Transaction, WalletError> {
        Ok(Transaction::new(
            self.guaranteed.to_offer(keys, own)?,
            Some(self.fallible.to_offer(keys, own)?),
        ))
    }

    /// book the selected inputs and watch the change, in one step.
    pub fn book_into(&self, state: &mut WalletState) {
        state.book_spends(self.inputs());
        state.watch_outputs(self.change());
    }
}

/// fee accounting for the segment that pays fees.
#[derive(Debug, Clone, Copy)]
struct FeeContext {
    schedule: FeeSchedule,
    base_inputs: usize,
    base_outputs: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Balancer {
    fees: FeeSchedule,
    policy: CoinSelectionPolicy,
}

impl Balancer {
    pub fn new(fees: FeeSchedule, policy: CoinSelectionPolicy) -> Self {
        Self { fees, policy }
    }

    /// select inputs and change for both segments of `request`, spending
    /// only coins that are available (not booked) in `state`.
    pub fn balance(
        &self,
        state: &WalletState,
        request: &BalancingRequest,
    ) -> Result<BalancingOutcome, WalletError> {
        let available = state.available_coins().into_iter().map(|c| c.coin).collect();
        let mut pool = CoinPool::new(available, self.policy);

        let fallible = balance_segment(&mut pool, &request.fallible, &Imbalances::new(), None)?;

        let fees = FeeContext {
            schedule: self.fees,
            base_inputs: request.base_inputs + fallible.inputs.len(),
            base_outputs: request.base_outputs + fallible.change.len(),
        };
        let before_guaranteed = pool.clone();
        let mut guaranteed = balance_segment(
            &mut pool,
            &request.guaranteed,
            &request.guaranteed_target,
            Some(fees),
        )?;

        if guaranteed.change.is_empty() && request.known_self_outputs == 0 {
            // nothing in the transaction comes back to us: pay for one
            // small self output as well, so the wallet has something to
            // watch for.
            let mut pool = before_guaranteed;
            let mut target = request.guaranteed_target.clone();
            target.add(TokenType::native(), signed(SELF_OUTPUT_VALUE));
            let fees = FeeContext {
                base_outputs: fees.base_outputs + 1,
                ..fees
            };

            guaranteed = balance_segment(&mut pool, &request.guaranteed, &target, Some(fees))?;
            guaranteed
                .change
                .push(CoinInfo::new(TokenType::native(), SELF_OUTPUT_VALUE));
        }

        Ok(BalancingOutcome {
            guaranteed,
            fallible,
        })
    }
}

/// balance one segment so that its imbalance ends at `target`, fees (if
/// any) included.
fn balance_segment(
    pool: &mut CoinPool,
    imbalance: &Imbalances,
    target: &Imbalances,
    fees: Option<FeeContext>,
) -> Result<SegmentBalance, WalletError> {
    let native = TokenType::native();
    let mut remaining = imbalance.minus(target);
    let mut balance = SegmentBalance::default();

    let (per_input, per_output) = match fees {
        Some(ctx) => {
            remaining.add(
                native,
                signed(ctx.schedule.fee(ctx.base_inputs, ctx.base_outputs)).saturating_neg(),
            );
            (signed(ctx.schedule.per_input), signed(ctx.schedule.per_output))
        }
        None => (0, 0),
    };

    // non-native tokens first; every coin or change output they add costs
    // native fee.
    let tokens: Vec<TokenType> = remaining.tokens().filter(|t| !t.is_native()).copied().collect();
    for token in tokens {
        let mut r = remaining.get(&token);
        while r < 0 {
            let Some(coin) = pool.take(&token) else {
                return Err(WalletError::InsufficientFunds {
                    token_type: token,
                    amount: unsigned(r.saturating_neg()),
                });
            };
            r = r.saturating_add(signed(coin.value));
            balance.inputs.push(coin);
            remaining.add(native, per_input.saturating_neg());
        }
        if r > 0 {
            balance.change.push(CoinInfo::new(token, unsigned(r)));
            remaining.add(native, per_output.saturating_neg());
        }
    }

    let mut r = remaining.get(&native);
    loop {
        if r < 0 {
            let Some(coin) = pool.take(&native) else {
                return Err(WalletError::InsufficientFunds {
                    token_type: native,
                    amount: unsigned(r.saturating_neg()),
                });
            };
            r = r.saturating_add(signed(coin.value)).saturating_sub(per_input);
            balance.inputs.push(coin);
            continue;
        }
        if r == 0 {
            break;
        }
        if r > per_output {
            balance
                .change
                .push(CoinInfo::new(native, unsigned(r - per_output)));
            break;
        }

        // too little surplus to pay for its own change output.  Spend one
        // more coin if that makes change worthwhile, otherwise leave the
        // surplus to the ledger.
        let worthwhile = |c: &QualifiedCoinInfo| {
            r.saturating_add(signed(c.value)).saturating_sub(per_input) > per_output
        };
        match pool.take_first(&native, worthwhile) {
            Some(coin) => {
                r = r.saturating_add(signed(coin.value)).saturating_sub(per_input);
                balance.inputs.push(coin);
            }
            None => break,
        }
    }

    Ok(balance)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::protocol::ledger::TransactionImbalances;
    use crate::tests::shared::funded_state;

    fn deficit(token: TokenType, amount: u128) -> Imbalances {
        [(token, signed(amount).saturating_neg())].into_iter().collect()
    }

    fn fees() -> FeeSchedule {
        FeeSchedule::new(10, 2, 3)
    }

    #[test]
    fn smallest_coins_are_spent_first() {
        let state = funded_state(&[
            (TokenType::native(), 50),
            (TokenType::native(), 5),
            (TokenType::native(), 20),
        ]);
        let balancer = Balancer::new(FeeSchedule::zero(), CoinSelectionPolicy::SmallestFirst);
        let request = BalancingRequest {
            guaranteed: deficit(TokenType::native(), 22),
            known_self_outputs: 1,
            ..Default::default()
        };

        let outcome = balancer.balance(&state, &request).unwrap();
        let values: Vec<u128> = outcome.inputs().map(|c| c.value).collect();
        assert!(values == vec![5, 20]);
        assert!(outcome.guaranteed.change.len() == 1);
        assert!(outcome.guaranteed.change[0].value == 3);
    }

    #[test]
    fn guaranteed_segment_pays_fees_for_both_segments() {
        let gold = TokenType::custom("gold");
        let state = funded_state(&[(TokenType::native(), 100), (gold, 7)]);
        let balancer = Balancer::new(fees(), CoinSelectionPolicy::SmallestFirst);
        let request = BalancingRequest {
            fallible: deficit(gold, 7),
            base_outputs: 1,
            ..Default::default()
        };

        let outcome = balancer.balance(&state, &request).unwrap();
        assert!(outcome.fallible.inputs.len() == 1);
        assert!(outcome.fallible.change.is_empty());

        // fee = base 10 + 2 inputs * 2 + 2 outputs * 3 = 20; change = 80
        let_assert!([change] = outcome.guaranteed.change.as_slice());
        assert!(change.token_type.is_native());
        assert!(change.value == 80);
    }

    #[test]
    fn balanced_result_leaves_zero_imbalance() {
        let state = funded_state(&[(TokenType::native(), 40), (TokenType::native(), 9)]);
        let balancer = Balancer::new(fees(), CoinSelectionPolicy::SmallestFirst);
        let request = BalancingRequest {
            known_self_outputs: 1,
            ..Default::default()
        };
        let outcome = balancer.balance(&state, &request).unwrap();

        let tx = outcome
            .to_transaction(state.secret_keys(), &state.address())
            .unwrap();
        assert!(TransactionImbalances::of(&tx, &fees()).is_balanced());
    }

    #[test]
    fn self_output_is_synthesized_when_nothing_comes_back() {
        // exactly enough to pay for one input: no change on the first pass
        let state = funded_state(&[(TokenType::native(), 12), (TokenType::native(), 30)]);
        let balancer = Balancer::new(fees(), CoinSelectionPolicy::SmallestFirst);

        let outcome = balancer
            .balance(&state, &BalancingRequest::default())
            .unwrap();
        assert!(outcome
            .guaranteed
            .change
            .iter()
            .any(|c| c.value == SELF_OUTPUT_VALUE && c.token_type.is_native()));

        let tx = outcome
            .to_transaction(state.secret_keys(), &state.address())
            .unwrap();
        let imbalances = TransactionImbalances::of(&tx, &fees());
        assert!(imbalances.guaranteed.get(&TokenType::native()) >= 0);
    }

    #[test]
    fn dust_surplus_pulls_in_another_coin() {
        // 14 - fee(1 in, 0 out) = 2 surplus, not enough for a change output
        let state = funded_state(&[(TokenType::native(), 14), (TokenType::native(), 50)]);
        let balancer = Balancer::new(fees(), CoinSelectionPolicy::SmallestFirst);
        let request = BalancingRequest {
            known_self_outputs: 1,
            ..Default::default()
        };
        let outcome = balancer.balance(&state, &request).unwrap();
        assert!(outcome.guaranteed.inputs.len() == 2);
        let_assert!([change] = outcome.guaranteed.change.as_slice());
        assert!(change.value == 14 + 50 - 10 - 2 * 2 - 3);
    }

    #[test]
    fn insufficient_funds_boundary_for_custom_token() {
        let gold = TokenType::custom("gold");
        let state = funded_state(&[(gold, 4), (gold, 6), (TokenType::native(), 1_000)]);
        let balancer = Balancer::new(fees(), CoinSelectionPolicy::SmallestFirst);

        let exact = BalancingRequest {
            guaranteed: deficit(gold, 10),
            ..Default::default()
        };
        let outcome = balancer.balance(&state, &exact).unwrap();
        assert!(outcome.guaranteed.change.iter().all(|c| c.token_type != gold));

        let one_more = BalancingRequest {
            guaranteed: deficit(gold, 11),
            ..Default::default()
        };
        assert!(
            balancer.balance(&state, &one_more)
                == Err(WalletError::InsufficientFunds {
                    token_type: gold,
                    amount: 1
                })
        );
    }

    #[test]
    fn insufficient_funds_boundary_for_native_token() {
        let state = funded_state(&[(TokenType::native(), 30), (TokenType::native(), 25)]);
        let balancer = Balancer::new(fees(), CoinSelectionPolicy::SmallestFirst);

        // fee with 2 inputs and the caller's 1 output = 10 + 4 + 3 = 17
        let exact = BalancingRequest {
            guaranteed: deficit(TokenType::native(), 55 - 17),
            base_outputs: 1,
            known_self_outputs: 1,
            ..Default::default()
        };
        let outcome = balancer.balance(&state, &exact).unwrap();
        assert!(outcome.guaranteed.inputs.len() == 2);
        assert!(outcome.guaranteed.change.is_empty());

        let one_more = BalancingRequest {
            guaranteed: deficit(TokenType::native(), 55 - 17 + 1),
            ..exact
        };
        assert!(
            balancer.balance(&state, &one_more)
                == Err(WalletError::InsufficientFunds {
                    token_type: TokenType::native(),
                    amount: 1
                })
        );
    }

    #[test]
    fn swap_target_leaves_surplus_for_counterparty() {
        let gold = TokenType::custom("gold");
        let state = funded_state(&[(gold, 10), (TokenType::native(), 100)]);
        let balancer = Balancer::new(FeeSchedule::zero(), CoinSelectionPolicy::SmallestFirst);
        let request = BalancingRequest {
            guaranteed_target: [(gold, 6)].into_iter().collect(),
            known_self_outputs: 1,
            ..Default::default()
        };

        let outcome = balancer.balance(&state, &request).unwrap();
        let tx = outcome
            .to_transaction(state.secret_keys(), &state.address())
            .unwrap();
        let imbalances = TransactionImbalances::of(&tx, &FeeSchedule::zero());
        assert!(imbalances.guaranteed.get(&gold) == 6);
        assert!(imbalances.guaranteed.get(&TokenType::native()) == 0);
    }
}
