use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;

use super::fees::FeeSchedule;
use super::token::TokenType;
use super::transaction::Transaction;

/// signed per-token amounts.  Positive means surplus, negative means
/// deficit.  Zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Imbalances(BTreeMap<TokenType, i128>);

impl Imbalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token_type: &TokenType) -> i128 {
        self.0.get(token_type).copied().unwrap_or(0)
    }

    pub fn add(&mut self, token_type: TokenType, amount: i128) {
        let entry = self.0.entry(token_type).or_default();
        *entry = entry.saturating_add(amount);
        if *entry == 0 {
            self.0.remove(&token_type);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenType, &i128)> {
        self.0.iter()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenType> {
        self.0.keys()
    }

    /// `self - other`, per token.
    pub fn minus(&self, other: &Imbalances) -> Imbalances {
        let mut result = self.clone();
        for (token, amount) in other.iter() {
            result.add(*token, amount.saturating_neg());
        }
        result
    }
}

impl FromIterator<(TokenType, i128)> for Imbalances {
    fn from_iter<I: IntoIterator<Item = (TokenType, i128)>>(iter: I) -> Self {
        let mut imbalances = Self::new();
        for (token, amount) in iter {
            imbalances.add(token, amount);
        }
        imbalances
    }
}

impl From<&BTreeMap<TokenType, i128>> for Imbalances {
    fn from(deltas: &BTreeMap<TokenType, i128>) -> Self {
        deltas.iter().map(|(t, v)| (*t, *v)).collect()
    }
}

impl fmt::Display for Imbalances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .0
            .iter()
            .map(|(token, amount)| format!("{:?}: {}", token, amount))
            .join(", ");
        write!(f, "{{{}}}", entries)
    }
}

/// what a transaction still lacks (or has in excess), per segment.
///
/// The guaranteed segment additionally owes the transaction fee in the
/// native token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionImbalances {
    pub guaranteed: Imbalances,
    pub fallible: Imbalances,
}

impl TransactionImbalances {
    pub fn of(transaction: &Transaction, fees: &FeeSchedule) -> Self {
        let mut guaranteed = Imbalances::from(transaction.guaranteed.deltas());
        guaranteed.add(
            TokenType::native(),
            i128::try_from(fees.fee_for(transaction))
                .unwrap_or(i128::MAX)
                .saturating_neg(),
        );
        let fallible = transaction
            .fallible
            .as_ref()
            .map(|f| Imbalances::from(f.deltas()))
            .unwrap_or_default();

        Self {
            guaranteed,
            fallible,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.guaranteed.is_zero() && self.fallible.is_zero()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::super::coin::CoinInfo;
    use super::super::keys::SecretKeys;
    use super::super::transaction::Input;
    use super::super::transaction::Offer;
    use super::super::transaction::Output;
    use super::*;

    #[test]
    fn zero_entries_are_dropped() {
        let mut imbalances = Imbalances::new();
        imbalances.add(TokenType::native(), 5);
        imbalances.add(TokenType::native(), -5);
        assert!(imbalances.is_zero());
    }

    #[test]
    fn transaction_paying_exact_fee_is_balanced() {
        let keys = SecretKeys::from_seed([9u8; 32]);
        let fees = FeeSchedule::new(10, 1, 1);
        let coin = CoinInfo::new(TokenType::native(), 100).qualify(0);
        let change = CoinInfo::new(TokenType::native(), 88);

        let tx = Transaction::new(
            Offer::new(
                vec![Input::spend(&coin, &keys)],
                vec![Output::create(&change, &keys.public_keys().into()).unwrap()],
            )
            .unwrap(),
            None,
        );
        let imbalances = TransactionImbalances::of(&tx, &fees);
        assert!(imbalances.is_balanced(), "{}", imbalances.guaranteed);
    }

    #[test]
    fn fallible_imbalance_is_tracked_separately() {
        let keys = SecretKeys::from_seed([9u8; 32]);
        let gold = TokenType::custom("gold");
        let out = Output::create(&CoinInfo::new(gold, 3), &keys.public_keys().into()).unwrap();
        let tx = Transaction::new(Offer::default(), Some(Offer::new(vec![], vec![out]).unwrap()));

        let imbalances = TransactionImbalances::of(&tx, &FeeSchedule::zero());
        assert!(imbalances.guaranteed.is_zero());
        assert_eq!(-3, imbalances.fallible.get(&gold));
    }

    #[proptest]
    fn minus_inverts_add(#[strategy(-1000i128..1000)] a: i128, #[strategy(-1000i128..1000)] b: i128) {
        let x: Imbalances = [(TokenType::native(), a)].into_iter().collect();
        let y: Imbalances = [(TokenType::native(), b)].into_iter().collect();
        prop_assert_eq!(a - b, x.minus(&y).get(&TokenType::native()));
    }
}
