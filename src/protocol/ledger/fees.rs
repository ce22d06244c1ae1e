use serde::Deserialize;
use serde::Serialize;

use super::transaction::Transaction;

/// linear fee model.  Fees are always paid in the native token by the
/// guaranteed segment, but inputs and outputs of both segments count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "arbitrary-impls"), derive(arbitrary::Arbitrary))]
pub struct FeeSchedule {
    pub base: u128,
    pub per_input: u128,
    pub per_output: u128,
}

impl FeeSchedule {
    pub const fn new(base: u128, per_input: u128, per_output: u128) -> Self {
        Self {
            base,
            per_input,
            per_output,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn fee(&self, num_inputs: usize, num_outputs: usize) -> u128 {
        self.base
            .saturating_add(self.per_input.saturating_mul(num_inputs as u128))
            .saturating_add(self.per_output.saturating_mul(num_outputs as u128))
    }

    pub fn fee_for(&self, transaction: &Transaction) -> u128 {
        self.fee(transaction.num_inputs(), transaction.num_outputs())
    }
}
