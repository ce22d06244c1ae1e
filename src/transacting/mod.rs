//! turning desired transfers into balanced, provable transactions.
//!
//! [coin_selection] decides which coins to spend, [balancer] resolves the
//! imbalances of one transaction segment by segment, and
//! [transacting::TransactingCapability] builds the user facing operations
//! (balance, transfer, swap, revert) on top of them.
//!
//! Everything in this module is pure: functions take a [WalletState] and
//! return a new one with coins booked.  Atomicity with respect to other
//! mutators is provided by the caller running them inside the state cell.
//!
//! [WalletState]: crate::state::WalletState

pub mod balancer;
pub mod coin_selection;
pub mod error;
pub mod proving_recipe;
#[allow(clippy::module_inception)]
pub mod transacting;

pub use error::WalletError;
pub use proving_recipe::ProvingRecipe;
pub use transacting::TokenTransfer;
pub use transacting::TransactingCapability;
