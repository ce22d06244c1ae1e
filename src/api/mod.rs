//! public api of the wallet.
//!
//! [wallet::Wallet] is the one type most callers need: it starts the
//! runtime over a set of variants and exposes the wallet operations
//! (balance, transfer, swap, finalize, submit, serialize) against whichever
//! variant is running.  [export] re-exports the types that appear in its
//! signatures.
pub mod error;
pub mod export;
pub mod wallet;
