//! provides the wallet facade.
mod wallet_balances;
mod wallet_impl;

// these represent the public API
pub use wallet_balances::WalletBalances;
pub use wallet_impl::Wallet;
