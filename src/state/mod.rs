//! wallet state and its read-only projections.

pub mod wallet;

pub use wallet::SyncProgress;
pub use wallet::WalletState;
