//! the authoritative wallet snapshot.
//!
//! [WalletState] is a plain value.  All live mutation happens through the
//! runtime's state cell; the functions here only compute new values or
//! project existing ones.

pub mod coins;
pub mod keys;
pub mod sync_progress;
pub mod transaction_history;
pub mod wallet_state;

pub use coins::AvailableCoin;
pub use coins::Balances;
pub use coins::PendingCoin;
pub use sync_progress::SyncProgress;
pub use transaction_history::HistoryEntry;
pub use transaction_history::TransactionHistory;
pub use wallet_state::WalletState;
