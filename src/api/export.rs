//! types that appear in the public api, re-exported in one place.

pub use crate::application::config::Network;
pub use crate::application::config::WalletConfiguration;
pub use crate::protocol::ledger::CoinInfo;
pub use crate::protocol::ledger::FeeSchedule;
pub use crate::protocol::ledger::SecretKeys;
pub use crate::protocol::ledger::ShieldedAddress;
pub use crate::protocol::ledger::TokenType;
pub use crate::protocol::ledger::Transaction;
pub use crate::protocol::ledger::TransactionHash;
pub use crate::protocol::ProtocolVersion;
pub use crate::runtime::RuntimeError;
pub use crate::runtime::StateChange;
pub use crate::runtime::VariantTag;
pub use crate::services::submission::SubmissionError;
pub use crate::services::submission::SubmissionEvent;
pub use crate::services::submission::SubmissionStage;
pub use crate::state::wallet::Balances;
pub use crate::state::wallet::HistoryEntry;
pub use crate::state::SyncProgress;
pub use crate::state::WalletState;
pub use crate::transacting::coin_selection::CoinSelectionPolicy;
pub use crate::transacting::ProvingRecipe;
pub use crate::transacting::TokenTransfer;
pub use crate::transacting::WalletError;
pub use crate::variants::BuiltVariant;
pub use crate::variants::VariantBuilder;
pub use crate::variants::VariantServices;
