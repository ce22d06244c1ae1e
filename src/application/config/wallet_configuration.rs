use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use super::network::Network;
use crate::protocol::ledger::fees::FeeSchedule;
use crate::services::submission::SubmissionStage;
use crate::transacting::coin_selection::CoinSelectionPolicy;

/// default capacity of the state/progress event channels.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// runtime knobs of a wallet instance.
///
/// Missing fields in a JSON document fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfiguration {
    pub network: Network,

    /// maximum tolerated `source_gap`/`apply_gap` for a state to count as
    /// synced in `wait_for_synced_state()`.
    pub sync_gap_tolerance: u64,

    pub coin_selection_policy: CoinSelectionPolicy,

    /// when set, replaces the built-in fee schedule of every variant.
    pub fee_schedule: Option<FeeSchedule>,

    /// lifecycle stage `submit_transaction()` waits for when the caller
    /// does not specify one.
    pub submission_wait: SubmissionStage,

    pub event_channel_capacity: usize,
}

impl Default for WalletConfiguration {
    fn default() -> Self {
        Self {
            network: Network::default(),
            sync_gap_tolerance: 0,
            coin_selection_policy: CoinSelectionPolicy::default(),
            fee_schedule: None,
            submission_wait: SubmissionStage::InBlock,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl WalletConfiguration {
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_fee_schedule(mut self, fee_schedule: FeeSchedule) -> Self {
        self.fee_schedule = Some(fee_schedule);
        self
    }

    pub fn with_coin_selection_policy(mut self, policy: CoinSelectionPolicy) -> Self {
        self.coin_selection_policy = policy;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
