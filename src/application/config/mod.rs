//! wallet configuration.
//!
//! Configuration is deliberately small: it only holds the knobs a running
//! wallet actually consults.  Everything the embedding process owns (where
//! the indexer lives, how keys are stored) is outside of it.

pub mod network;
pub mod wallet_configuration;

pub use network::Network;
pub use wallet_configuration::WalletConfiguration;
