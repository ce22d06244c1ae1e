//! the ledger the wallet reasons about.
//!
//! [protocol_version] orders chain protocol versions, [ledger] is the
//! reference model of coins, keys and transactions and [simulator] is an
//! in-process chain plus indexer built on top of it.

pub mod ledger;
pub mod protocol_version;
pub mod simulator;

pub use protocol_version::ProtocolVersion;
pub use protocol_version::ProtocolVersionRange;
