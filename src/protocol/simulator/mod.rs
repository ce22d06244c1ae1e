//! an in-process chain, indexer and node for local use and tests.
//!
//! [LedgerSimulator] is the chain.  [SimulatedIndexer] serves wallet
//! subscriptions from it the way a remote indexer would, and
//! [SimulatedSubmission] submits to it in place of a node.

pub mod ledger_simulator;
pub mod simulated_indexer;
pub mod simulated_submission;

pub use ledger_simulator::LedgerEntry;
pub use ledger_simulator::LedgerError;
pub use ledger_simulator::LedgerEvent;
pub use ledger_simulator::LedgerSimulator;
pub use simulated_indexer::SimulatedIndexer;
pub use simulated_submission::SimulatedSubmission;
