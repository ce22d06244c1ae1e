// enables nightly feature async_fn_track_caller for crate feature log-slow-write-lock.
// log-slow-write-lock logs warning when a write-lock is held longer than 100 millis.
// to enable: cargo +nightly build --features log-slow-write-lock
#![cfg_attr(feature = "track-lock-location", feature(async_fn_track_caller))]
//
// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute so that `#[cfg(test)]` modules can
// be annotated with `#[cfg_attr(coverage_nightly, coverage(off))]`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Synchronization and transaction-construction core of a shielded-ledger
//! wallet.
//!
//! The crate is layered the same way the wallet runs:
//!
//! * [protocol] holds the ledger model the wallet reasons about (coins, keys,
//!   offers, fees, protocol versions) plus in-process simulators.
//! * [state] holds the per-variant [WalletState](state::wallet::WalletState)
//!   and its read-only projections (coins, balances, keys, progress).
//! * [transacting] is the coin-selection and balancing engine.
//! * [services] are the collaborators a variant drives: indexer sync,
//!   proving, submission and serialization.
//! * [runtime] runs exactly one protocol variant at a time and migrates
//!   between them without interrupting subscribers.
//! * [variants] are the concrete protocol variants this build supports.
//! * [api] is the public wallet facade.

pub mod api;
pub mod application;
pub mod macros;
pub mod protocol;
pub mod runtime;
pub mod services;
pub mod state;
pub mod transacting;
pub mod variants;
