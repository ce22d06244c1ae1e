//! process-level plumbing the wallet runtime is built on: configuration,
//! tokio lock wrappers, cancellation scopes and the replaying broadcast used
//! for the state stream.

pub mod broadcast;
pub mod config;
pub mod locks;
pub mod scope;
