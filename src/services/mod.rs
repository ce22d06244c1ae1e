//! collaborators a protocol variant drives.
//!
//! * [indexer] is the boundary to the chain indexer.
//! * [sync] turns indexer updates into wallet state.
//! * [proving] turns proving recipes into final transactions.
//! * [submission] hands final transactions to a node.
//! * [serialization] persists wallet state.

pub mod indexer;
pub mod proving;
pub mod serialization;
pub mod submission;
pub mod sync;
