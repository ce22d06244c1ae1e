//! runs exactly one protocol variant at a time.
//!
//! A [Runtime](runtime::Runtime) owns an ordered list of [Variant]s.  It
//! starts one of them, republishes the states that variant produces as a
//! single continuous stream, and when the variant reports a protocol version
//! outside of its valid range, shuts it down, migrates its last state into
//! the next variant and carries on publishing into the same stream.
//!
//! Callers reach the running variant through
//! [dispatch](runtime::Runtime::dispatch), which picks the implementation
//! registered for the current [VariantTag].

pub mod dispatch;
pub mod error;
#[allow(clippy::module_inception)]
pub mod runtime;
pub mod running_variant;
pub mod state_cell;
pub mod variant;

pub use dispatch::DispatchTable;
pub use error::RuntimeError;
pub use running_variant::RunningVariant;
pub use running_variant::RunningVariantHandle;
pub use runtime::Runtime;
pub use runtime::StartTag;
pub use runtime::StateChange;
pub use state_cell::WalletStateCell;
pub use variant::Variant;
pub use variant::VariantContext;
pub use variant::VariantEvent;
pub use variant::VariantEventSender;
pub use variant::VariantTag;
pub use variant::VersionChange;
