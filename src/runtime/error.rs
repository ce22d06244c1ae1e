use super::variant::VariantTag;
use crate::protocol::protocol_version::InvalidVersionRange;
use crate::services::sync::SyncError;

/// failures of the variant and version plumbing.
///
/// Errors that reach the state stream end it; the embedding process has to
/// start a new runtime to recover.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("no variant to init")]
    NoVariantToInit,

    #[error("no implementation registered for variant {0}")]
    NoImplementation(VariantTag),

    #[error("variant has been shut down")]
    VariantClosed,

    #[error("variant is missing required service `{0}`")]
    MissingService(&'static str),

    #[error("state migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    InvalidRange(#[from] InvalidVersionRange),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("runtime has shut down")]
    ShutDown,
}
