use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;

use super::error::RuntimeError;
use super::running_variant::RunningVariant;
use crate::protocol::ProtocolVersion;
use crate::protocol::ProtocolVersionRange;
use crate::state::wallet::SyncProgress;
use crate::state::WalletState;

/// the closed set of protocol variants this build supports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum VariantTag {
    V1,
    V2,
}

/// a protocol version a variant has observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChange {
    Version(ProtocolVersion),

    /// whatever version the next variant activates at.
    Next,
}

/// what a running variant reports to the runtime.
#[derive(Debug, Clone)]
pub enum VariantEvent {
    State(WalletState),
    ProgressUpdate(SyncProgress),
    VersionChange(VersionChange),
}

/// sending half of a variant's event channel.
#[derive(Debug, Clone)]
pub struct VariantEventSender {
    tx: mpsc::UnboundedSender<Result<VariantEvent, RuntimeError>>,
}

impl VariantEventSender {
    pub fn new(tx: mpsc::UnboundedSender<Result<VariantEvent, RuntimeError>>) -> Self {
        Self { tx }
    }

    /// returns `false` once the runtime stopped listening.
    pub fn send(&self, event: VariantEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    /// report an error the variant cannot recover from.
    pub fn fail(&self, error: RuntimeError) {
        tracing::error!("variant failed: {}", error);
        let _ = self.tx.send(Err(error));
    }
}

/// everything a variant is handed when it starts.
#[derive(Debug, Clone)]
pub struct VariantContext {
    /// version the variant starts under.
    pub protocol_version: ProtocolVersion,
    pub valid_range: ProtocolVersionRange,
    pub events: VariantEventSender,
}

/// one protocol variant.
#[async_trait]
pub trait Variant: Send + Sync + fmt::Debug {
    fn tag(&self) -> VariantTag;

    /// first protocol version this variant handles.
    fn since_version(&self) -> ProtocolVersion;

    /// start the variant's background tasks with `initial_state`.  The
    /// returned [RunningVariant] owns them.
    async fn start(
        &self,
        context: VariantContext,
        initial_state: WalletState,
    ) -> Result<RunningVariant, RuntimeError>;

    /// translate the last state of the previous variant.  An error means
    /// the states are incompatible and is fatal to the runtime.
    fn migrate_state(&self, previous: WalletState) -> Result<WalletState, RuntimeError>;
}
