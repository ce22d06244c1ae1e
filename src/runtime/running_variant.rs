use super::error::RuntimeError;
use super::state_cell::WalletStateCell;
use super::variant::VariantTag;
use crate::application::scope::TaskScope;
use crate::protocol::ProtocolVersion;
use crate::protocol::ProtocolVersionRange;
use crate::state::WalletState;

/// a started variant: its live state, the scope owning its background tasks
/// and the range of protocol versions it is valid for.
#[derive(Debug)]
pub struct RunningVariant {
    tag: VariantTag,
    state: WalletStateCell,
    scope: TaskScope,
    valid_range: ProtocolVersionRange,
    protocol_version: ProtocolVersion,
}

impl RunningVariant {
    pub fn new(
        tag: VariantTag,
        state: WalletStateCell,
        scope: TaskScope,
        valid_range: ProtocolVersionRange,
        protocol_version: ProtocolVersion,
    ) -> Self {
        Self {
            tag,
            state,
            scope,
            valid_range,
            protocol_version,
        }
    }

    pub fn tag(&self) -> VariantTag {
        self.tag
    }

    pub fn valid_range(&self) -> ProtocolVersionRange {
        self.valid_range
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub(crate) fn set_protocol_version(&mut self, protocol_version: ProtocolVersion) {
        self.protocol_version = protocol_version;
    }

    pub fn handle(&self) -> RunningVariantHandle {
        RunningVariantHandle {
            tag: self.tag,
            state: self.state.clone(),
            protocol_version: self.protocol_version,
        }
    }

    /// stop the background tasks, then refuse further state changes.
    /// Callers still holding a handle get [RuntimeError::VariantClosed].
    pub async fn shutdown(self) {
        let Self {
            tag,
            mut state,
            scope,
            ..
        } = self;
        scope.close().await;
        state.close().await;
        tracing::info!("variant {} shut down", tag);
    }
}

/// what callers use to operate on the running variant.
#[derive(Debug, Clone)]
pub struct RunningVariantHandle {
    tag: VariantTag,
    state: WalletStateCell,
    protocol_version: ProtocolVersion,
}

impl RunningVariantHandle {
    pub fn tag(&self) -> VariantTag {
        self.tag
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub async fn snapshot(&self) -> WalletState {
        self.state.snapshot().await
    }

    /// see [WalletStateCell::modify].
    pub async fn modify<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&WalletState) -> Result<(WalletState, R), E>,
        E: From<RuntimeError>,
    {
        let mut state = self.state.clone();
        state.modify(f).await
    }
}
