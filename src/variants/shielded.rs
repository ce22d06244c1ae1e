use async_trait::async_trait;

use crate::application::scope::StopSignal;
use crate::application::scope::TaskScope;
use crate::protocol::ProtocolVersion;
use crate::protocol::ProtocolVersionRange;
use crate::runtime::RunningVariant;
use crate::runtime::RuntimeError;
use crate::runtime::Variant;
use crate::runtime::VariantContext;
use crate::runtime::VariantEvent;
use crate::runtime::VariantEventSender;
use crate::runtime::VariantTag;
use crate::runtime::VersionChange;
use crate::runtime::WalletStateCell;
use crate::services::sync::apply_update;
use crate::services::sync::SyncError;
use crate::services::sync::SyncService;
use crate::services::sync::SyncSession;
use crate::state::WalletState;

/// a variant that keeps its state current from an indexer subscription.
#[derive(Debug, Clone)]
pub struct ShieldedVariant {
    tag: VariantTag,
    since: ProtocolVersion,
    sync: SyncService,

    /// states observed at or beyond this version cannot be migrated into
    /// this variant.
    supported_until: ProtocolVersion,
}

impl ShieldedVariant {
    pub fn new(tag: VariantTag, since: ProtocolVersion, sync: SyncService) -> Self {
        Self {
            tag,
            since,
            sync,
            supported_until: ProtocolVersion::MAX_SUPPORTED,
        }
    }

    pub fn with_supported_until(mut self, supported_until: ProtocolVersion) -> Self {
        self.supported_until = supported_until;
        self
    }
}

#[async_trait]
impl Variant for ShieldedVariant {
    fn tag(&self) -> VariantTag {
        self.tag
    }

    fn since_version(&self) -> ProtocolVersion {
        self.since
    }

    async fn start(
        &self,
        context: VariantContext,
        initial_state: WalletState,
    ) -> Result<RunningVariant, RuntimeError> {
        let session = self.sync.updates(&initial_state).await?;

        let cell = WalletStateCell::new(initial_state, context.events.clone());
        let task = SyncTask {
            tag: self.tag,
            cell: cell.clone(),
            events: context.events.clone(),
            valid_range: context.valid_range,
            protocol_version: context.protocol_version,
        };

        let mut scope = TaskScope::new(format!("variant-{}", self.tag));
        scope.spawn(|stop| task.run(session, stop));

        Ok(RunningVariant::new(
            self.tag,
            cell,
            scope,
            context.valid_range,
            context.protocol_version,
        ))
    }

    /// states carry over unchanged; the fresh subscription has not reported
    /// progress yet.
    fn migrate_state(&self, previous: WalletState) -> Result<WalletState, RuntimeError> {
        if previous.protocol_version() >= self.supported_until {
            return Err(RuntimeError::Migration(format!(
                "variant {} cannot take over state observed at protocol version {} (supported until {})",
                self.tag,
                previous.protocol_version(),
                self.supported_until
            )));
        }

        let mut state = previous;
        state.progress = state.progress.disconnected();
        Ok(state)
    }
}

/// the background task of a running [ShieldedVariant].
struct SyncTask {
    tag: VariantTag,
    cell: WalletStateCell,
    events: VariantEventSender,
    valid_range: ProtocolVersionRange,
    protocol_version: ProtocolVersion,
}

impl SyncTask {
    async fn run(mut self, mut session: SyncSession, mut stop: StopSignal) {
        tracing::debug!("sync of variant {} started", self.tag);
        loop {
            let next = tokio::select! {
                _ = stop.stopped() => break,
                next = session.next() => next,
            };
            let update = match next {
                Some(Ok(update)) => update,
                Some(Err(e)) => {
                    tracing::warn!("sync of variant {} failed: {}", self.tag, e);
                    self.events.fail(e.into());
                    break;
                }
                None => {
                    self.events.fail(SyncError::SubscriptionEnded.into());
                    break;
                }
            };

            // updates from older versions are history and apply as they are.
            let version = update.protocol_version();
            if version > self.protocol_version {
                self.events
                    .send(VariantEvent::VersionChange(VersionChange::Version(version)));
                if !self.valid_range.contains(version) {
                    tracing::info!(
                        "sync of variant {} reached protocol version {}, outside {}",
                        self.tag,
                        version,
                        self.valid_range
                    );
                    break;
                }
                self.protocol_version = version;
            }

            let applied = self
                .cell
                .modify(|state| {
                    let state = apply_update(state.clone(), &update)?;
                    let progress = state.progress();
                    Ok::<_, RuntimeError>((state, progress))
                })
                .await;

            match applied {
                Ok(progress) => {
                    self.events.send(VariantEvent::ProgressUpdate(progress));
                }
                Err(RuntimeError::VariantClosed) => break,
                Err(e) => {
                    self.events.fail(e);
                    break;
                }
            }
        }

        session.close().await;
        tracing::debug!("sync of variant {} stopped", self.tag);
    }
}
