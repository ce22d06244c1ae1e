use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::sync::Mutex;

use super::dispatch::DispatchTable;
use super::error::RuntimeError;
use super::running_variant::RunningVariant;
use super::running_variant::RunningVariantHandle;
use super::variant::Variant;
use super::variant::VariantContext;
use super::variant::VariantEvent;
use super::variant::VariantEventSender;
use super::variant::VariantTag;
use super::variant::VersionChange;
use crate::application::broadcast::ReplayBroadcast;
use crate::application::scope::StopSignal;
use crate::application::scope::TaskScope;
use crate::protocol::ProtocolVersion;
use crate::protocol::ProtocolVersionRange;
use crate::state::wallet::SyncProgress;
use crate::state::WalletState;

/// a published state, tagged with the protocol version it was produced
/// under.
pub type StateChange = (ProtocolVersion, WalletState);

type EventReceiver = mpsc::UnboundedReceiver<Result<VariantEvent, RuntimeError>>;

/// which variant [Runtime::init] starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTag {
    /// the first variant in the list.
    Head,
    Tag(VariantTag),
}

/// valid range of `variants[index]`: up to the next variant's activation.
fn valid_range(
    variants: &[Arc<dyn Variant>],
    index: usize,
) -> Result<ProtocolVersionRange, RuntimeError> {
    let variant = variants.get(index).ok_or(RuntimeError::NoVariantToInit)?;
    let end = variants
        .get(index + 1)
        .map(|next| next.since_version())
        .unwrap_or(ProtocolVersion::MAX_SUPPORTED);
    Ok(ProtocolVersionRange::new(variant.since_version(), end)?)
}

/// carry `state` from the variant at `index` forward through its successors
/// until one is valid for `resolved`.  Returns that variant's index and the
/// migrated state.
fn migrate_forward(
    variants: &[Arc<dyn Variant>],
    mut index: usize,
    mut state: WalletState,
    resolved: ProtocolVersion,
) -> Result<(usize, WalletState), RuntimeError> {
    let from = variants.get(index).ok_or(RuntimeError::NoVariantToInit)?.tag();
    while !valid_range(variants, index)?.contains(resolved) {
        index += 1;
        let next = variants.get(index).ok_or(RuntimeError::NoVariantToInit)?;
        tracing::info!(
            "migrating state from variant {} to {} for protocol version {}",
            from,
            next.tag(),
            resolved
        );
        state = next.migrate_state(state)?;
    }
    Ok((index, state))
}

async fn start_variant(
    variants: &[Arc<dyn Variant>],
    index: usize,
    protocol_version: ProtocolVersion,
    state: WalletState,
) -> Result<(RunningVariant, EventReceiver), RuntimeError> {
    let variant = variants.get(index).ok_or(RuntimeError::NoVariantToInit)?;
    let valid_range = valid_range(variants, index)?;
    let (tx, rx) = mpsc::unbounded_channel();

    let context = VariantContext {
        protocol_version,
        valid_range,
        events: VariantEventSender::new(tx),
    };
    let running = variant
        .start(context, state.with_protocol_version(protocol_version))
        .await?;

    tracing::info!(
        "started variant {} at protocol version {}, valid for {}",
        variant.tag(),
        protocol_version,
        valid_range
    );
    Ok((running, rx))
}

/// runs one variant at a time and republishes its states.
#[derive(Debug)]
pub struct Runtime {
    states: ReplayBroadcast<StateChange, RuntimeError>,
    progress: watch::Receiver<SyncProgress>,
    current: watch::Receiver<Option<RunningVariantHandle>>,
    driver: Mutex<Option<TaskScope>>,
}

impl Runtime {
    /// start the variant selected by `start` with `initial_state`.
    ///
    /// The variant runs under the later of the state's protocol version
    /// and the variant's activation version.  `capacity` bounds how far a
    /// state subscriber may lag.
    pub async fn init(
        variants: Vec<Arc<dyn Variant>>,
        start: StartTag,
        initial_state: WalletState,
        capacity: usize,
    ) -> Result<Self, RuntimeError> {
        let index = match start {
            StartTag::Head => 0,
            StartTag::Tag(tag) => variants
                .iter()
                .position(|v| v.tag() == tag)
                .ok_or(RuntimeError::NoVariantToInit)?,
        };
        let variant = variants.get(index).ok_or(RuntimeError::NoVariantToInit)?;
        let protocol_version = initial_state.protocol_version().max(variant.since_version());

        // a state from beyond the selected variant's range is migrated first.
        let (index, initial_state) =
            migrate_forward(&variants, index, initial_state, protocol_version)?;

        let (running, events) =
            start_variant(&variants, index, protocol_version, initial_state.clone()).await?;

        let states = ReplayBroadcast::new(capacity);
        let initial_state = initial_state.with_protocol_version(protocol_version);
        states.publish((protocol_version, initial_state.clone()));

        let (tx_progress, progress) = watch::channel(initial_state.progress());
        let (tx_current, current) = watch::channel(Some(running.handle()));

        let driver = Driver {
            variants,
            index,
            running: Some(running),
            events,
            last_state: initial_state,
            states: states.clone(),
            tx_progress,
            tx_current,
        };
        let mut scope = TaskScope::new("runtime");
        scope.spawn(|stop| driver.run(stop));

        Ok(Self {
            states,
            progress,
            current,
            driver: Mutex::new(Some(scope)),
        })
    }

    /// every state from the most recent one onward.  The stream ends with
    /// an error if the runtime fails, and without one after [Runtime::close].
    pub fn state_changes(&self) -> BoxStream<'static, Result<StateChange, RuntimeError>> {
        self.states.subscribe()
    }

    pub fn latest_state(&self) -> Option<StateChange> {
        self.states.latest()
    }

    pub fn progress(&self) -> SyncProgress {
        *self.progress.borrow()
    }

    pub fn progress_updates(&self) -> watch::Receiver<SyncProgress> {
        self.progress.clone()
    }

    pub fn current_variant(&self) -> Result<RunningVariantHandle, RuntimeError> {
        self.current.borrow().clone().ok_or(RuntimeError::ShutDown)
    }

    /// the implementation registered for the running variant, and a handle
    /// to that variant.
    pub fn dispatch<'a, T>(
        &self,
        implementations: &'a DispatchTable<T>,
    ) -> Result<(&'a T, RunningVariantHandle), RuntimeError> {
        let handle = self.current_variant()?;
        let implementation = implementations.get(handle.tag())?;
        Ok((implementation, handle))
    }

    /// stop the running variant and end the state stream.  Idempotent.
    pub async fn close(&self) {
        if let Some(scope) = self.driver.lock().await.take() {
            scope.close().await;
            tracing::info!("runtime closed");
        }
    }
}

/// the task that owns the running variant.
struct Driver {
    variants: Vec<Arc<dyn Variant>>,
    index: usize,
    running: Option<RunningVariant>,
    events: EventReceiver,

    /// most recent state of the running variant; what gets migrated.
    last_state: WalletState,

    states: ReplayBroadcast<StateChange, RuntimeError>,
    tx_progress: watch::Sender<SyncProgress>,
    tx_current: watch::Sender<Option<RunningVariantHandle>>,
}

impl Driver {
    async fn run(mut self, mut stop: StopSignal) {
        loop {
            let event = tokio::select! {
                _ = stop.stopped() => break,
                event = self.events.recv() => event,
            };

            let result = match event {
                Some(Ok(event)) => self.handle(event).await,
                Some(Err(e)) => Err(e),
                None => {
                    // the variant dropped its sender without failing.
                    tracing::warn!("variant event channel closed");
                    stop.stopped().await;
                    break;
                }
            };

            if let Err(e) = result {
                tracing::error!("runtime failed: {}", e);
                self.tx_current.send_replace(None);
                self.states.terminate(e);
                break;
            }
        }

        self.tx_current.send_replace(None);
        if let Some(running) = self.running.take() {
            running.shutdown().await;
        }
        self.states.finish();
    }

    fn current_version(&self) -> ProtocolVersion {
        self.running
            .as_ref()
            .map(|r| r.protocol_version())
            .unwrap_or(self.last_state.protocol_version())
    }

    fn publish_state(&mut self, protocol_version: ProtocolVersion, state: WalletState) {
        self.last_state = state.clone();
        self.states.publish((protocol_version, state));
    }

    async fn handle(&mut self, event: VariantEvent) -> Result<(), RuntimeError> {
        match event {
            VariantEvent::State(state) => {
                let version = self.current_version();
                self.publish_state(version, state);
            }
            VariantEvent::ProgressUpdate(progress) => {
                self.tx_progress.send_replace(progress);
            }
            VariantEvent::VersionChange(change) => self.change_version(change).await?,
        }
        Ok(())
    }

    fn resolve(&self, change: VersionChange) -> Result<ProtocolVersion, RuntimeError> {
        match change {
            VersionChange::Version(version) => Ok(version),
            VersionChange::Next => self
                .variants
                .get(self.index + 1)
                .map(|next| next.since_version())
                .ok_or(RuntimeError::NoVariantToInit),
        }
    }

    async fn change_version(&mut self, change: VersionChange) -> Result<(), RuntimeError> {
        let resolved = self.resolve(change)?;
        let Some(running) = self.running.as_mut() else {
            return Err(RuntimeError::ShutDown);
        };

        let range = running.valid_range();
        if range.contains(resolved) {
            tracing::debug!("variant {} now at protocol version {}", running.tag(), resolved);
            running.set_protocol_version(resolved);
            self.tx_current.send_replace(Some(running.handle()));
            return Ok(());
        }
        if resolved < range.start() {
            return Err(RuntimeError::Migration(format!(
                "protocol version {} precedes variant {} range {}",
                resolved,
                running.tag(),
                range
            )));
        }

        self.migrate(resolved).await
    }

    async fn migrate(&mut self, resolved: ProtocolVersion) -> Result<(), RuntimeError> {
        let Some(running) = self.running.take() else {
            return Err(RuntimeError::ShutDown);
        };
        let from = running.tag();
        let previous_version = running.protocol_version();
        running.shutdown().await;

        // whatever the variant reported before it stopped still belongs to
        // the stream, under its own version.
        while let Ok(event) = self.events.try_recv() {
            match event? {
                VariantEvent::State(state) => self.publish_state(previous_version, state),
                VariantEvent::ProgressUpdate(progress) => {
                    self.tx_progress.send_replace(progress);
                }
                VariantEvent::VersionChange(_) => {}
            }
        }

        tracing::debug!("variant {} stopped for protocol version {}", from, resolved);
        let (index, state) =
            migrate_forward(&self.variants, self.index, self.last_state.clone(), resolved)?;

        let (running, events) = start_variant(&self.variants, index, resolved, state.clone()).await?;
        self.index = index;
        self.events = events;
        self.tx_current.send_replace(Some(running.handle()));
        self.running = Some(running);
        self.publish_state(resolved, state.with_protocol_version(resolved));
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::Ordering;

    use futures::StreamExt;
    use macro_rules_attr::apply;

    use super::*;
    use crate::protocol::ledger::TokenType;
    use crate::tests::shared::empty_state;
    use crate::tests::shared::with_coin;
    use crate::tests::shared::ScriptStep;
    use crate::tests::shared::ScriptedVariant;
    use crate::tests::shared_tokio_runtime;

    fn v(n: u64) -> ProtocolVersion {
        ProtocolVersion::new(n)
    }

    async fn next_change(
        stream: &mut BoxStream<'static, Result<StateChange, RuntimeError>>,
    ) -> StateChange {
        stream.next().await.unwrap().unwrap()
    }

    #[apply(shared_tokio_runtime)]
    async fn empty_variant_list_cannot_init() {
        let result = Runtime::init(vec![], StartTag::Head, empty_state(), 8).await;
        assert_eq!(Some(RuntimeError::NoVariantToInit), result.err());
    }

    #[apply(shared_tokio_runtime)]
    async fn unknown_start_tag_cannot_init() {
        let (v1, _script) = ScriptedVariant::new(VariantTag::V1, v(0));
        let variants: Vec<Arc<dyn Variant>> = vec![v1];
        let result =
            Runtime::init(variants, StartTag::Tag(VariantTag::V2), empty_state(), 8).await;
        assert_eq!(Some(RuntimeError::NoVariantToInit), result.err());
    }

    #[apply(shared_tokio_runtime)]
    async fn states_are_republished_with_version() {
        let (v1, script) = ScriptedVariant::new(VariantTag::V1, v(3));
        let runtime = Runtime::init(vec![v1], StartTag::Head, empty_state(), 8)
            .await
            .unwrap();
        let mut stream = runtime.state_changes();

        let (version, initial) = next_change(&mut stream).await;
        assert_eq!(v(3), version);
        assert_eq!(v(3), initial.protocol_version());

        script.send(ScriptStep::Credit(TokenType::native(), 7)).unwrap();
        let (version, state) = next_change(&mut stream).await;
        assert_eq!(v(3), version);
        assert_eq!(7, state.available_balance(&TokenType::native()));

        runtime.close().await;
        assert!(stream.next().await.is_none());
    }

    #[apply(shared_tokio_runtime)]
    async fn migration_preserves_state_and_stream() {
        let (v1, script1) = ScriptedVariant::new(VariantTag::V1, v(0));
        let (v2, script2) = ScriptedVariant::new(VariantTag::V2, v(100));
        let variants: Vec<Arc<dyn Variant>> = vec![v1.clone(), v2.clone()];
        let runtime = Runtime::init(variants, StartTag::Head, empty_state(), 16)
            .await
            .unwrap();
        let mut stream = runtime.state_changes();
        assert_eq!(v(0), next_change(&mut stream).await.0);

        script1.send(ScriptStep::Credit(TokenType::native(), 5)).unwrap();
        let (version, before) = next_change(&mut stream).await;
        assert_eq!(v(0), version);

        script1
            .send(ScriptStep::VersionChange(VersionChange::Version(v(100))))
            .unwrap();
        let (version, migrated) = next_change(&mut stream).await;
        assert_eq!(v(100), version);
        assert_eq!(before.available_balances(), migrated.available_balances());

        assert_eq!(1, v2.migrations.load(Ordering::SeqCst));
        assert_eq!(0, v1.migrations.load(Ordering::SeqCst));
        assert_eq!(
            Some(before.available_balances()),
            v2.migrated_from().first().map(|s| s.available_balances())
        );

        assert_eq!(VariantTag::V2, runtime.current_variant().unwrap().tag());
        script2.send(ScriptStep::Credit(TokenType::native(), 1)).unwrap();
        let (version, after) = next_change(&mut stream).await;
        assert_eq!(v(100), version);
        assert_eq!(6, after.available_balance(&TokenType::native()));

        runtime.close().await;
    }

    #[apply(shared_tokio_runtime)]
    async fn init_migrates_a_state_beyond_the_start_variant() {
        let (v1, _script1) = ScriptedVariant::new(VariantTag::V1, v(0));
        let (v2, script2) = ScriptedVariant::new(VariantTag::V2, v(100));
        let variants: Vec<Arc<dyn Variant>> = vec![v1.clone(), v2.clone()];
        let state = with_coin(&empty_state(), TokenType::native(), 4).with_protocol_version(v(120));

        let runtime = Runtime::init(variants, StartTag::Tag(VariantTag::V1), state, 8)
            .await
            .unwrap();
        let mut stream = runtime.state_changes();

        let (version, initial) = next_change(&mut stream).await;
        assert_eq!(v(120), version);
        assert_eq!(4, initial.available_balance(&TokenType::native()));
        assert_eq!(VariantTag::V2, runtime.current_variant().unwrap().tag());
        assert_eq!(0, v1.migrations.load(Ordering::SeqCst));
        assert_eq!(1, v2.migrations.load(Ordering::SeqCst));

        script2.send(ScriptStep::Credit(TokenType::native(), 1)).unwrap();
        let (version, after) = next_change(&mut stream).await;
        assert_eq!(v(120), version);
        assert_eq!(5, after.available_balance(&TokenType::native()));

        runtime.close().await;
    }

    #[apply(shared_tokio_runtime)]
    async fn in_range_version_change_does_not_migrate() {
        let (v1, script1) = ScriptedVariant::new(VariantTag::V1, v(0));
        let (v2, _script2) = ScriptedVariant::new(VariantTag::V2, v(100));
        let variants: Vec<Arc<dyn Variant>> = vec![v1, v2.clone()];
        let runtime = Runtime::init(variants, StartTag::Head, empty_state(), 16)
            .await
            .unwrap();
        let mut stream = runtime.state_changes();
        next_change(&mut stream).await;

        script1
            .send(ScriptStep::VersionChange(VersionChange::Version(v(50))))
            .unwrap();
        script1.send(ScriptStep::Credit(TokenType::native(), 2)).unwrap();

        let (version, _) = next_change(&mut stream).await;
        assert_eq!(v(50), version);
        assert_eq!(0, v2.migrations.load(Ordering::SeqCst));
        assert_eq!(VariantTag::V1, runtime.current_variant().unwrap().tag());
        runtime.close().await;
    }

    #[apply(shared_tokio_runtime)]
    async fn next_on_last_variant_terminates_stream() {
        let (v1, script) = ScriptedVariant::new(VariantTag::V1, v(0));
        let runtime = Runtime::init(vec![v1], StartTag::Head, empty_state(), 8)
            .await
            .unwrap();
        let mut stream = runtime.state_changes();
        next_change(&mut stream).await;

        script
            .send(ScriptStep::VersionChange(VersionChange::Next))
            .unwrap();
        assert_eq!(
            Some(Err(RuntimeError::NoVariantToInit)),
            stream.next().await
        );
        assert!(stream.next().await.is_none());
        assert_eq!(Some(RuntimeError::ShutDown), runtime.current_variant().err());
    }

    #[apply(shared_tokio_runtime)]
    async fn variant_failure_is_terminal() {
        let (v1, script) = ScriptedVariant::new(VariantTag::V1, v(0));
        let runtime = Runtime::init(vec![v1], StartTag::Head, empty_state(), 8)
            .await
            .unwrap();
        let mut stream = runtime.state_changes();
        next_change(&mut stream).await;

        let error = RuntimeError::Migration("broken".to_string());
        script.send(ScriptStep::Fail(error.clone())).unwrap();
        assert_eq!(Some(Err(error.clone())), stream.next().await);

        // late subscribers see the error too
        let mut late = runtime.state_changes();
        assert_eq!(Some(Err(error)), late.next().await);
    }

    #[apply(shared_tokio_runtime)]
    async fn progress_updates_are_exposed() {
        let (v1, script) = ScriptedVariant::new(VariantTag::V1, v(0));
        let runtime = Runtime::init(vec![v1], StartTag::Head, empty_state(), 8)
            .await
            .unwrap();
        let mut updates = runtime.progress_updates();

        let progress = SyncProgress::default().with_indexer_progress(10, 8, 4);
        script.send(ScriptStep::Progress(progress)).unwrap();
        updates.changed().await.unwrap();
        assert_eq!(progress, runtime.progress());
        assert_eq!(2, runtime.progress().source_gap());
        runtime.close().await;
    }

    #[apply(shared_tokio_runtime)]
    async fn dispatch_picks_running_variant() {
        let (v1, _script) = ScriptedVariant::new(VariantTag::V1, v(0));
        let runtime = Runtime::init(vec![v1], StartTag::Head, empty_state(), 8)
            .await
            .unwrap();

        let table = DispatchTable::new().with(VariantTag::V1, "v1 implementation");
        let (implementation, handle) = runtime.dispatch(&table).unwrap();
        assert_eq!("v1 implementation", *implementation);
        assert_eq!(VariantTag::V1, handle.tag());

        let other = DispatchTable::new().with(VariantTag::V2, ());
        assert_eq!(
            Some(RuntimeError::NoImplementation(VariantTag::V1)),
            runtime.dispatch(&other).err()
        );

        runtime.close().await;
        runtime.close().await;
        assert_eq!(Some(RuntimeError::ShutDown), runtime.current_variant().err());
        assert!(handle
            .modify(|s| Ok::<_, RuntimeError>((s.clone(), ())))
            .await
            .is_err());
    }
}
