use super::error::RuntimeError;
use super::variant::VariantEvent;
use super::variant::VariantEventSender;
use crate::application::locks::tokio::AtomicRw;
use crate::application::locks::tokio::LOG_TOKIO_LOCK_EVENT_CB;
use crate::state::WalletState;

#[derive(Debug)]
struct CellInner {
    state: WalletState,
    closed: bool,
}

/// the live state of one running variant.
///
/// All mutation goes through [WalletStateCell::modify], which runs under the
/// cell's write lock.  Sync updates and coin booking therefore never
/// interleave, and no write is lost to a concurrent one.
#[derive(Debug, Clone)]
pub struct WalletStateCell {
    inner: AtomicRw<CellInner>,
    events: VariantEventSender,
}

impl WalletStateCell {
    pub fn new(state: WalletState, events: VariantEventSender) -> Self {
        let inner = CellInner {
            state,
            closed: false,
        };
        Self {
            inner: AtomicRw::from((inner, Some("wallet-state"), Some(LOG_TOKIO_LOCK_EVENT_CB))),
            events,
        }
    }

    pub async fn snapshot(&self) -> WalletState {
        self.inner.lock(|inner| inner.state.clone()).await
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock(|inner| inner.closed).await
    }

    /// refuse all further modifications.
    pub async fn close(&mut self) {
        self.inner.lock_mut(|inner| inner.closed = true).await;
    }

    /// replace the state with the one `f` derives from it.
    ///
    /// The new state is published while the write lock is still held, so
    /// the runtime receives states in the order they were stored.  Fails
    /// with [RuntimeError::VariantClosed] once the variant shut down; `f`
    /// is not called then.
    pub async fn modify<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        F: FnOnce(&WalletState) -> Result<(WalletState, R), E>,
        E: From<RuntimeError>,
    {
        let mut guard = self.inner.lock_guard_mut().await;
        if guard.closed {
            return Err(RuntimeError::VariantClosed.into());
        }

        let (state, result) = f(&guard.state)?;
        guard.state = state.clone();
        self.events.send(VariantEvent::State(state));
        Ok(result)
    }
}
