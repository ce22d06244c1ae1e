//! cancellation scopes for background tasks.
//!
//! Each running protocol variant owns exactly one [TaskScope].  Closing the
//! scope signals every task spawned into it to stop and then waits for them
//! to finish, so no subscription outlives the variant that opened it.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// receiving half of a scope's stop signal, handed to every spawned task.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx_stop: watch::Receiver<bool>,
}

impl StopSignal {
    /// resolves once the owning scope is closed (or dropped).
    pub async fn stopped(&mut self) {
        // an error means the sender is gone, which also means stop.
        let _ = self.rx_stop.wait_for(|stop| *stop).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx_stop.borrow()
    }
}

/// owns a set of spawned tasks that share one stop signal.
#[derive(Debug)]
pub struct TaskScope {
    name: String,

    /// channel to inform spawned tasks to stop processing.
    tx_stop: watch::Sender<bool>,

    handles: Vec<JoinHandle<()>>,
}

// we implement Drop so that tasks of a scope that was never explicitly
// closed are still told to stop.
impl Drop for TaskScope {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!("scope `{}` dropped without close()", self.name);
            self.tx_stop.send_replace(true);
            for handle in &self.handles {
                handle.abort();
            }
        }
    }
}

impl TaskScope {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx_stop, _) = watch::channel(false);
        Self {
            name: name.into(),
            tx_stop,
            handles: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// obtain a stop signal tied to this scope.
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            rx_stop: self.tx_stop.subscribe(),
        }
    }

    /// spawn a task into the scope.  The task receives the scope's stop
    /// signal and must return once it fires.  It runs inside the caller's
    /// current span.
    pub fn spawn<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.stop_signal()).in_current_span());
        self.handles.push(handle);
    }

    pub fn num_tasks(&self) -> usize {
        self.handles.len()
    }

    /// signal all tasks to stop and wait for each to complete.
    pub async fn close(mut self) {
        tracing::debug!(
            "closing scope `{}` with {} task(s)",
            self.name,
            self.handles.len()
        );

        self.tx_stop.send_replace(true);

        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("task in scope `{}` panicked: {}", self.name, e);
                }
            }
        }
    }
}
