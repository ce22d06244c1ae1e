//! fan-out channel that remembers its most recent value.
//!
//! A [ReplayBroadcast] behaves like a tokio broadcast channel, except that a
//! new subscriber first receives the value most recently published, so a late
//! subscriber is never left waiting for the next change.  The channel can be
//! terminated with an error; every subscriber (current and future) then
//! receives that error as its final item.  A channel can also be finished,
//! which ends every stream without an error.

use std::sync::Arc;
use std::sync::Mutex;

use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Clone)]
enum Item<T, E> {
    Value(T),
    Terminated(E),
    Finished,
}

#[derive(Debug)]
struct Slot<T, E> {
    latest: Option<T>,
    terminated: Option<E>,
    finished: bool,
}

impl<T, E> Slot<T, E> {
    fn is_closed(&self) -> bool {
        self.finished || self.terminated.is_some()
    }
}

#[derive(Debug)]
struct Inner<T, E> {
    tx: broadcast::Sender<Item<T, E>>,

    // the lock is held while publishing so that a concurrent subscribe()
    // observes either the old value plus the new one, or only the new one.
    slot: Mutex<Slot<T, E>>,
}

/// broadcast channel with last-value replay and terminal errors.
#[derive(Debug)]
pub struct ReplayBroadcast<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for ReplayBroadcast<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> ReplayBroadcast<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// `capacity` bounds how far a slow subscriber may lag before it starts
    /// skipping intermediate values.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tx,
                slot: Mutex::new(Slot {
                    latest: None,
                    terminated: None,
                    finished: false,
                }),
            }),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Slot<T, E>> {
        self.inner.slot.lock().expect("lock should not be poisoned")
    }

    /// publish a value.  Returns `false` if the channel was already
    /// terminated or finished, in which case the value is discarded.
    pub fn publish(&self, value: T) -> bool {
        let mut slot = self.slot();
        if slot.is_closed() {
            return false;
        }
        slot.latest = Some(value.clone());

        // an error only means there are no subscribers right now.
        let _ = self.inner.tx.send(Item::Value(value));
        true
    }

    /// terminate the channel with an error.  Only the first termination
    /// takes effect.
    pub fn terminate(&self, error: E) {
        let mut slot = self.slot();
        if slot.is_closed() {
            return;
        }
        slot.terminated = Some(error.clone());
        let _ = self.inner.tx.send(Item::Terminated(error));
    }

    /// end the channel without an error.  Subscribers see their stream end
    /// after the last value.
    pub fn finish(&self) {
        let mut slot = self.slot();
        if slot.is_closed() {
            return;
        }
        slot.finished = true;
        let _ = self.inner.tx.send(Item::Finished);
    }

    /// the most recently published value, unless the channel terminated
    /// with an error.
    pub fn latest(&self) -> Option<T> {
        let slot = self.slot();
        match slot.terminated {
            Some(_) => None,
            None => slot.latest.clone(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.slot().terminated.is_some()
    }

    /// subscribe from the most recent value onward.
    ///
    /// The stream ends after yielding a terminal error, after the channel
    /// is finished, or when every publisher handle has been dropped.
    pub fn subscribe(&self) -> BoxStream<'static, Result<T, E>> {
        let (replay, mut rx) = {
            let slot = self.slot();
            let replay = match (&slot.terminated, &slot.latest) {
                (Some(e), _) => vec![Item::Terminated(e.clone())],
                (None, Some(v)) if slot.finished => vec![Item::Value(v.clone()), Item::Finished],
                (None, Some(v)) => vec![Item::Value(v.clone())],
                (None, None) if slot.finished => vec![Item::Finished],
                (None, None) => vec![],
            };
            (replay, self.inner.tx.subscribe())
        };

        Box::pin(async_stream::stream! {
            let mut done = false;
            for item in replay {
                match item {
                    Item::Value(v) => yield Ok(v),
                    Item::Terminated(e) => {
                        done = true;
                        yield Err(e);
                    }
                    Item::Finished => done = true,
                }
            }

            while !done {
                match rx.recv().await {
                    Ok(Item::Value(v)) => yield Ok(v),
                    Ok(Item::Terminated(e)) => {
                        done = true;
                        yield Err(e);
                    }
                    Ok(Item::Finished) | Err(RecvError::Closed) => done = true,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("subscriber lagged, skipped {} value(s)", skipped);
                    }
                }
            }
        })
    }
}
