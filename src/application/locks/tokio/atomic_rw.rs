// [track_caller] is not (yet?) available for async fn in stable rust.
// it is available in nightly rust with the async_fn_track_caller
// feature flag.  To enable the feature build with
// cargo +nightly build --features track-lock-location

use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::sync::RwLockWriteGuard;

use super::now;
use super::LockAcquisition;
use super::LockCallbackFn;
use super::LockCallbackInfo;

/// An `Arc<RwLock<T>>` wrapper to make data thread-safe and easy to work with.
///
/// # Examples
/// ```
/// # use shielded_wallet::application::locks::tokio::AtomicRw;
/// struct Tally {
///     coins: u16,
/// };
/// # tokio_test::block_on(async {
/// let mut atomic_tally = AtomicRw::from(Tally{coins: 3});
/// atomic_tally.lock(|t| {println!("coins: {}", t.coins)}).await;
/// atomic_tally.lock_mut(|t| {t.coins = 4}).await;
/// # })
/// ```
///
/// A name and a callback fn may be provided during instantiation so the
/// application can trace lock acquisitions, eg with
/// [LOG_TOKIO_LOCK_EVENT_CB](super::LOG_TOKIO_LOCK_EVENT_CB).
#[derive(Debug)]
pub struct AtomicRw<T> {
    inner: Arc<RwLock<T>>,
    lock_callback_info: LockCallbackInfo,
}

impl<T: Default> Default for AtomicRw<T> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
            lock_callback_info: LockCallbackInfo::new(None, None),
        }
    }
}

impl<T> From<T> for AtomicRw<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(t)),
            lock_callback_info: LockCallbackInfo::new(None, None),
        }
    }
}

impl<T> From<(T, Option<&str>, Option<LockCallbackFn>)> for AtomicRw<T> {
    /// Create from a name ref and an optional callback function, which
    /// is called when a lock event occurs.
    #[inline]
    fn from(v: (T, Option<&str>, Option<LockCallbackFn>)) -> Self {
        Self {
            inner: Arc::new(RwLock::new(v.0)),
            lock_callback_info: LockCallbackInfo::new(v.1.map(|s| s.to_owned()), v.2),
        }
    }
}

impl<T> Clone for AtomicRw<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            lock_callback_info: self.lock_callback_info.clone(),
        }
    }
}

impl<T> AtomicRw<T> {
    /// Acquire write lock and return an `AtomicRwWriteGuard`
    ///
    /// `&mut self` makes the mutation explicit at the call site; clones of an
    /// `AtomicRw` share the same underlying lock.
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    pub async fn lock_guard_mut(&mut self) -> AtomicRwWriteGuard<'_, T> {
        self.lock_callback_info
            .notify_try_acquire(LockAcquisition::Write);

        let try_acquire_at = now();
        let guard = self.inner.write().await;
        AtomicRwWriteGuard::new(guard, &self.lock_callback_info, try_acquire_at)
    }

    /// Immutably access the data of type `T` in a closure and possibly return a result of type `R`
    ///
    /// # Examples
    /// ```
    /// # use shielded_wallet::application::locks::tokio::AtomicRw;
    /// # tokio_test::block_on(async {
    /// let atomic_height = AtomicRw::from(17u64);
    /// let height = atomic_height.lock(|h| *h).await;
    /// assert_eq!(height, 17);
    /// # })
    /// ```
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.lock_callback_info
            .notify_try_acquire(LockAcquisition::Read);

        let try_acquire_at = now();
        let guard = self.inner.read().await;
        self.lock_callback_info
            .notify_acquire(LockAcquisition::Read, try_acquire_at);

        let acquire_at = now();
        let result = f(&guard);
        drop(guard);
        self.lock_callback_info
            .notify_release(LockAcquisition::Read, acquire_at);
        result
    }

    /// Mutably access the data of type `T` in a closure and possibly return a result of type `R`
    ///
    /// # Examples
    /// ```
    /// # use shielded_wallet::application::locks::tokio::AtomicRw;
    /// # tokio_test::block_on(async {
    /// let mut atomic_height = AtomicRw::from(17u64);
    /// let height = atomic_height.lock_mut(|h| {*h += 1; *h}).await;
    /// assert_eq!(height, 18);
    /// # })
    /// ```
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    pub async fn lock_mut<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock_guard_mut().await;
        f(&mut guard)
    }

    /// retrieve lock name if present, or None
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.lock_callback_info.name.as_deref()
    }
}

/// A wrapper for [RwLockWriteGuard] that can optionally call a callback to
/// notify when the lock event occurs.
#[derive(Debug)]
pub struct AtomicRwWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    lock_callback_info: &'a LockCallbackInfo,
    acquire_at: Option<std::time::Instant>,
}

impl<'a, T> AtomicRwWriteGuard<'a, T> {
    fn new(
        guard: RwLockWriteGuard<'a, T>,
        lock_callback_info: &'a LockCallbackInfo,
        try_acquire_at: Option<std::time::Instant>,
    ) -> Self {
        lock_callback_info.notify_acquire(LockAcquisition::Write, try_acquire_at);
        Self {
            guard,
            lock_callback_info,
            acquire_at: now(),
        }
    }
}

impl<T> Drop for AtomicRwWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock_callback_info
            .notify_release(LockAcquisition::Write, self.acquire_at);
    }
}

impl<T> Deref for AtomicRwWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for AtomicRwWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
