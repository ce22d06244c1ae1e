/// Indicates how a lock was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    Read,
    Write,
}

impl std::fmt::Display for LockAcquisition {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "Read"),
            Self::Write => write!(f, "Write"),
        }
    }
}

/// Contains metadata about a lock
#[derive(Debug, Clone, Copy)]
pub struct LockInfo<'a> {
    name: Option<&'a str>,
}

impl LockInfo<'_> {
    /// get the lock's name
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name
    }
}

#[derive(Debug, Clone)]
pub(super) struct LockCallbackInfo {
    pub name: Option<String>,
    pub lock_callback_fn: Option<LockCallbackFn>,
}

impl LockCallbackInfo {
    #[inline]
    pub fn new(name: Option<String>, lock_callback_fn: Option<LockCallbackFn>) -> Self {
        Self {
            name,
            lock_callback_fn,
        }
    }

    #[inline]
    pub fn info(&self) -> LockInfo<'_> {
        LockInfo {
            name: self.name.as_deref(),
        }
    }

    pub fn notify_try_acquire(&self, acquisition: LockAcquisition) {
        if let Some(cb) = self.lock_callback_fn {
            cb(LockEvent::TryAcquire {
                info: self.info(),
                acquisition,
            });
        }
    }

    pub fn notify_acquire(
        &self,
        acquisition: LockAcquisition,
        try_acquire_at: Option<std::time::Instant>,
    ) {
        if let Some(cb) = self.lock_callback_fn {
            cb(LockEvent::Acquire {
                info: self.info(),
                acquisition,
                try_acquire_at,
            });
        }
    }

    pub fn notify_release(
        &self,
        acquisition: LockAcquisition,
        acquire_at: Option<std::time::Instant>,
    ) {
        if let Some(cb) = self.lock_callback_fn {
            cb(LockEvent::Release {
                info: self.info(),
                acquisition,
                acquire_at,
            });
        }
    }
}

/// Represents an event (acquire/release) for a lock
#[derive(Debug, Clone)]
pub enum LockEvent<'a> {
    TryAcquire {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
    },
    Acquire {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
        try_acquire_at: Option<std::time::Instant>,
    },
    Release {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
        acquire_at: Option<std::time::Instant>,
    },
}

impl LockEvent<'_> {
    pub fn event_type_name(&self) -> &str {
        match self {
            Self::TryAcquire { .. } => "TryAcquire",
            Self::Acquire { .. } => "Acquire",
            Self::Release { .. } => "Release",
        }
    }

    pub fn info(&self) -> &LockInfo<'_> {
        match self {
            Self::TryAcquire { info, .. } => info,
            Self::Acquire { info, .. } => info,
            Self::Release { info, .. } => info,
        }
    }

    pub fn acquisition(&self) -> LockAcquisition {
        match self {
            Self::TryAcquire { acquisition, .. } => *acquisition,
            Self::Acquire { acquisition, .. } => *acquisition,
            Self::Release { acquisition, .. } => *acquisition,
        }
    }
}

/// A callback fn for receiving [LockEvent] event
/// each time a lock is acquired or released.
pub type LockCallbackFn = fn(lock_event: LockEvent);

/// logs lock events at trace level.  Slow releases are logged as warnings
/// when the `track-lock-time` feature is enabled.
pub fn log_lock_event(lock_event: LockEvent) {
    let name = lock_event.info().name().unwrap_or("?");
    match &lock_event {
        LockEvent::Release {
            acquire_at: Some(acquired),
            ..
        } if acquired.elapsed() > std::time::Duration::from_millis(100) => {
            tracing::warn!(
                "{} lock `{}` was held for {:?}",
                lock_event.acquisition(),
                name,
                acquired.elapsed()
            );
        }
        _ => tracing::trace!(
            "{} lock `{}` for `{}`",
            lock_event.event_type_name(),
            name,
            lock_event.acquisition()
        ),
    }
}

pub const LOG_TOKIO_LOCK_EVENT_CB: LockCallbackFn = log_lock_event;

#[inline]
pub(super) fn now() -> Option<std::time::Instant> {
    cfg!(feature = "track-lock-time").then(std::time::Instant::now)
}
