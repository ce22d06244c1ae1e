//! Provides a simplified tokio `RwLock` wrapper for sharing data between tasks
//!
//! Every mutation of live wallet state goes through an [AtomicRw] write
//! guard, which makes read-modify-write sequences such as coin selection plus
//! booking indivisible with respect to the sync task.

mod atomic_rw;
mod shared;

pub use atomic_rw::AtomicRw;
pub use atomic_rw::AtomicRwWriteGuard;
use shared::now;
pub use shared::log_lock_event;
pub use shared::LockAcquisition;
pub use shared::LockCallbackFn;
use shared::LockCallbackInfo;
pub use shared::LockEvent;
pub use shared::LockInfo;
pub use shared::LOG_TOKIO_LOCK_EVENT_CB;
