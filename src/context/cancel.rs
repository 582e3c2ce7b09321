use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use may::sync::SyncFlag;

/// One-shot cancellation signal with a "done" notification.
///
/// Clones share state. The first [`cancel`](Self::cancel) fires the signal and
/// wakes every waiter; later calls return `false` and change nothing. Waiting
/// works from both may coroutines and plain threads.
#[derive(Clone)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    done: SyncFlag,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                done: SyncFlag::new(),
            }),
        }
    }

    /// Fire the signal. Returns `true` only for the call that transitioned it.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.done.fire();
        true
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.done.wait();
    }

    /// Block for at most `timeout`. Returns whether the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        self.inner.done.wait_timeout(timeout);
        self.is_cancelled()
    }

    /// Whether `other` is a handle to the same signal.
    #[must_use]
    pub fn same_as(&self, other: &CancelSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
