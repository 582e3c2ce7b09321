use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::core::{Context, ContextServices};

/// Default number of idle contexts kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Counters describing pool behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Contexts allocated because the free list was empty.
    pub created: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Contexts currently idle in the free list.
    pub idle: usize,
}

/// Free list of request contexts.
///
/// [`acquire`](Self::acquire) hands out an inactive context;
/// [`release`](Self::release) clears it and keeps it for the next request
/// unless the pool is already at capacity. Callers must not retain anything
/// borrowed from a context after releasing it.
pub struct ContextPool {
    free: Mutex<Vec<Box<Context>>>,
    capacity: usize,
    services: ContextServices,
    created: AtomicU64,
    reused: AtomicU64,
}

impl ContextPool {
    #[must_use]
    pub fn new(services: ContextServices, capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
            services,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    pub fn acquire(&self) -> Box<Context> {
        let pooled = self.free.lock().pop();
        match pooled {
            Some(ctx) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                ctx
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                Box::new(Context::new(self.services.clone()))
            }
        }
    }

    pub fn release(&self, mut ctx: Box<Context>) {
        ctx.clear();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(ctx);
        } else {
            debug!(capacity = self.capacity, "Context pool full - dropping context");
        }
    }

    /// Acquire a context that goes back to the pool when the guard drops,
    /// including on unwind.
    pub fn checkout(&self) -> PooledContext<'_> {
        PooledContext {
            pool: self,
            ctx: Some(self.acquire()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.free.lock().len(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Context on loan from a [`ContextPool`].
///
/// Dropping the guard fires the context's cancel signal and releases it.
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    ctx: Option<Box<Context>>,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        // Only `Drop` takes the context out.
        match self.ctx.as_deref() {
            Some(ctx) => ctx,
            None => unreachable_context(),
        }
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        match self.ctx.as_deref_mut() {
            Some(ctx) => ctx,
            None => unreachable_context(),
        }
    }
}

#[cold]
#[allow(clippy::panic)]
fn unreachable_context() -> ! {
    panic!("pooled context accessed after release")
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.cancel();
            self.pool.release(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ParamVec;
    use crate::server::Recorder;

    fn request() -> crate::server::Request {
        http::Request::builder().uri("/").body(Vec::new()).unwrap()
    }

    #[test]
    fn test_release_then_acquire_reuses() {
        let pool = ContextPool::new(ContextServices::default(), 4);
        let ctx = pool.acquire();
        pool.release(ctx);
        let _ctx = pool.acquire();
        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn test_capacity_caps_idle_contexts() {
        let pool = ContextPool::new(ContextServices::default(), 1);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn test_released_context_is_cleared() {
        let pool = ContextPool::new(ContextServices::default(), 4);
        {
            let mut ctx = pool.checkout();
            ctx.reset(Box::new(Recorder::new()), request(), ParamVec::new());
            ctx.insert(7u32);
            assert!(ctx.is_active());
        }
        let ctx = pool.acquire();
        assert!(!ctx.is_active());
        assert!(ctx.get::<u32>().is_none());
        assert!(!ctx.response().is_bound());
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_checkout_releases_on_panic() {
        let pool = ContextPool::new(ContextServices::default(), 4);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = pool.checkout();
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(pool.stats().idle, 1);
    }
}
