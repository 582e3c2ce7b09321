use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::core::{handler_fn, middleware_fn, Handler, Middleware};
use crate::context::Context;
use crate::error::classify;

/// Request counters shared by every chain the middleware is installed on.
///
/// All counters use relaxed atomics: values are eventually consistent and
/// never block a request.
///
/// ```rust
/// use std::sync::Arc;
/// use brrtchain::middleware::Metrics;
///
/// let metrics = Arc::new(Metrics::new());
/// let mw = metrics.middleware();
/// # let _ = mw;
/// assert_eq!(metrics.request_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Metrics {
    request_count: AtomicUsize,
    error_count: AtomicUsize,
    client_errors: AtomicUsize,
    server_errors: AtomicUsize,
    total_latency_ns: AtomicU64,
    stack_size: AtomicUsize,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Middleware feeding this instance.
    #[must_use]
    pub fn middleware(self: &Arc<Self>) -> Middleware {
        let metrics = Arc::clone(self);
        middleware_fn(move |next: Handler| {
            let metrics = Arc::clone(&metrics);
            handler_fn(move |ctx: &mut Context| {
                metrics.request_count.fetch_add(1, Ordering::Relaxed);
                let start = Instant::now();
                let result = next(ctx);
                let status = match &result {
                    Ok(()) => ctx.response().status(),
                    Err(err) => {
                        metrics.error_count.fetch_add(1, Ordering::Relaxed);
                        classify(err).0
                    }
                };
                metrics.record(status, start.elapsed());
                result
            })
        })
    }

    fn record(&self, status: u16, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        match status {
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        // record stack metrics for the current coroutine when available
        let size = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        self.stack_size.store(size, Ordering::Relaxed);
    }

    /// Total requests that entered the middleware.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Chains that returned an error.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Responses (or classified errors) in the 4xx range.
    #[must_use]
    pub fn client_errors(&self) -> usize {
        self.client_errors.load(Ordering::Relaxed)
    }

    /// Responses (or classified errors) in the 5xx range.
    #[must_use]
    pub fn server_errors(&self) -> usize {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// Mean processing time, zero before the first request.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Stack size of the coroutine that served the last request.
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }
}
