use std::fmt;
use std::time::Instant;

use tracing::{debug, error};

use crate::context::{Context, ContextPool};
use crate::error::{default_error_handler_arc, ErrorHandler};
use crate::middleware::Handler;
use crate::router::ParamVec;
use crate::server::{Request, ResponseSink};

/// Stage of one dispatch.
///
/// `Matched → ContextAcquired → ChainExecuting → {Completed | Failed} → ContextReleased`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Matched,
    ContextAcquired,
    ChainExecuting,
    /// The chain returned `Ok`.
    Completed,
    /// The chain returned an error and the error handler ran.
    Failed,
    ContextReleased,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Matched => "matched",
            DispatchState::ContextAcquired => "context_acquired",
            DispatchState::ChainExecuting => "chain_executing",
            DispatchState::Completed => "completed",
            DispatchState::Failed => "failed",
            DispatchState::ContextReleased => "context_released",
        };
        f.write_str(name)
    }
}

/// Summary of a finished dispatch, captured before the context was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Status written through the tracker, `0` if nothing was committed.
    pub status: u16,
    /// Body bytes written.
    pub size: u64,
    /// [`DispatchState::Completed`] or [`DispatchState::Failed`].
    pub outcome: DispatchState,
    /// Request id, if anything in the chain asked for it.
    pub request_id: Option<String>,
}

/// Runs composed chains against pooled contexts.
///
/// For every request the dispatcher acquires a context, binds the sink,
/// request and path params, runs the chain, hands a returned error to the
/// [`ErrorHandler`], fires the cancel signal and releases the context. Release
/// happens even if the chain or the error handler panics.
pub struct Dispatcher {
    pool: ContextPool,
    error_handler: ErrorHandler,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool.stats())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(pool: ContextPool, error_handler: ErrorHandler) -> Self {
        Self {
            pool,
            error_handler,
        }
    }

    /// Dispatcher with the default error handler.
    #[must_use]
    pub fn with_pool(pool: ContextPool) -> Self {
        Self::new(pool, default_error_handler_arc())
    }

    #[must_use]
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    pub fn dispatch(
        &self,
        chain: &Handler,
        sink: Box<dyn ResponseSink>,
        request: Request,
        params: ParamVec,
    ) -> DispatchReport {
        self.dispatch_with(chain, sink, request, params, |_| {})
    }

    /// Like [`dispatch`](Self::dispatch), running `prepare` on the bound
    /// context before the chain.
    pub fn dispatch_with<F>(
        &self,
        chain: &Handler,
        sink: Box<dyn ResponseSink>,
        request: Request,
        params: ParamVec,
        prepare: F,
    ) -> DispatchReport
    where
        F: FnOnce(&mut Context),
    {
        let start = Instant::now();
        debug!(
            state = %DispatchState::Matched,
            method = %request.method(),
            path = %request.uri().path(),
            params = params.len(),
            "Dispatch"
        );

        let report = {
            let mut ctx = self.pool.checkout();
            ctx.reset(sink, request, params);
            debug!(state = %DispatchState::ContextAcquired, "Dispatch");
            prepare(&mut *ctx);

            debug!(state = %DispatchState::ChainExecuting, "Dispatch");
            let outcome = match chain(&mut *ctx) {
                Ok(()) => DispatchState::Completed,
                Err(err) => {
                    error!(
                        request_id = ctx.cached_request_id().unwrap_or("-"),
                        method = %ctx.method(),
                        path = %ctx.path(),
                        error = %format!("{err:#}"),
                        "Chain returned an error"
                    );
                    (self.error_handler)(&mut *ctx, &err);
                    DispatchState::Failed
                }
            };

            let report = DispatchReport {
                status: ctx.response().status(),
                size: ctx.response().size(),
                outcome,
                request_id: ctx.cached_request_id().map(str::to_owned),
            };
            debug!(
                state = %outcome,
                status = report.status,
                size = report.size,
                "Dispatch"
            );
            report
            // `ctx` drops here: cancel, clear, back to the pool
        };

        debug!(
            state = %DispatchState::ContextReleased,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Dispatch"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CancelSignal, ContextServices};
    use crate::error::HttpError;
    use crate::middleware::handler_fn;
    use crate::server::Recorder;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        Dispatcher::with_pool(ContextPool::new(ContextServices::default(), 8))
    }

    fn request(path: &str) -> Request {
        http::Request::builder().uri(path).body(Vec::new()).unwrap()
    }

    #[test]
    fn test_completed_dispatch_reports_status() {
        let d = dispatcher();
        let rec = Recorder::new();
        let chain = handler_fn(|ctx| Ok(ctx.text(201, "made")?));
        let report = d.dispatch(&chain, Box::new(rec.clone()), request("/"), ParamVec::new());
        assert_eq!(report.outcome, DispatchState::Completed);
        assert_eq!(report.status, 201);
        assert_eq!(report.size, 4);
        assert_eq!(rec.body_string(), "made");
    }

    #[test]
    fn test_failed_dispatch_runs_error_handler() {
        let d = dispatcher();
        let rec = Recorder::new();
        let chain = handler_fn(|_| Err(HttpError::new(409, "conflict").into()));
        let report = d.dispatch(&chain, Box::new(rec.clone()), request("/"), ParamVec::new());
        assert_eq!(report.outcome, DispatchState::Failed);
        assert_eq!(rec.status(), Some(409));
        assert_eq!(rec.body_string(), "conflict");
    }

    #[test]
    fn test_cancel_fires_after_dispatch() {
        let d = dispatcher();
        let seen: Arc<Mutex<Option<CancelSignal>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let chain = handler_fn(move |ctx| {
            assert!(!ctx.is_cancelled());
            *slot.lock() = Some(ctx.cancel_signal());
            Ok(())
        });
        d.dispatch(&chain, Box::new(Recorder::new()), request("/"), ParamVec::new());
        let signal = seen.lock().take().unwrap();
        assert!(signal.is_cancelled());
        assert_eq!(d.pool().stats().idle, 1);
    }

    #[test]
    fn test_context_released_when_chain_panics() {
        let d = dispatcher();
        let chain = handler_fn(|_| panic!("handler exploded"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            d.dispatch(&chain, Box::new(Recorder::new()), request("/"), ParamVec::new())
        }));
        assert!(result.is_err());
        assert_eq!(d.pool().stats().idle, 1);
    }
}
