//! # Application Logger
//!
//! Handlers and middleware log through the narrow [`Logger`] interface: a level,
//! the request [`Context`] and a formatted message. The framework never assumes
//! a concrete backend.
//!
//! Two implementations ship with the crate:
//!
//! - [`TracingLogger`] (the default) forwards to `tracing` with the request id attached
//! - [`WriterLogger`] writes `[LEVEL] message` lines to plain writers;
//!   `DEBUG`/`INFO` go to the out writer, `WARN`/`ERROR`/`FATAL` to the err writer
//!
//! A logger is injected per application through
//! [`AppConfig`](crate::app::AppConfig) and can be overridden for the rest of a
//! chain with [`Context::set_logger`].

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::context::Context;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Whether this level belongs on the error stream.
    #[must_use]
    pub fn is_error_stream(&self) -> bool {
        *self >= Level::Warn
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leveled, context-aware log sink.
pub trait Logger: Send + Sync {
    fn log(&self, ctx: &Context, level: Level, message: fmt::Arguments<'_>);

    fn debug(&self, ctx: &Context, message: fmt::Arguments<'_>) {
        self.log(ctx, Level::Debug, message);
    }

    fn info(&self, ctx: &Context, message: fmt::Arguments<'_>) {
        self.log(ctx, Level::Info, message);
    }

    fn warn(&self, ctx: &Context, message: fmt::Arguments<'_>) {
        self.log(ctx, Level::Warn, message);
    }

    fn error(&self, ctx: &Context, message: fmt::Arguments<'_>) {
        self.log(ctx, Level::Error, message);
    }

    fn fatal(&self, ctx: &Context, message: fmt::Arguments<'_>) {
        self.log(ctx, Level::Fatal, message);
    }
}

pub type SharedLogger = Arc<dyn Logger>;

static DEFAULT_LOGGER: Lazy<SharedLogger> = Lazy::new(|| Arc::new(TracingLogger));

/// The crate-wide fallback logger ([`TracingLogger`]).
#[must_use]
pub fn default_logger() -> SharedLogger {
    Arc::clone(&DEFAULT_LOGGER)
}

/// Forwards to `tracing` events under the `brrtchain::app` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, ctx: &Context, level: Level, message: fmt::Arguments<'_>) {
        let request_id = ctx.cached_request_id().unwrap_or("-");
        match level {
            Level::Debug => tracing::debug!(target: "brrtchain::app", request_id = %request_id, "{}", message),
            Level::Info => tracing::info!(target: "brrtchain::app", request_id = %request_id, "{}", message),
            Level::Warn => tracing::warn!(target: "brrtchain::app", request_id = %request_id, "{}", message),
            Level::Error => tracing::error!(target: "brrtchain::app", request_id = %request_id, "{}", message),
            Level::Fatal => {
                tracing::error!(target: "brrtchain::app", request_id = %request_id, fatal = true, "{}", message)
            }
        }
    }
}

type BoxedWriter = Box<dyn Write + Send>;

/// Writes `[LEVEL] message\n` lines to an out and an err writer.
pub struct WriterLogger {
    out: Mutex<BoxedWriter>,
    err: Mutex<BoxedWriter>,
}

impl fmt::Debug for WriterLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLogger").finish_non_exhaustive()
    }
}

impl Default for WriterLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterLogger {
    /// stdout / stderr.
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: Mutex::new(Box::new(io::stdout())),
            err: Mutex::new(Box::new(io::stderr())),
        }
    }

    #[must_use]
    pub fn with_out<W: Write + Send + 'static>(mut self, out: W) -> Self {
        self.out = Mutex::new(Box::new(out));
        self
    }

    #[must_use]
    pub fn with_err<W: Write + Send + 'static>(mut self, err: W) -> Self {
        self.err = Mutex::new(Box::new(err));
        self
    }

    fn write_line(&self, level: Level, message: fmt::Arguments<'_>) -> io::Result<()> {
        let writer = if level.is_error_stream() {
            &self.err
        } else {
            &self.out
        };
        let mut w = writer.lock();
        writeln!(w, "[{}] {}", level, message)?;
        w.flush()
    }
}

impl Logger for WriterLogger {
    fn log(&self, _ctx: &Context, level: Level, message: fmt::Arguments<'_>) {
        if let Err(err) = self.write_line(level, message) {
            tracing::warn!(error = %err, level = %level, "Log line could not be written");
        }
    }
}
