//! # Errors
//!
//! Two layers of failure flow through a request:
//!
//! - [`Error`] covers the framework's own operations (emitting on an inactive
//!   context, bad redirect codes, serialization and I/O failures).
//! - Handlers and middleware return [`anyhow::Result`]. Any error type can
//!   travel up the chain; an [`HttpError`] among them chooses the status code.
//!
//! When a chain returns an error, the application's [`ErrorHandler`] turns it
//! into a response. [`classify`] is the mapping the default handler uses.

use std::io;
use std::sync::Arc;

use crate::context::Context;
use crate::server::{status_reason, CapabilityError};

/// Framework operation failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Emission or request access on a context that is not serving a request.
    #[error("context is not bound to an active request")]
    NoActiveContext,
    /// Redirect status outside `300..=307`.
    #[error("invalid redirect code {0}: expected 300..=307")]
    InvalidRedirectCode(u16),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("response write failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    /// Header name or value rejected by the HTTP layer.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error carrying an explicit HTTP status code and message.
///
/// Returned from a handler, it is rendered by the default error handler as
/// that status code with the message as a `text/plain` body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} {message}")]
pub struct HttpError {
    pub code: u16,
    pub message: String,
}

impl HttpError {
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Use the canonical reason phrase of `code` as the message.
    #[must_use]
    pub fn from_status(code: u16) -> Self {
        Self::new(code, status_reason(code))
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::from_status(404)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }
}

/// Result type returned by handlers and middleware.
pub type HandlerResult = anyhow::Result<()>;

/// Converts a chain error into a response.
///
/// Invoked only after the chain returned an error, with the same context.
pub type ErrorHandler = Arc<dyn Fn(&mut Context, &anyhow::Error) + Send + Sync>;

/// Status code and message for a chain error.
///
/// An [`HttpError`] anywhere in the error's chain keeps its own code and message.
/// Everything else becomes `500 Internal Server Error`.
#[must_use]
pub fn classify(err: &anyhow::Error) -> (u16, String) {
    match err.chain().find_map(|cause| cause.downcast_ref::<HttpError>()) {
        Some(http) => (http.code, http.message.clone()),
        None => (500, status_reason(500).to_string()),
    }
}

/// Writes the classified status and message as `text/plain`.
///
/// Does nothing when the response is already committed. Errors are logged
/// through the context's logger at `ERROR` for server errors and `WARN` otherwise.
pub fn default_error_handler(ctx: &mut Context, err: &anyhow::Error) {
    let (code, message) = classify(err);
    let logger = ctx.logger();
    if code >= 500 {
        logger.error(ctx, format_args!("{} {}: {:#}", ctx.method(), ctx.path(), err));
    } else {
        logger.warn(ctx, format_args!("{} {}: {:#}", ctx.method(), ctx.path(), err));
    }
    if ctx.response().committed() {
        tracing::debug!(code, "Response already committed - error not rendered");
        return;
    }
    if let Err(write_err) = ctx.text(code, &message) {
        tracing::warn!(error = %write_err, code, "Error response could not be written");
    }
}

/// The default handler as an [`ErrorHandler`].
#[must_use]
pub fn default_error_handler_arc() -> ErrorHandler {
    Arc::new(default_error_handler)
}
