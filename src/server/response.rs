//! Response state tracking.
//!
//! [`ResponseSink`] is the transport-facing writer a request is answered through.
//! [`ResponseTracker`] wraps one sink per request and records the status code,
//! the number of body bytes written and whether headers have been committed.
//!
//! ## Commit rules
//!
//! - The first [`ResponseTracker::write_header`] wins. Every later call is a no-op.
//! - A body write before any header write commits status `200` implicitly.
//! - Once committed, header mutations are ignored.
//!
//! ## Transport capabilities
//!
//! Flushing, connection hijacking and close notification are optional. The
//! tracker passes them through to the sink untouched; a sink that lacks one
//! reports [`CapabilityError::Unsupported`] instead of silently succeeding.

use std::fmt;
use std::io;

use http::{HeaderName, HeaderValue, StatusCode};
use tracing::{debug, warn};

use crate::context::CancelSignal;

/// Optional capability a [`ResponseSink`] may offer beyond plain writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Push buffered bytes to the client immediately.
    Flush,
    /// Take over the raw connection.
    Hijack,
    /// Observe the peer closing the connection.
    CloseNotify,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Flush => "flush",
            Capability::Hijack => "hijack",
            Capability::CloseNotify => "close notification",
        };
        f.write_str(name)
    }
}

/// Failure of an optional transport capability.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// The bound sink does not implement the capability.
    #[error("response sink does not support {0}")]
    Unsupported(Capability),
    /// No sink is bound (the context is not serving a request).
    #[error("response tracker is not bound to a sink")]
    Detached,
    /// The sink supports the capability but the operation failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// A raw bidirectional connection handed out by [`ResponseSink::hijack`].
pub trait Connection: io::Read + io::Write + Send {}

impl<T: io::Read + io::Write + Send> Connection for T {}

/// Owned hijacked connection.
pub type HijackedConnection = Box<dyn Connection>;

/// Transport-level response writer.
///
/// Implementations only need the four header/body primitives. Capabilities
/// default to [`CapabilityError::Unsupported`].
pub trait ResponseSink: Send {
    /// Current value of a response header, if set.
    fn header(&self, name: &HeaderName) -> Option<HeaderValue>;

    /// Replace all values of a header.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Add a value without removing existing ones.
    fn append_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Drop every value of a header.
    fn remove_header(&mut self, name: &HeaderName);

    /// Emit the status line and headers.
    fn write_header(&mut self, status: u16);

    /// Write body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&mut self) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unsupported(Capability::Flush))
    }

    fn hijack(&mut self) -> Result<HijackedConnection, CapabilityError> {
        Err(CapabilityError::Unsupported(Capability::Hijack))
    }

    /// Signal fired when the peer goes away.
    fn close_notify(&mut self) -> Result<CancelSignal, CapabilityError> {
        Err(CapabilityError::Unsupported(Capability::CloseNotify))
    }
}

/// Canonical reason phrase for a status code (`500` → `"Internal Server Error"`).
///
/// Unknown codes map to an empty string.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// Per-request response state machine wrapping a [`ResponseSink`].
#[derive(Default)]
pub struct ResponseTracker {
    sink: Option<Box<dyn ResponseSink>>,
    status: u16,
    size: u64,
    committed: bool,
}

impl fmt::Debug for ResponseTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseTracker")
            .field("bound", &self.sink.is_some())
            .field("status", &self.status)
            .field("size", &self.size)
            .field("committed", &self.committed)
            .finish()
    }
}

impl ResponseTracker {
    /// Tracker with no sink bound. Writes fail until [`reset`](Self::reset).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker bound to `sink`.
    #[must_use]
    pub fn bound(sink: Box<dyn ResponseSink>) -> Self {
        let mut tracker = Self::new();
        tracker.reset(sink);
        tracker
    }

    /// Rebind to a new sink and zero status, size and the commit flag.
    pub fn reset(&mut self, sink: Box<dyn ResponseSink>) {
        self.sink = Some(sink);
        self.status = 0;
        self.size = 0;
        self.committed = false;
    }

    /// Unbind the sink, returning it. State is zeroed.
    pub fn detach(&mut self) -> Option<Box<dyn ResponseSink>> {
        self.status = 0;
        self.size = 0;
        self.committed = false;
        self.sink.take()
    }

    #[inline]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.sink.is_some()
    }

    /// Status code written, `0` until committed.
    #[inline]
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Body bytes written so far.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn committed(&self) -> bool {
        self.committed
    }

    /// Commit `code`. No-op when already committed.
    pub fn write_header(&mut self, code: u16) {
        if self.committed {
            debug!(
                status = self.status,
                ignored_status = code,
                "Response already committed - header write ignored"
            );
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            warn!(status = code, "Header write without a bound sink");
            return;
        };
        self.status = code;
        sink.write_header(code);
        self.committed = true;
    }

    /// Write body bytes, committing `200` first when nothing was committed yet.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sink.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "response tracker is not bound to a sink",
            ));
        }
        if !self.committed {
            self.write_header(200);
        }
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let n = sink.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    /// Write the whole buffer, retrying short writes.
    pub fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        if buf.is_empty() {
            self.write(buf)?;
            return Ok(());
        }
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.sink.as_ref().and_then(|s| s.header(name))
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if let Some(sink) = self.header_sink(&name) {
            sink.set_header(name, value);
        }
    }

    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        if let Some(sink) = self.header_sink(&name) {
            sink.append_header(name, value);
        }
    }

    pub fn remove_header(&mut self, name: &HeaderName) {
        if let Some(sink) = self.header_sink(name) {
            sink.remove_header(name);
        }
    }

    /// Sink for a header mutation, or `None` once headers are frozen.
    fn header_sink(&mut self, name: &HeaderName) -> Option<&mut Box<dyn ResponseSink>> {
        if self.committed {
            debug!(header = %name, "Response already committed - header mutation ignored");
            return None;
        }
        self.sink.as_mut()
    }

    pub fn flush(&mut self) -> Result<(), CapabilityError> {
        self.sink
            .as_mut()
            .ok_or(CapabilityError::Detached)?
            .flush()
    }

    pub fn hijack(&mut self) -> Result<HijackedConnection, CapabilityError> {
        self.sink
            .as_mut()
            .ok_or(CapabilityError::Detached)?
            .hijack()
    }

    pub fn close_notify(&mut self) -> Result<CancelSignal, CapabilityError> {
        self.sink
            .as_mut()
            .ok_or(CapabilityError::Detached)?
            .close_notify()
    }
}
