use std::io;
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::Mutex;

use super::response::{CapabilityError, ResponseSink};
use crate::context::CancelSignal;

/// Snapshot of everything written to a [`Recorder`].
#[derive(Debug, Clone, Default)]
pub struct RecordedResponse {
    /// Status passed to the first `write_header`, `None` if never written.
    pub status: Option<u16>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Number of `write_header` calls that reached the sink.
    pub header_writes: usize,
    pub flushes: usize,
}

/// In-memory [`ResponseSink`].
///
/// Cloning shares the underlying buffer, so a test keeps one handle while the
/// dispatcher owns another. The may_minihttp binding also answers through a
/// recorder and copies it onto the wire afterwards.
///
/// Supports [`flush`](ResponseSink::flush) and
/// [`close_notify`](ResponseSink::close_notify); hijacking is unsupported.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<RecordedResponse>>,
    closed: CancelSignal,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.inner.lock().status
    }

    /// Status as a client would see it: `200` when nothing was written.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status().unwrap_or(200)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        self.inner.lock().body.clone()
    }

    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().body).into_owned()
    }

    #[must_use]
    pub fn snapshot(&self) -> RecordedResponse {
        self.inner.lock().clone()
    }

    /// Simulate the peer hanging up; fires the close-notify signal.
    pub fn close(&self) -> bool {
        self.closed.cancel()
    }
}

impl ResponseSink for Recorder {
    fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.inner.lock().headers.get(name).cloned()
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.lock().headers.insert(name, value);
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.lock().headers.append(name, value);
    }

    fn remove_header(&mut self, name: &HeaderName) {
        self.inner.lock().headers.remove(name);
    }

    fn write_header(&mut self, status: u16) {
        let mut inner = self.inner.lock();
        inner.header_writes += 1;
        if inner.status.is_none() {
            inner.status = Some(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.status.is_none() {
            inner.status = Some(200);
        }
        inner.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), CapabilityError> {
        self.inner.lock().flushes += 1;
        Ok(())
    }

    fn close_notify(&mut self) -> Result<CancelSignal, CapabilityError> {
        Ok(self.closed.clone())
    }
}
