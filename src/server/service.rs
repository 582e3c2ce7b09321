use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::header::{CONTENT_LENGTH, DATE, SERVER};
use may_minihttp::{HttpService, Request as WireRequest, Response};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::recorder::{RecordedResponse, Recorder};
use super::request::parse_request;
use super::response::status_reason;
use crate::app::App;

/// Distinct header lines leaked for the process lifetime. Past this, lines
/// not already cached are dropped from the response.
pub const MAX_INTERNED_HEADER_LINES: usize = 8192;

/// Distinct values cached per header name, so one high-cardinality header
/// (`x-request-id`, `location`) cannot use up the whole cache.
pub const MAX_INTERNED_VALUES_PER_HEADER: usize = 1024;

static HEADER_LINES: Lazy<HeaderLines> =
    Lazy::new(|| HeaderLines::new(MAX_INTERNED_HEADER_LINES, MAX_INTERNED_VALUES_PER_HEADER));

/// Bounded cache of `&'static str` header lines.
///
/// `may_minihttp` only accepts `&'static str` header lines, so a line is
/// leaked once and reused for every later response carrying it. Leaking stops
/// at the capacity.
struct HeaderLines {
    inner: Mutex<HeaderLinesInner>,
    capacity: usize,
    per_name: usize,
    dropped: AtomicU64,
}

#[derive(Default)]
struct HeaderLinesInner {
    lines: HashSet<&'static str>,
    per_name: HashMap<String, usize>,
}

impl HeaderLines {
    fn new(capacity: usize, per_name: usize) -> Self {
        Self {
            inner: Mutex::new(HeaderLinesInner::default()),
            capacity,
            per_name,
            dropped: AtomicU64::new(0),
        }
    }

    /// Cached line for `name: value`, or `None` when either bound is reached.
    fn intern(&self, name: &str, value: &str) -> Option<&'static str> {
        let line = format!("{name}: {value}");
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.lines.get(line.as_str()) {
            return Some(*existing);
        }
        let for_name = inner.per_name.get(name).copied().unwrap_or(0);
        if inner.lines.len() >= self.capacity || for_name >= self.per_name {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            drop(inner);
            warn!(header = %name, total, "Header line cache full - header dropped");
            return None;
        }
        let leaked: &'static str = Box::leak(line.into_boxed_str());
        inner.lines.insert(leaked);
        *inner.per_name.entry(name.to_owned()).or_insert(0) += 1;
        Some(leaked)
    }

    fn len(&self) -> usize {
        self.inner.lock().lines.len()
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Headers dropped so far because the header line cache was full.
#[must_use]
pub fn dropped_header_lines() -> u64 {
    HEADER_LINES.dropped()
}

/// Copy a recorded response onto the wire response.
///
/// A response nothing was written to goes out as an empty `200`.
pub fn write_recorded(res: &mut Response, recorded: RecordedResponse) {
    let status = recorded.status.unwrap_or(200);
    res.status_code(status as usize, status_reason(status));
    for (name, value) in recorded.headers.iter() {
        // may_minihttp writes these itself.
        if name == CONTENT_LENGTH || name == DATE || name == SERVER {
            continue;
        }
        match value.to_str() {
            Ok(value) => {
                if let Some(line) = HEADER_LINES.intern(name.as_str(), value) {
                    res.header(line);
                }
            }
            Err(_) => warn!(header = %name, "Dropping non-ASCII response header"),
        }
    }
    res.body_vec(recorded.body);
}

/// `may_minihttp` service answering every request through an [`App`].
#[derive(Clone)]
pub struct AppService {
    app: Arc<App>,
}

impl AppService {
    #[must_use]
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: WireRequest, res: &mut Response) -> io::Result<()> {
        let request = match parse_request(req) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "Rejecting unparseable request");
                res.status_code(400, status_reason(400));
                res.header("Content-Type: text/plain");
                res.body_vec(status_reason(400).as_bytes().to_vec());
                return Ok(());
            }
        };

        let recorder = Recorder::new();
        let report = self.app.serve(request, recorder.clone());
        debug!(
            status = report.status,
            size = report.size,
            outcome = %report.outcome,
            dropped_header_lines = dropped_header_lines(),
            "Response ready"
        );
        write_recorded(res, recorder.snapshot());
        Ok(())
    }
}
