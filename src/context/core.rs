use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderName, HeaderValue};
use serde::Serialize;
use tracing::debug;

use super::cancel::CancelSignal;
use super::values::Values;
use crate::error::{Error, Result};
use crate::ids::{RequestIdGenerator, RequestIdSource, UlidGenerator};
use crate::log::{default_logger, SharedLogger};
use crate::router::ParamVec;
use crate::server::{query_pairs, Request, ResponseSink, ResponseTracker};

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_JSON: &str = "application/json";

/// Request deadline carried in a context's value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(pub Instant);

/// Application-level collaborators shared by every context of one app.
#[derive(Clone)]
pub struct ContextServices {
    pub id_generator: Arc<dyn RequestIdGenerator>,
    pub id_source: RequestIdSource,
    /// Consulted after a context's own values.
    pub ambient: Option<Arc<Values>>,
}

impl Default for ContextServices {
    fn default() -> Self {
        Self {
            id_generator: Arc::new(UlidGenerator),
            id_source: RequestIdSource::Standard,
            ambient: None,
        }
    }
}

/// State of one request's processing.
///
/// A context is active between [`reset`](Self::reset) and release back to its
/// pool. Outside that window, accessors that need the request or the response
/// sink return [`Error::NoActiveContext`].
pub struct Context {
    tracker: ResponseTracker,
    request: Option<Request>,
    params: ParamVec,
    request_id: String,
    values: Values,
    cancel: CancelSignal,
    services: ContextServices,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("active", &self.is_active())
            .field("params", &self.params)
            .field("request_id", &self.request_id)
            .field("values", &self.values)
            .field("tracker", &self.tracker)
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ContextServices::default())
    }
}

impl Context {
    /// Inactive context bound to `services`.
    #[must_use]
    pub fn new(services: ContextServices) -> Self {
        Self {
            tracker: ResponseTracker::new(),
            request: None,
            params: ParamVec::new(),
            request_id: String::new(),
            values: Values::new(),
            cancel: CancelSignal::new(),
            services,
        }
    }

    /// Install a new request. The only recycle path for pooled contexts.
    pub fn reset(&mut self, sink: Box<dyn ResponseSink>, request: Request, params: ParamVec) {
        self.tracker.reset(sink);
        self.request = Some(request);
        self.params = params;
        self.request_id.clear();
        self.values.clear();
        self.cancel = CancelSignal::new();
    }

    /// Drop everything tied to the finished request.
    ///
    /// The cancel signal is kept so stale clones keep reporting cancelled.
    pub(crate) fn clear(&mut self) {
        drop(self.tracker.detach());
        self.request = None;
        self.params.clear();
        self.request_id.clear();
        self.values.clear();
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.request.is_some()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::NoActiveContext)
        }
    }

    // --- request side -------------------------------------------------

    pub fn request(&self) -> Result<&Request> {
        self.request.as_ref().ok_or(Error::NoActiveContext)
    }

    /// Path of the active request, empty when inactive.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.as_ref().map(|r| r.uri().path()).unwrap_or("")
    }

    /// Method of the active request, empty when inactive.
    #[must_use]
    pub fn method(&self) -> &str {
        self.request.as_ref().map(|r| r.method().as_str()).unwrap_or("")
    }

    /// Path parameter by name. Last occurrence wins on duplicate names.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// First query parameter named `name`, URL-decoded.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<String> {
        let req = self.request.as_ref()?;
        query_pairs(req)
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Request header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .as_ref()?
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    /// Identifier of this request, computed on first access and cached.
    ///
    /// Taken from the configured correlation header when present, otherwise
    /// produced by the injected generator. Empty outside an active request;
    /// nothing is generated or cached then.
    pub fn request_id(&mut self) -> &str {
        let Some(request) = self.request.as_ref() else {
            return "";
        };
        if self.request_id.is_empty() {
            let inbound = self.services.id_source.extract(request.headers());
            let id = match inbound {
                Some(id) => id,
                None => {
                    let generator = Arc::clone(&self.services.id_generator);
                    let id = generator.generate(self);
                    if id.is_empty() {
                        UlidGenerator.generate(self)
                    } else {
                        id
                    }
                }
            };
            debug!(request_id = %id, "Request id assigned");
            self.request_id = id;
        }
        &self.request_id
    }

    /// Request id if already computed. Never generates.
    #[must_use]
    pub fn cached_request_id(&self) -> Option<&str> {
        if self.request_id.is_empty() {
            None
        } else {
            Some(&self.request_id)
        }
    }

    // --- values -------------------------------------------------------

    /// Attach a value for the rest of this request.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    /// Look `T` up in the context's own values, then in the ambient values.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.get::<T>().or_else(|| {
            self.services
                .ambient
                .as_deref()
                .and_then(|ambient| ambient.get::<T>())
        })
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.values.remove::<T>()
    }

    /// Logger for this request: injected, then ambient, then the crate default.
    #[must_use]
    pub fn logger(&self) -> SharedLogger {
        self.get::<SharedLogger>()
            .map(Arc::clone)
            .unwrap_or_else(default_logger)
    }

    pub fn set_logger(&mut self, logger: SharedLogger) {
        self.values.insert(logger);
    }

    pub fn set_deadline(&mut self, at: Instant) {
        self.values.insert(Deadline(at));
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.get::<Deadline>().map(|d| d.0)
    }

    // --- cancellation -------------------------------------------------

    /// Handle to this request's cancellation signal.
    ///
    /// Holding it past the end of the request only ever observes a cancelled signal.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Fire the cancellation signal. Later calls are no-ops.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // --- response side ------------------------------------------------

    #[must_use]
    pub fn response(&self) -> &ResponseTracker {
        &self.tracker
    }

    pub fn response_mut(&mut self) -> &mut ResponseTracker {
        &mut self.tracker
    }

    /// Set a response header. Ignored once the response is committed.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_active()?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidHeader(name.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(name.to_string()))?;
        self.tracker.set_header(name, value);
        Ok(())
    }

    /// Commit `code` with no body.
    pub fn no_content(&mut self, code: u16) -> Result<()> {
        self.ensure_active()?;
        self.tracker.write_header(code);
        Ok(())
    }

    /// `text/plain` response.
    pub fn text(&mut self, code: u16, body: &str) -> Result<()> {
        self.send(code, TEXT_PLAIN, body.as_bytes())
    }

    /// `text/html` response.
    pub fn html(&mut self, code: u16, body: &str) -> Result<()> {
        self.send(code, TEXT_HTML, body.as_bytes())
    }

    /// `application/json` response.
    ///
    /// The value is serialized before anything is written, so a serialization
    /// failure leaves the response untouched.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) -> Result<()> {
        self.ensure_active()?;
        let body = serde_json::to_vec(value)?;
        self.send(code, APPLICATION_JSON, &body)
    }

    /// Redirect to `url`. Codes outside `300..=307` are rejected without writing.
    pub fn redirect(&mut self, code: u16, url: &str) -> Result<()> {
        self.ensure_active()?;
        if !(300..=307).contains(&code) {
            return Err(Error::InvalidRedirectCode(code));
        }
        let location =
            HeaderValue::from_str(url).map_err(|_| Error::InvalidHeader(LOCATION.to_string()))?;
        self.tracker.set_header(LOCATION, location);
        self.tracker.write_header(code);
        Ok(())
    }

    fn send(&mut self, code: u16, content_type: &'static str, body: &[u8]) -> Result<()> {
        self.ensure_active()?;
        self.tracker
            .set_header(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.tracker.write_header(code);
        self.tracker.write_all(body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Recorder;
    use std::sync::Arc;

    fn active(headers: &[(&str, &str)]) -> (Context, Recorder) {
        let mut builder = http::Request::builder().uri("/users/42?tab=posts");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let req = builder.body(Vec::new()).unwrap();
        let rec = Recorder::new();
        let mut params = ParamVec::new();
        params.push((Arc::from("id"), "42".to_string()));
        let mut ctx = Context::default();
        ctx.reset(Box::new(rec.clone()), req, params);
        (ctx, rec)
    }

    #[test]
    fn test_inactive_context_rejects_emission() {
        let mut ctx = Context::default();
        assert!(!ctx.is_active());
        assert!(matches!(ctx.text(200, "x"), Err(Error::NoActiveContext)));
        assert!(matches!(ctx.no_content(204), Err(Error::NoActiveContext)));
        assert!(matches!(ctx.request(), Err(Error::NoActiveContext)));
        assert!(ctx.param("id").is_none());
        assert_eq!(ctx.path(), "");
    }

    #[test]
    fn test_params_query_and_headers() {
        let (ctx, _rec) = active(&[("x-tenant", "acme")]);
        assert_eq!(ctx.param("id"), Some("42"));
        assert!(ctx.param("missing").is_none());
        assert_eq!(ctx.query("tab").as_deref(), Some("posts"));
        assert_eq!(ctx.header("x-tenant"), Some("acme"));
        assert_eq!(ctx.path(), "/users/42");
        assert_eq!(ctx.method(), "GET");
    }

    #[test]
    fn test_duplicate_param_last_wins() {
        let mut ctx = Context::default();
        let mut params = ParamVec::new();
        params.push((Arc::from("id"), "org".to_string()));
        params.push((Arc::from("id"), "user".to_string()));
        let req = http::Request::builder().uri("/").body(Vec::new()).unwrap();
        ctx.reset(Box::new(Recorder::new()), req, params);
        assert_eq!(ctx.param("id"), Some("user"));
    }

    #[test]
    fn test_request_id_from_header_is_cached() {
        let (mut ctx, _rec) = active(&[("x-request-id", "corr-1")]);
        assert!(ctx.cached_request_id().is_none());
        assert_eq!(ctx.request_id(), "corr-1");
        assert_eq!(ctx.cached_request_id(), Some("corr-1"));
    }

    #[test]
    fn test_empty_generator_output_falls_back() {
        let services = ContextServices {
            id_generator: Arc::new(|_: &Context| String::new()),
            ..ContextServices::default()
        };
        let mut ctx = Context::new(services);
        let req = http::Request::builder().uri("/").body(Vec::new()).unwrap();
        ctx.reset(Box::new(Recorder::new()), req, ParamVec::new());
        let id = ctx.request_id().to_string();
        assert_eq!(id.len(), 26);
        assert_eq!(ctx.request_id(), id);
    }

    #[test]
    fn test_json_serialization_failure_writes_nothing() {
        use std::collections::HashMap;
        let (mut ctx, rec) = active(&[]);
        // Non-string map keys cannot be encoded as JSON object keys.
        let mut bad: HashMap<Vec<u8>, u8> = HashMap::new();
        bad.insert(vec![1], 1);
        assert!(matches!(ctx.json(200, &bad), Err(Error::Serialization(_))));
        assert!(!ctx.response().committed());
        assert!(rec.status().is_none());
        assert!(rec.body().is_empty());
    }

    #[test]
    fn test_redirect_range() {
        let (mut ctx, rec) = active(&[]);
        assert!(matches!(
            ctx.redirect(200, "/elsewhere"),
            Err(Error::InvalidRedirectCode(200))
        ));
        assert!(!ctx.response().committed());
        ctx.redirect(302, "/elsewhere").unwrap();
        assert_eq!(rec.status(), Some(302));
        assert_eq!(rec.header("location").as_deref(), Some("/elsewhere"));
    }

    #[test]
    fn test_clear_keeps_stale_signal_cancelled() {
        let (mut ctx, _rec) = active(&[]);
        let signal = ctx.cancel_signal();
        ctx.insert(Deadline(Instant::now()));
        assert!(ctx.cancel());
        ctx.clear();
        assert!(!ctx.is_active());
        assert!(ctx.deadline().is_none());
        assert!(signal.is_cancelled());
        assert!(!ctx.cancel());
    }
}
