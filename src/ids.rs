use http::{HeaderMap, HeaderName};

use crate::context::Context;

/// Correlation header used by most proxies and load balancers.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request log id header injected by Google App Engine.
pub const X_APPENGINE_REQUEST_LOG_ID: HeaderName =
    HeaderName::from_static("x-appengine-request-log-id");

/// Produces a request identifier when the inbound request carries none.
///
/// Any `Fn(&Context) -> String` closure is a generator.
pub trait RequestIdGenerator: Send + Sync {
    fn generate(&self, ctx: &Context) -> String;
}

impl<F> RequestIdGenerator for F
where
    F: Fn(&Context) -> String + Send + Sync,
{
    fn generate(&self, ctx: &Context) -> String {
        self(ctx)
    }
}

/// Default generator: a fresh ULID per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidGenerator;

impl RequestIdGenerator for UlidGenerator {
    fn generate(&self, _ctx: &Context) -> String {
        ulid::Ulid::new().to_string()
    }
}

/// Where an inbound correlation id is read from.
///
/// Chosen at startup (see [`crate::runtime_config::RuntimeConfig`]) instead of
/// per-platform builds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestIdSource {
    /// `X-Request-Id`
    #[default]
    Standard,
    /// `X-AppEngine-Request-Log-Id`
    AppEngine,
    /// Any other header.
    Header(HeaderName),
    /// Ignore inbound headers and always generate.
    Disabled,
}

impl RequestIdSource {
    /// Parse a configuration value: `standard`, `appengine`, `none`, or a header name.
    ///
    /// Invalid header names fall back to [`RequestIdSource::Standard`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "standard" | "x-request-id" => RequestIdSource::Standard,
            "appengine" | "x-appengine-request-log-id" => RequestIdSource::AppEngine,
            "none" | "disabled" | "off" => RequestIdSource::Disabled,
            other => HeaderName::from_bytes(other.as_bytes())
                .map(RequestIdSource::Header)
                .unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn header_name(&self) -> Option<&HeaderName> {
        match self {
            RequestIdSource::Standard => {
                static NAME: HeaderName = X_REQUEST_ID;
                Some(&NAME)
            }
            RequestIdSource::AppEngine => {
                static NAME: HeaderName = X_APPENGINE_REQUEST_LOG_ID;
                Some(&NAME)
            }
            RequestIdSource::Header(name) => Some(name),
            RequestIdSource::Disabled => None,
        }
    }

    /// Non-empty correlation id from `headers`, if present.
    #[must_use]
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let name = self.header_name()?;
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_ulid_generator_yields_distinct_ulids() {
        let ctx = Context::new(crate::context::ContextServices::default());
        let a = UlidGenerator.generate(&ctx);
        let b = UlidGenerator.generate(&ctx);
        assert_eq!(a.len(), 26);
        assert!(ulid::Ulid::from_string(&a).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(RequestIdSource::parse("standard"), RequestIdSource::Standard);
        assert_eq!(RequestIdSource::parse("AppEngine"), RequestIdSource::AppEngine);
        assert_eq!(RequestIdSource::parse("off"), RequestIdSource::Disabled);
        assert_eq!(
            RequestIdSource::parse("X-Correlation-Id"),
            RequestIdSource::Header(HeaderName::from_static("x-correlation-id"))
        );
        assert_eq!(RequestIdSource::parse("bad header"), RequestIdSource::Standard);
    }

    #[test]
    fn test_source_extract() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        headers.insert(X_APPENGINE_REQUEST_LOG_ID, HeaderValue::from_static("  "));
        assert_eq!(
            RequestIdSource::Standard.extract(&headers).as_deref(),
            Some("abc-123")
        );
        assert!(RequestIdSource::AppEngine.extract(&headers).is_none());
        assert!(RequestIdSource::Disabled.extract(&headers).is_none());
    }
}
