use std::io::{self, Read};

use http::{HeaderName, HeaderValue};
use may_minihttp::Request as WireRequest;
use tracing::{debug, warn};

/// Inbound request as seen by handlers.
pub type Request = http::Request<Vec<u8>>;

/// Why an inbound request could not be turned into a [`Request`].
#[derive(Debug, thiserror::Error)]
pub enum RequestParseError {
    /// Method or URI rejected by `http`.
    #[error("invalid request line: {0}")]
    Head(#[from] http::Error),
    /// The body could not be read in full.
    #[error("failed to read request body: {0}")]
    Body(#[from] io::Error),
}

/// Read the whole body. A failed read is an error, never an empty body.
pub fn read_body<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    Ok(body)
}

/// Convert a `may_minihttp` request into an owned [`Request`].
///
/// Header entries with names or values `http` rejects are skipped and logged.
///
/// # Errors
///
/// [`RequestParseError::Head`] for an invalid method or URI and
/// [`RequestParseError::Body`] when the body cannot be read.
pub fn parse_request(req: WireRequest) -> Result<Request, RequestParseError> {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();

    let mut builder = http::Request::builder().method(method.as_str()).uri(raw_path.as_str());
    let mut skipped = 0usize;
    if let Some(headers) = builder.headers_mut() {
        for h in req.headers().iter() {
            let name = HeaderName::from_bytes(h.name.as_bytes());
            let value = HeaderValue::from_bytes(h.value);
            match (name, value) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => skipped += 1,
            }
        }
    }
    if skipped > 0 {
        warn!(skipped = skipped, path = %raw_path, "Skipped malformed request headers");
    }

    let body = read_body(req.body()).inspect_err(|err| {
        warn!(error = %err, path = %raw_path, "Failed to read request body");
    })?;

    debug!(
        method = %method,
        path = %raw_path,
        body_size_bytes = body.len(),
        "Request parsed"
    );

    Ok(builder.body(body)?)
}

/// `(name, value)` pairs from the query string of `req`, URL-decoded.
#[must_use]
pub fn query_pairs(req: &Request) -> Vec<(String, String)> {
    req.uri()
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}
