//! # Server Module
//!
//! The response side of the request lifecycle and the may_minihttp binding.
//!
//! - [`response`]: the [`ResponseSink`] trait and the [`ResponseTracker`] state machine
//! - [`recorder`]: the in-memory [`Recorder`] sink
//! - [`request`]: the [`Request`] type and conversion from may_minihttp
//! - [`service`] / [`http_server`]: serving an [`App`](crate::app::App) over TCP

pub mod http_server;
pub mod recorder;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use recorder::{RecordedResponse, Recorder};
pub use request::{parse_request, query_pairs, read_body, Request, RequestParseError};
pub use response::{
    status_reason, Capability, CapabilityError, Connection, HijackedConnection, ResponseSink,
    ResponseTracker,
};
pub use service::{dropped_header_lines, write_recorded, AppService};
