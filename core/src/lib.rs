//! Blocking single-shot HTTP requests with a structured response.
//!
//! # Overview
//! Configure a `Request` (method, headers, query parameters, body, auth,
//! TLS, timeouts), execute it once, and inspect the resulting `Response`:
//! status, case-insensitive headers, raw or JSON-decoded body, and the parts
//! of a multipart body as responses of their own.
//!
//! # Design
//! - `Request::prepare` produces a plain-data `TransportRequest`; a
//!   `Transport` turns it into a `RawResponse`. `UreqTransport` is the
//!   default, and a host may execute prepared requests with its own stack.
//! - Failures are values: `execute` returns `Result<Response, TransportError>`
//!   and `Response::data` returns `Result<Data, DecodeError>`.
//! - Header and multipart parsing are free functions (`parse_http_headers`,
//!   `extract_multipart_parts`) over plain data.
//!
//! ```no_run
//! use webcall_core::{Data, Request};
//!
//! let mut request = Request::new("http://maps.example.com/api/geocode/json");
//! request.set_url_parameters([("address", "1600 Amphitheatre Parkway"), ("sensor", "false")]);
//! match request.execute() {
//!     Ok(response) if response.status() == 200 => {
//!         if let Ok(Data::Json(value)) = response.data() {
//!             println!("{value}");
//!         }
//!     }
//!     Ok(response) => eprintln!("HTTP {}", response.status()),
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! ```

pub mod config;
pub mod error;
pub mod headers;
pub mod http;
pub mod multipart;
pub mod request;
pub mod response;
pub mod transport;

pub use config::{options, AuthScheme, Credentials, OptionValue, RequestConfig, TlsOptions, TransportSettings, VerifyHost};
pub use error::{DecodeError, TransportError};
pub use headers::{canonical_field_name, parse_http_headers, HeaderValue, Headers};
pub use http::{info, Body, Method, RawResponse, TransportInfo, TransportRequest};
pub use multipart::{extract_multipart_parts, RawPart};
pub use request::Request;
pub use response::{Data, Response, MAX_MULTIPART_DEPTH};
pub use transport::{Transport, UreqTransport};
