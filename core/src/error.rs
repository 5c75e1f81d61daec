//! Error types for request execution and body decoding.
//!
//! # Design
//! Nothing here is fatal. A failed execution is a `TransportError` returned
//! in place of a `Response`; a JSON body that does not parse is a
//! `DecodeError` while the raw bytes stay readable. Rejected configuration
//! (unknown method, unknown auth scheme) is not an error at all and is only
//! logged.

use std::path::PathBuf;

use crate::config::AuthScheme;

/// Why an execution produced no response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or protocol failure reported by ureq.
    #[error("request failed: {0}")]
    Request(#[from] ureq::Error),

    #[error("cannot read CA bundle {path}: {source}")]
    CaBundle {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no usable certificate in CA bundle {0}")]
    Certificate(PathBuf),

    #[error("authentication scheme {0} is not supported by this transport")]
    UnsupportedAuth(AuthScheme),

    #[error("invalid proxy: {0}")]
    Proxy(String),

    /// Failure reported by a transport other than the built-in one.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// The body could not be decoded as its content type promised.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
