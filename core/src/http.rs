//! Plain-data types that cross the transport boundary.
//!
//! # Design
//! `Request::prepare` resolves a configuration into a `TransportRequest`, and
//! a transport answers with a `RawResponse`. Neither type knows anything
//! about sockets, so a host can execute a prepared request with its own HTTP
//! stack and feed the result back through `Response::from_raw`.
//!
//! All fields use owned types (`String`, `Vec`) so values can cross FFI
//! boundaries without lifetime concerns.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::TransportSettings;

/// HTTP method for a request.
///
/// Only these five verbs are accepted; `FromStr` is case-sensitive and
/// expects the upper-case spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// Whether a configured body is transmitted with this method.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            _ => Err(()),
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Sent as-is.
    Raw(Vec<u8>),
    /// Key/value pairs, sent as `multipart/form-data`.
    Form(Vec<(String, String)>),
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Raw(s.as_bytes().to_vec())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Raw(s.into_bytes())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Raw(bytes)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Body {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Body::Form(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Encoded body bytes plus the content type they must be sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Body {
    /// Encode the payload. Form bodies get a fresh random boundary.
    pub fn encode(&self) -> EncodedBody {
        match self {
            Body::Raw(bytes) => EncodedBody {
                content_type: "application/x-www-form-urlencoded".to_string(),
                bytes: bytes.clone(),
            },
            Body::Form(fields) => {
                let boundary = format!("------------------------{}", uuid::Uuid::new_v4().simple());
                EncodedBody {
                    content_type: format!("multipart/form-data; boundary={boundary}"),
                    bytes: encode_form(fields, &boundary),
                }
            }
        }
    }
}

fn encode_form(fields: &[(String, String)], boundary: &str) -> Vec<u8> {
    let mut out = String::new();
    for (name, value) in fields {
        out.push_str("--");
        out.push_str(boundary);
        out.push_str("\r\n");
        out.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
            name.replace('"', "%22")
        ));
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("--\r\n");
    out.into_bytes()
}

/// A fully resolved request, ready for a `Transport`.
///
/// Built by `Request::prepare`. `body` is `None` for every method other than
/// POST and PUT, whatever the configuration held.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub settings: TransportSettings,
}

/// Transport-level diagnostics keyed by name (see `info` for common keys).
pub type TransportInfo = BTreeMap<String, serde_json::Value>;

/// Well-known `TransportInfo` keys.
pub mod info {
    pub const URL: &str = "url";
    pub const HTTP_CODE: &str = "http_code";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const TOTAL_TIME: &str = "total_time";
    pub const HEADER_SIZE: &str = "header_size";
    pub const SIZE_DOWNLOAD: &str = "size_download";
}

/// What a transport captured for one execution.
///
/// `header_text` is the raw header block and may hold several status lines
/// (interim responses, redirects).
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub header_text: String,
    pub body: Vec<u8>,
    pub info: TransportInfo,
}
