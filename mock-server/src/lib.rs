use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{any, get},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// Every value received for `name` (case-insensitive), in order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

pub const MULTIPART_BODY: &str = "preamble\r\n\
--outer\r\n\
Content-Type: text/plain\r\n\
\r\n\
first part\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"n\":2}\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>third</p>\r\n\
--inner--\r\n\
--outer--\r\n";

/// Size of the `/large` body, above ureq's default 10 MiB read limit.
pub const LARGE_BODY_LEN: usize = 11 * 1024 * 1024;

pub const BASIC_USER: &str = "user";
pub const BASIC_PASSWORD: &str = "pass";

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/redirect", any(redirect))
        .route("/multipart", get(multipart))
        .route("/basic-auth", get(basic_auth))
        .route("/cookies", get(cookies))
        .route("/json/invalid", get(invalid_json))
        .route("/status/{code}", any(status))
        .route("/slow", get(slow))
        .route("/large", get(large))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    log::debug!("echo {method} {uri}");
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(n, v)| (n.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn redirect() -> Redirect {
    Redirect::to("/echo?redirected=1")
}

async fn multipart() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "multipart/mixed; boundary=outer")],
        MULTIPART_BODY,
    )
}

async fn basic_auth(headers: HeaderMap) -> Result<String, StatusCode> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let decoded = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;
    match decoded.split_once(':') {
        Some((BASIC_USER, BASIC_PASSWORD)) => Ok(format!("hello {BASIC_USER}")),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn cookies() -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, "a=1"), (header::SET_COOKIE, "b=2")]),
        "cookies set",
    )
}

async fn invalid_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "{not json")
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", status.as_u16()))
}

async fn large() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], vec![b'x'; LARGE_BODY_LEN])
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "finally"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_roundtrips_through_json() {
        let echo = Echo {
            method: "POST".to_string(),
            path: "/echo".to_string(),
            query: Some("a=1".to_string()),
            headers: vec![("x-a".to_string(), "1".to_string())],
            body: "payload".to_string(),
        };
        let json = serde_json::to_string(&echo).unwrap();
        let back: Echo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.method, "POST");
        assert_eq!(back.query.as_deref(), Some("a=1"));
        assert_eq!(back.header_values("X-A"), vec!["1"]);
    }

    #[test]
    fn header_values_keeps_duplicates() {
        let echo = Echo {
            method: "GET".to_string(),
            path: "/echo".to_string(),
            query: None,
            headers: vec![
                ("x-dup".to_string(), "1".to_string()),
                ("other".to_string(), "z".to_string()),
                ("x-dup".to_string(), "2".to_string()),
            ],
            body: String::new(),
        };
        assert_eq!(echo.header_values("x-dup"), vec!["1", "2"]);
        assert!(echo.header_values("missing").is_empty());
    }

    #[test]
    fn multipart_body_is_closed() {
        assert!(MULTIPART_BODY.ends_with("--outer--\r\n"));
        assert_eq!(MULTIPART_BODY.matches("--outer\r\n").count(), 2);
    }
}
