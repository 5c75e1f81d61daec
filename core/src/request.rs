//! Request builder: accumulate configuration, then execute once.
//!
//! # Design
//! Setters take `&mut self` and return `&mut Self`, so calls chain.
//! Rejected input (an unknown method, an unknown auth scheme) leaves the
//! previous configuration in place and is only logged. `execute` consumes
//! the builder, which makes the executed state immutable by construction;
//! clone the request beforehand to run it again.
//!
//! `prepare` is the pure half of execution. It resolves the final URL,
//! headers, body and transport settings without touching the network, and
//! is what `execute` hands to the transport.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{AuthScheme, Credentials, OptionValue, RequestConfig, TransportSettings, VerifyHost};
use crate::error::TransportError;
use crate::http::{Body, Method, TransportRequest};
use crate::response::Response;
use crate::transport::{Transport, UreqTransport};

/// A single HTTP request under construction.
#[derive(Debug, Clone)]
pub struct Request {
    config: RequestConfig,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            config: RequestConfig::new(url),
        }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Accepts `GET`, `POST`, `PUT`, `DELETE` or `HEAD` (exact spelling);
    /// anything else is ignored.
    pub fn set_method(&mut self, method: impl AsRef<str>) -> &mut Self {
        let method = method.as_ref();
        match method.parse::<Method>() {
            Ok(m) => self.config.method = m,
            Err(()) => log::warn!("ignoring unsupported method {method:?}"),
        }
        self
    }

    /// Append a header. Existing fields with the same name are kept.
    pub fn set_header_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.headers.push((name.into(), value.into()));
        self
    }

    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.set_header_field(name, value);
        }
        self
    }

    /// Only sent when the method is POST or PUT at execution time.
    pub fn set_body(&mut self, body: impl Into<Body>) -> &mut Self {
        self.config.body = Some(body.into());
        self
    }

    /// Query parameters appended to the URL at execution time. Replaces any
    /// previously set parameters.
    pub fn set_url_parameters<I, K, V>(&mut self, parameters: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config.query = Some(
            parameters
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// `scheme` is matched case-insensitively against BASIC, DIGEST,
    /// GSSNEGOTIATE, NTLM, ANY and ANYSAFE; an unknown scheme is ignored.
    pub fn set_http_authentication(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        scheme: impl AsRef<str>,
    ) -> &mut Self {
        let scheme = scheme.as_ref();
        match scheme.parse::<AuthScheme>() {
            Ok(s) => self.config.auth = Some((Credentials::new(username, password), s)),
            Err(()) => log::warn!("ignoring unknown authentication scheme {scheme:?}"),
        }
        self
    }

    pub fn set_proxy(&mut self, url: impl Into<String>) -> &mut Self {
        self.config.proxy = Some(url.into());
        self
    }

    pub fn set_proxy_authentication(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.config.proxy_auth = Some(Credentials::new(username, password));
        self
    }

    /// Whole-request timeout. 0 means no timeout.
    pub fn set_timeout(&mut self, seconds: u64) -> &mut Self {
        self.config.timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        self
    }

    /// 0 means no connect timeout.
    pub fn set_connect_timeout(&mut self, seconds: u64) -> &mut Self {
        self.config.connect_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        self
    }

    /// 0 disables redirect following.
    pub fn set_max_redirects(&mut self, max: u32) -> &mut Self {
        self.config.max_redirects = Some(max);
        self
    }

    /// With `verify_peer` the host check level (0, 1 or 2) and CA bundle are
    /// applied. Without it peer verification is switched off and the host
    /// level and bundle are left as they were.
    ///
    /// Note: with the default `UreqTransport`, host level 0 turns off all
    /// certificate verification, peer included, since rustls cannot skip the
    /// name check alone. A warning is logged when that happens.
    pub fn set_ssl(
        &mut self,
        verify_peer: bool,
        verify_host: u8,
        ca_bundle: Option<impl Into<PathBuf>>,
    ) -> &mut Self {
        let tls = &mut self.config.tls;
        if verify_peer {
            tls.verify_peer = true;
            tls.verify_host = VerifyHost::from(verify_host);
            if let Some(path) = ca_bundle {
                tls.ca_bundle = Some(path.into());
            }
        } else {
            tls.verify_peer = false;
        }
        self
    }

    /// Raw transport option. Applied after every named setting, so it wins
    /// regardless of call order.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> &mut Self {
        self.config.options.insert(key.into(), value.into());
        self
    }

    /// The URL the request will hit, query parameters included.
    pub fn build_url(&self) -> String {
        let query = match &self.config.query {
            Some(params) if !params.is_empty() => serde_urlencoded::to_string(params).unwrap_or_default(),
            _ => return self.config.url.clone(),
        };
        append_query(&self.config.url, &query)
    }

    /// Resolve the configuration into what a transport executes.
    pub fn prepare(&self) -> TransportRequest {
        let method = self.config.method;
        let mut headers = self.config.headers.clone();
        let body = match &self.config.body {
            Some(body) if method.carries_body() => {
                let encoded = body.encode();
                let has_content_type = headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("content-type"));
                if matches!(body, Body::Form(_)) || !has_content_type {
                    headers.retain(|(n, _)| !n.eq_ignore_ascii_case("content-type"));
                    headers.push(("Content-Type".to_string(), encoded.content_type));
                }
                Some(encoded.bytes)
            }
            Some(_) => {
                log::debug!("{method} request: configured body is not sent");
                None
            }
            None => None,
        };
        TransportRequest {
            method,
            url: self.build_url(),
            headers,
            body,
            settings: TransportSettings::resolve(&self.config),
        }
    }

    /// Perform the request over the built-in ureq transport.
    pub fn execute(self) -> Result<Response, TransportError> {
        self.execute_with(&UreqTransport)
    }

    /// Perform the request over `transport`.
    pub fn execute_with<T: Transport + ?Sized>(self, transport: &T) -> Result<Response, TransportError> {
        let prepared = self.prepare();
        log::debug!("executing {} {}", prepared.method, prepared.url);
        match transport.perform(&prepared) {
            Ok(raw) => Ok(Response::from_raw(raw)),
            Err(e) => {
                log::warn!("{} {} failed: {e}", prepared.method, prepared.url);
                Err(e)
            }
        }
    }
}

/// Append an encoded query, using `&` when the URL already has a query and
/// `?` otherwise. A fragment stays at the end.
fn append_query(url: &str, query: &str) -> String {
    let (base, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let separator = match base.find('?') {
        None => "?",
        Some(i) if i + 1 == base.len() || base.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{base}{separator}{query}{fragment}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options;
    use std::cell::RefCell;

    /// Records the prepared request and answers with a canned response.
    struct Recorder {
        seen: RefCell<Option<TransportRequest>>,
        fail: bool,
    }

    impl Recorder {
        fn new() -> Self {
            Self { seen: RefCell::new(None), fail: false }
        }
    }

    impl Transport for Recorder {
        fn perform(&self, request: &TransportRequest) -> Result<crate::RawResponse, TransportError> {
            *self.seen.borrow_mut() = Some(request.clone());
            if self.fail {
                return Err(TransportError::Unavailable("connection refused".into()));
            }
            Ok(crate::RawResponse {
                status: 200,
                header_text: "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n".into(),
                body: b"ok".to_vec(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn defaults_to_get() {
        let req = Request::new("http://example.com/");
        assert_eq!(req.config().method, Method::Get);
        assert_eq!(req.prepare().method, Method::Get);
    }

    #[test]
    fn invalid_method_keeps_previous() {
        let mut req = Request::new("http://example.com/");
        req.set_method("PUT").set_method("PATCH").set_method("get");
        assert_eq!(req.config().method, Method::Put);
        req.set_method(Method::Head);
        assert_eq!(req.config().method, Method::Head);
    }

    #[test]
    fn get_never_sends_body() {
        let recorder = Recorder::new();
        let mut req = Request::new("http://example.com/");
        req.set_body([("bad-body", "true")].into_iter().collect::<Body>());
        let resp = req.execute_with(&recorder).unwrap();
        assert_eq!(resp.status(), 200);
        let seen = recorder.seen.borrow();
        let seen = seen.as_ref().unwrap();
        assert!(seen.body.is_none());
        assert!(seen.headers.is_empty());
    }

    #[test]
    fn head_and_delete_never_send_body() {
        for method in ["HEAD", "DELETE"] {
            let mut req = Request::new("http://example.com/");
            req.set_method(method).set_body("payload");
            assert!(req.prepare().body.is_none(), "{method}");
        }
    }

    #[test]
    fn post_raw_body_gets_default_content_type() {
        let mut req = Request::new("http://example.com/");
        req.set_method("POST").set_body("a=1");
        let prepared = req.prepare();
        assert_eq!(prepared.body.as_deref(), Some(&b"a=1"[..]));
        assert_eq!(
            prepared.headers,
            vec![("Content-Type".to_string(), "application/x-www-form-urlencoded".to_string())]
        );
    }

    #[test]
    fn put_raw_body_keeps_caller_content_type() {
        let mut req = Request::new("http://example.com/");
        req.set_method("PUT")
            .set_header_field("content-type", "application/json")
            .set_body("{\"a\":1}");
        let prepared = req.prepare();
        assert_eq!(
            prepared.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn form_body_is_multipart() {
        let mut req = Request::new("http://example.com/");
        req.set_method("POST")
            .set_body([("field", "value")].into_iter().collect::<Body>());
        let prepared = req.prepare();
        let (_, ct) = prepared.headers.iter().find(|(n, _)| n == "Content-Type").unwrap();
        assert!(ct.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8(prepared.body.unwrap()).unwrap();
        assert!(body.contains("name=\"field\"\r\n\r\nvalue\r\n"));
    }

    #[test]
    fn duplicate_headers_accumulate_in_order() {
        let mut req = Request::new("http://example.com/");
        req.set_header_field("X-A", "1")
            .set_headers([("X-B", "2"), ("X-A", "3")]);
        let names: Vec<_> = req.prepare().headers.into_iter().collect();
        assert_eq!(
            names,
            vec![
                ("X-A".to_string(), "1".to_string()),
                ("X-B".to_string(), "2".to_string()),
                ("X-A".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn url_parameters_use_question_mark() {
        let mut req = Request::new("http://maps.example.com/geocode/json");
        req.set_url_parameters([("address", "1600 Amphitheatre Parkway"), ("sensor", "false")]);
        assert_eq!(
            req.build_url(),
            "http://maps.example.com/geocode/json?address=1600+Amphitheatre+Parkway&sensor=false"
        );
    }

    #[test]
    fn url_parameters_extend_existing_query() {
        let mut req = Request::new("http://example.com/search?q=rust");
        req.set_url_parameters([("page", "2")]);
        assert_eq!(req.build_url(), "http://example.com/search?q=rust&page=2");
    }

    #[test]
    fn append_query_edge_cases() {
        assert_eq!(append_query("http://h/p?", "a=1"), "http://h/p?a=1");
        assert_eq!(append_query("http://h/p?x=1&", "a=1"), "http://h/p?x=1&a=1");
        assert_eq!(append_query("http://h/p#top", "a=1"), "http://h/p?a=1#top");
        assert_eq!(append_query("http://h/p?x=1#top", "a=1"), "http://h/p?x=1&a=1#top");
    }

    #[test]
    fn empty_parameters_leave_url_alone() {
        let mut req = Request::new("http://example.com/a");
        req.set_url_parameters(Vec::<(String, String)>::new());
        assert_eq!(req.build_url(), "http://example.com/a");
    }

    #[test]
    fn unknown_auth_scheme_is_ignored() {
        let mut req = Request::new("http://example.com/");
        req.set_http_authentication("u", "p", "basic");
        req.set_http_authentication("x", "y", "kerberos");
        let (creds, scheme) = req.config().auth.clone().unwrap();
        assert_eq!(creds.username, "u");
        assert_eq!(scheme, AuthScheme::Basic);
    }

    #[test]
    fn ssl_without_peer_verification_leaves_host_level() {
        let mut req = Request::new("https://example.com/");
        req.set_ssl(true, 1, Some("/etc/ssl/ca.pem"));
        req.set_ssl(false, 0, None::<PathBuf>);
        let tls = &req.config().tls;
        assert!(!tls.verify_peer);
        assert_eq!(tls.verify_host, VerifyHost::Exists);
        assert_eq!(tls.ca_bundle.as_deref(), Some(std::path::Path::new("/etc/ssl/ca.pem")));
    }

    #[test]
    fn option_wins_over_named_setter_in_any_order() {
        let mut req = Request::new("http://example.com/");
        req.set_option(options::TIMEOUT, 30_i64).set_timeout(5);
        assert_eq!(req.prepare().settings.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let mut req = Request::new("http://example.com/");
        req.set_timeout(5).set_connect_timeout(5);
        req.set_timeout(0).set_connect_timeout(0);
        let settings = req.prepare().settings;
        assert_eq!(settings.timeout, None);
        assert_eq!(settings.connect_timeout, None);
    }

    #[test]
    fn transport_failure_is_an_error_value() {
        let recorder = Recorder { fail: true, ..Recorder::new() };
        let err = Request::new("http://example.com/").execute_with(&recorder).unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }

    #[test]
    fn clone_allows_re_execution() {
        let recorder = Recorder::new();
        let mut req = Request::new("http://example.com/");
        req.set_method("DELETE");
        let first = req.clone().execute_with(&recorder).unwrap();
        let second = req.execute_with(&recorder).unwrap();
        assert_eq!(first.status(), second.status());
        assert_eq!(recorder.seen.borrow().as_ref().unwrap().method, Method::Delete);
    }
}
