//! The seam between request configuration and the network.
//!
//! # Design
//! `Transport` is the only place I/O happens. `UreqTransport` builds a fresh
//! ureq agent for every call, so nothing (connections, TLS sessions) outlives
//! a single `perform`. HTTP error statuses are data, not failures: a 404 is
//! a `RawResponse` like any other, and only network-level trouble becomes a
//! `TransportError`.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use serde_json::json;
use ureq::tls::{PemItem, RootCerts, TlsConfig};
use ureq::{Agent, Proxy, ResponseExt};

use crate::config::{AuthScheme, Credentials, TlsOptions, TransportSettings, VerifyHost};
use crate::error::TransportError;
use crate::http::{info, Method, RawResponse, TransportInfo, TransportRequest};

/// Something that can execute a prepared request.
pub trait Transport {
    fn perform(&self, request: &TransportRequest) -> Result<RawResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn perform(&self, request: &TransportRequest) -> Result<RawResponse, TransportError> {
        (**self).perform(request)
    }
}

/// Blocking transport backed by ureq.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl Transport for UreqTransport {
    fn perform(&self, request: &TransportRequest) -> Result<RawResponse, TransportError> {
        let agent = build_agent(&request.settings)?;

        let mut headers = request.headers.clone();
        if let Some((creds, scheme)) = &request.settings.auth {
            headers.push(("Authorization".to_string(), authorization(creds, *scheme)?));
        }

        let started = Instant::now();
        let url = request.url.as_str();
        let result = match (request.method, &request.body) {
            (Method::Get, _) => with_headers(agent.get(url), &headers).call(),
            (Method::Head, _) => with_headers(agent.head(url), &headers).call(),
            (Method::Delete, _) => with_headers(agent.delete(url), &headers).call(),
            (Method::Post, Some(body)) => with_headers(agent.post(url), &headers).send(&body[..]),
            (Method::Post, None) => with_headers(agent.post(url), &headers).send_empty(),
            (Method::Put, Some(body)) => with_headers(agent.put(url), &headers).send(&body[..]),
            (Method::Put, None) => with_headers(agent.put(url), &headers).send_empty(),
        };
        let mut response = result?;

        let status = response.status();
        let header_text = render_header_block(&response);
        let effective_url = response.get_uri().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        // no size cap: any body the server sends is a valid response
        let body = response.body_mut().with_config().limit(u64::MAX).read_to_vec()?;
        let elapsed = started.elapsed();

        let mut transport_info = TransportInfo::new();
        transport_info.insert(info::URL.to_string(), json!(effective_url));
        transport_info.insert(info::HTTP_CODE.to_string(), json!(status.as_u16()));
        transport_info.insert(info::CONTENT_TYPE.to_string(), json!(content_type));
        transport_info.insert(info::TOTAL_TIME.to_string(), json!(elapsed.as_secs_f64()));
        transport_info.insert(info::HEADER_SIZE.to_string(), json!(header_text.len()));
        transport_info.insert(info::SIZE_DOWNLOAD.to_string(), json!(body.len()));

        log::debug!(
            "{} {} -> {} ({} bytes, {:.3}s)",
            request.method,
            request.url,
            status.as_u16(),
            body.len(),
            elapsed.as_secs_f64()
        );

        Ok(RawResponse {
            status: status.as_u16(),
            header_text,
            body,
            info: transport_info,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn build_agent(settings: &TransportSettings) -> Result<Agent, TransportError> {
    let mut config = Agent::config_builder()
        .http_status_as_error(false)
        .tls_config(tls_config(&settings.tls)?);
    if let Some(timeout) = settings.timeout {
        config = config.timeout_global(Some(timeout));
    }
    if let Some(timeout) = settings.connect_timeout {
        config = config.timeout_connect(Some(timeout));
    }
    if let Some(max) = settings.max_redirects {
        // hitting the limit returns the last 3xx instead of failing
        config = config.max_redirects(max).max_redirects_will_error(false);
    }
    if let Some(proxy) = proxy(settings)? {
        config = config.proxy(Some(proxy));
    }
    Ok(config.build().new_agent())
}

fn tls_config(tls: &TlsOptions) -> Result<TlsConfig, TransportError> {
    let mut builder = TlsConfig::builder();
    if !tls.verify_peer {
        builder = builder.disable_verification(true);
    } else if tls.verify_host == VerifyHost::Off {
        // rustls cannot skip the name check alone
        log::warn!("host verification off: disabling certificate verification entirely");
        builder = builder.disable_verification(true);
    }
    if let Some(path) = &tls.ca_bundle {
        let pem = std::fs::read(path).map_err(|source| TransportError::CaBundle {
            path: path.clone(),
            source,
        })?;
        let certs: Vec<_> = ureq::tls::parse_pem(&pem)
            .filter_map(|item| match item {
                Ok(PemItem::Certificate(cert)) => Some(cert.to_owned()),
                _ => None,
            })
            .collect();
        if certs.is_empty() {
            return Err(TransportError::Certificate(path.clone()));
        }
        builder = builder.root_certs(RootCerts::Specific(Arc::new(certs)));
    }
    Ok(builder.build())
}

fn proxy(settings: &TransportSettings) -> Result<Option<Proxy>, TransportError> {
    let Some(proxy_url) = &settings.proxy else {
        if settings.proxy_auth.is_some() {
            log::warn!("proxy credentials set without a proxy; ignoring them");
        }
        return Ok(None);
    };
    let mut url = url::Url::parse(proxy_url).map_err(|e| TransportError::Proxy(e.to_string()))?;
    if let Some(creds) = &settings.proxy_auth {
        url.set_username(&creds.username)
            .and_then(|()| url.set_password(Some(&creds.password)))
            .map_err(|()| TransportError::Proxy(format!("cannot attach credentials to {proxy_url}")))?;
    }
    Proxy::new(url.as_str())
        .map(Some)
        .map_err(|e| TransportError::Proxy(e.to_string()))
}

/// Preemptive `Authorization` value. Challenge-based schemes are not
/// available on this transport.
fn authorization(creds: &Credentials, scheme: AuthScheme) -> Result<String, TransportError> {
    match scheme {
        AuthScheme::Basic | AuthScheme::Any => {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", creds.username, creds.password));
            Ok(format!("Basic {token}"))
        }
        other => Err(TransportError::UnsupportedAuth(other)),
    }
}

fn render_header_block(response: &ureq::http::Response<ureq::Body>) -> String {
    let status = response.status();
    let mut block = format!(
        "{:?} {} {}\r\n",
        response.version(),
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    for (name, value) in response.headers() {
        block.push_str(name.as_str());
        block.push_str(": ");
        block.push_str(&String::from_utf8_lossy(value.as_bytes()));
        block.push_str("\r\n");
    }
    block.push_str("\r\n");
    block
}
