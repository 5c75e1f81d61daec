//! Request configuration and the transport settings resolved from it.
//!
//! # Design
//! Known options (auth, TLS, timeouts, proxy) are named fields on
//! `RequestConfig`. Anything else goes through the `options` bag keyed by
//! string. `TransportSettings::resolve` reads the named fields first and the
//! bag last, so a value set through the bag always wins over its named
//! counterpart.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::{Body, Method};

/// Keys understood by the options bag.
pub mod options {
    /// Whole-request timeout in seconds (`Int`).
    pub const TIMEOUT: &str = "timeout";
    /// Connect timeout in seconds (`Int`).
    pub const CONNECT_TIMEOUT: &str = "connect_timeout";
    /// Redirects to follow; 0 disables following (`Int`).
    pub const MAX_REDIRECTS: &str = "max_redirects";
    pub const SSL_VERIFY_PEER: &str = "ssl_verify_peer";
    /// 0, 1 or 2 (`Int`).
    pub const SSL_VERIFY_HOST: &str = "ssl_verify_host";
    /// Path to a PEM CA bundle (`Text`).
    pub const CA_INFO: &str = "ca_info";
    /// `user:password` (`Text`).
    pub const USERPWD: &str = "userpwd";
    /// Authentication scheme name (`Text`).
    pub const HTTP_AUTH: &str = "http_auth";
    pub const PROXY: &str = "proxy";
    /// `user:password` for the proxy (`Text`).
    pub const PROXY_USERPWD: &str = "proxy_userpwd";
}

/// Value stored in the options bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        OptionValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v.into())
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

/// HTTP authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthScheme {
    Basic,
    Digest,
    GssNegotiate,
    Ntlm,
    Any,
    AnySafe,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "BASIC",
            AuthScheme::Digest => "DIGEST",
            AuthScheme::GssNegotiate => "GSSNEGOTIATE",
            AuthScheme::Ntlm => "NTLM",
            AuthScheme::Any => "ANY",
            AuthScheme::AnySafe => "ANYSAFE",
        }
    }
}

impl AsRef<str> for AuthScheme {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive.
impl FromStr for AuthScheme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BASIC" => Ok(AuthScheme::Basic),
            "DIGEST" => Ok(AuthScheme::Digest),
            "GSSNEGOTIATE" => Ok(AuthScheme::GssNegotiate),
            "NTLM" => Ok(AuthScheme::Ntlm),
            "ANY" => Ok(AuthScheme::Any),
            "ANYSAFE" => Ok(AuthScheme::AnySafe),
            _ => Err(()),
        }
    }
}

/// Username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Split `user:password` at the first colon. A missing colon means an
    /// empty password.
    pub fn from_userpwd(userpwd: &str) -> Self {
        match userpwd.split_once(':') {
            Some((user, pass)) => Self::new(user, pass),
            None => Self::new(userpwd, ""),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How strictly the server certificate's name is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VerifyHost {
    Off,
    Exists,
    #[default]
    Strict,
}

impl From<u8> for VerifyHost {
    /// Levels above 2 resolve to `Strict`.
    fn from(level: u8) -> Self {
        match level {
            0 => VerifyHost::Off,
            1 => VerifyHost::Exists,
            _ => VerifyHost::Strict,
        }
    }
}

/// TLS verification options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    pub verify_peer: bool,
    pub verify_host: VerifyHost,
    pub ca_bundle: Option<PathBuf>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify_peer: true,
            verify_host: VerifyHost::Strict,
            ca_bundle: None,
        }
    }
}

/// Everything a `Request` accumulates before execution.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub url: String,
    pub method: Method,
    /// Insertion order is kept and duplicates are allowed.
    pub headers: Vec<(String, String)>,
    pub query: Option<Vec<(String, String)>>,
    pub body: Option<Body>,
    pub auth: Option<(Credentials, AuthScheme)>,
    pub proxy: Option<String>,
    pub proxy_auth: Option<Credentials>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub max_redirects: Option<u32>,
    pub tls: TlsOptions,
    pub options: BTreeMap<String, OptionValue>,
}

impl RequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: Vec::new(),
            query: None,
            body: None,
            auth: None,
            proxy: None,
            proxy_auth: None,
            timeout: None,
            connect_timeout: None,
            max_redirects: None,
            tls: TlsOptions::default(),
            options: BTreeMap::new(),
        }
    }
}

/// Transport options after the options bag has been applied.
#[derive(Debug, Clone, Default)]
pub struct TransportSettings {
    pub auth: Option<(Credentials, AuthScheme)>,
    pub proxy: Option<String>,
    pub proxy_auth: Option<Credentials>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub max_redirects: Option<u32>,
    pub tls: TlsOptions,
    /// Bag entries with no named counterpart, passed through untouched.
    pub extra: BTreeMap<String, OptionValue>,
}

impl TransportSettings {
    pub fn resolve(config: &RequestConfig) -> Self {
        let mut settings = TransportSettings {
            auth: config.auth.clone(),
            proxy: config.proxy.clone(),
            proxy_auth: config.proxy_auth.clone(),
            timeout: config.timeout.filter(|d| !d.is_zero()),
            connect_timeout: config.connect_timeout.filter(|d| !d.is_zero()),
            max_redirects: config.max_redirects,
            tls: config.tls.clone(),
            extra: BTreeMap::new(),
        };
        for (key, value) in &config.options {
            settings.apply(key, value);
        }
        settings
    }

    fn apply(&mut self, key: &str, value: &OptionValue) {
        use OptionValue::*;

        match (key, value) {
            (options::TIMEOUT, Int(secs)) => self.timeout = seconds(*secs),
            (options::CONNECT_TIMEOUT, Int(secs)) => self.connect_timeout = seconds(*secs),
            (options::MAX_REDIRECTS, Int(n)) => {
                self.max_redirects = Some(u32::try_from(*n).unwrap_or(0))
            }
            (options::SSL_VERIFY_PEER, Bool(on)) => self.tls.verify_peer = *on,
            (options::SSL_VERIFY_PEER, Int(n)) => self.tls.verify_peer = *n != 0,
            (options::SSL_VERIFY_HOST, Int(n)) => {
                self.tls.verify_host = VerifyHost::from(u8::try_from(*n).unwrap_or(u8::MAX))
            }
            (options::SSL_VERIFY_HOST, Bool(on)) => {
                self.tls.verify_host = if *on { VerifyHost::Strict } else { VerifyHost::Off }
            }
            (options::CA_INFO, Text(path)) => self.tls.ca_bundle = Some(PathBuf::from(path)),
            (options::USERPWD, Text(userpwd)) => {
                let scheme = self.auth.as_ref().map(|(_, s)| *s).unwrap_or(AuthScheme::Basic);
                self.auth = Some((Credentials::from_userpwd(userpwd), scheme));
            }
            (options::HTTP_AUTH, Text(name)) => match name.parse::<AuthScheme>() {
                Ok(scheme) => {
                    let creds = self
                        .auth
                        .take()
                        .map(|(c, _)| c)
                        .unwrap_or_else(|| Credentials::new("", ""));
                    self.auth = Some((creds, scheme));
                }
                Err(()) => log::warn!("ignoring option {key}: unknown scheme {name:?}"),
            },
            (options::PROXY, Text(url)) => self.proxy = Some(url.clone()),
            (options::PROXY_USERPWD, Text(userpwd)) => {
                self.proxy_auth = Some(Credentials::from_userpwd(userpwd))
            }
            (
                options::TIMEOUT
                | options::CONNECT_TIMEOUT
                | options::MAX_REDIRECTS
                | options::SSL_VERIFY_PEER
                | options::SSL_VERIFY_HOST
                | options::CA_INFO
                | options::USERPWD
                | options::HTTP_AUTH
                | options::PROXY
                | options::PROXY_USERPWD,
                _,
            ) => log::warn!("ignoring option {key}: unexpected value {value:?}"),
            _ => {
                self.extra.insert(key.to_string(), value.clone());
            }
        }
    }
}

/// Zero or negative means no timeout.
fn seconds(secs: i64) -> Option<Duration> {
    u64::try_from(secs).ok().filter(|&s| s > 0).map(Duration::from_secs)
}
