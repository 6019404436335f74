//! Proxy data models

use crate::error::CheckError;
use std::fmt;
use std::str::FromStr;

/// Proxy transport scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    Http,
    Https,
    Socks4,
    Socks4a,
    #[default]
    Socks5,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Socks4 => "socks4",
            Scheme::Socks4a => "socks4a",
            Scheme::Socks5 => "socks5",
        }
    }

    /// Whether this scheme tunnels through a SOCKS handshake
    pub fn is_socks(&self) -> bool {
        matches!(self, Scheme::Socks4 | Scheme::Socks4a | Scheme::Socks5)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            "socks4" => Ok(Scheme::Socks4),
            "socks4a" => Ok(Scheme::Socks4a),
            "socks5" => Ok(Scheme::Socks5),
            _ => Err(CheckError::UnsupportedScheme(s.to_string())),
        }
    }
}

/// Credentials found in the userinfo part of a proxy address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    pub username: String,
    pub password: Option<String>,
}

impl ProxyAuth {
    pub fn new(username: String, password: Option<String>) -> Self {
        Self { username, password }
    }
}

/// A resolved proxy endpoint
///
/// `host` is kept in URL form, so IPv6 literals carry their brackets and
/// `authority()` can be handed straight to a dialer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub auth: Option<ProxyAuth>,
}

impl ProxyEndpoint {
    pub fn new(scheme: Scheme, host: String, port: u16) -> Self {
        Self {
            scheme,
            host,
            port,
            auth: None,
        }
    }

    pub fn with_auth(mut self, auth: ProxyAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Get the endpoint in HOST:PORT form
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the proxy URL without credentials
    pub fn url(&self) -> String {
        format!("{}://{}", self.scheme, self.authority())
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Terminal state of one validation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Passed { elapsed_ms: u64 },
    Failed,
}

/// A proxy address tagged with the outcome of its attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub proxy: String,
    pub status: ValidationStatus,
}

impl ValidationResult {
    pub fn passed(proxy: String, elapsed_ms: u64) -> Self {
        Self {
            proxy,
            status: ValidationStatus::Passed { elapsed_ms },
        }
    }

    pub fn failed(proxy: String) -> Self {
        Self {
            proxy,
            status: ValidationStatus::Failed,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.status, ValidationStatus::Passed { .. })
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        match self.status {
            ValidationStatus::Passed { elapsed_ms } => Some(elapsed_ms),
            ValidationStatus::Failed => None,
        }
    }
}
