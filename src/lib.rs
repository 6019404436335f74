//! Proxyra - Concurrent Proxy Validator
//!
//! Fetches a target URL through each proxy in a list and reports the proxies
//! whose response matches a pattern. HTTP, HTTPS, SOCKS4, SOCKS4a and SOCKS5
//! proxies are supported.

pub mod error;
pub mod input;
pub mod proxy;

pub use error::{CheckError, EngineError};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
