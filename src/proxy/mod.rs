//! Proxy module for validating proxies against a target
//!
//! This module provides functionality for:
//! - Resolving proxy addresses into scheme-tagged endpoints
//! - Building a per-scheme connector (HTTP forward proxy or SOCKS tunnel)
//! - Fetching the target under time and size bounds
//! - Matching the captured response against a pattern
//! - Running many validations concurrently with a worker pool

pub mod connector;
pub mod engine;
pub mod fetcher;
pub mod matcher;
pub mod models;
pub mod resolver;
pub mod target;
pub mod tunnel;

pub use connector::{Connector, ForwardConnector, ResponseBody};
pub use engine::{EngineConfig, RunSummary, Validation, ValidationEngine, Validator};
pub use fetcher::{fetch, CapturedResponse, READ_LIMIT_BYTES};
pub use matcher::Matcher;
pub use models::{ProxyAuth, ProxyEndpoint, Scheme, ValidationResult, ValidationStatus};
pub use resolver::SchemeResolver;
pub use target::{ValidationTarget, ValidationTargetBuilder};
pub use tunnel::{SocksConnector, TunnelResponse};
