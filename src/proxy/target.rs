//! Validation target configuration

use crate::error::EngineError;
use crate::proxy::matcher::{Matcher, DEFAULT_PATTERN};
use std::time::Duration;
use url::Url;

/// Default time budget for one attempt in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// What every worker fetches and how the response is judged
///
/// Built once per run and shared read-only between workers.
#[derive(Debug, Clone)]
pub struct ValidationTarget {
    url: Url,
    matcher: Matcher,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl ValidationTarget {
    pub fn builder(url: impl Into<String>) -> ValidationTargetBuilder {
        ValidationTargetBuilder::new(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Time budget for one attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether TLS certificates presented by the target are accepted unchecked
    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }
}

/// Builder for [`ValidationTarget`]
#[derive(Debug, Clone)]
pub struct ValidationTargetBuilder {
    url: String,
    pattern: String,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl ValidationTargetBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            // probing checks reachability and content, not the target's identity
            accept_invalid_certs: true,
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<ValidationTarget, EngineError> {
        let url = Url::parse(&self.url).map_err(|source| EngineError::InvalidTarget {
            url: self.url.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EngineError::UnsupportedTarget(url.scheme().to_string()));
        }
        if self.timeout.is_zero() {
            return Err(EngineError::InvalidTimeout);
        }
        let matcher = Matcher::compile(&self.pattern)?;

        Ok(ValidationTarget {
            url,
            matcher,
            timeout: self.timeout,
            accept_invalid_certs: self.accept_invalid_certs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults() {
        let target = ValidationTarget::builder("https://example.com").build().unwrap();
        assert_eq!(target.url().as_str(), "https://example.com/");
        assert_eq!(target.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(target.matcher().as_str(), DEFAULT_PATTERN);
        assert!(target.accept_invalid_certs());
    }

    #[test]
    fn test_target_builder() {
        let target = ValidationTarget::builder("http://example.com/ip")
            .pattern("origin")
            .timeout(Duration::from_millis(1500))
            .accept_invalid_certs(false)
            .build()
            .unwrap();
        assert_eq!(target.timeout(), Duration::from_millis(1500));
        assert_eq!(target.matcher().as_str(), "origin");
        assert!(!target.accept_invalid_certs());
    }

    #[test]
    fn test_target_rejects_bad_input() {
        assert!(matches!(
            ValidationTarget::builder("not a url").build(),
            Err(EngineError::InvalidTarget { .. })
        ));
        assert!(matches!(
            ValidationTarget::builder("ftp://example.com").build(),
            Err(EngineError::UnsupportedTarget(_))
        ));
        assert!(matches!(
            ValidationTarget::builder("http://example.com")
                .timeout(Duration::ZERO)
                .build(),
            Err(EngineError::InvalidTimeout)
        ));
        assert!(matches!(
            ValidationTarget::builder("http://example.com").pattern("").build(),
            Err(EngineError::EmptyPattern)
        ));
    }
}
