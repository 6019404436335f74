//! Error types
//!
//! [`CheckError`] describes why a single proxy failed validation. It never
//! leaves a worker: the engine folds every variant into a failed result.
//! [`EngineError`] covers whole-run conditions that abort before any worker
//! starts.

use thiserror::Error;

/// Reason a single validation attempt failed
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid proxy address {address:?}: {reason}")]
    InvalidProxyAddress { address: String, reason: String },

    #[error("unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),

    #[error("connect failed: {0}")]
    ConnectFailure(String),

    #[error("attempt exceeded its time budget")]
    Timeout,

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("response did not match pattern")]
    NoMatch,
}

impl CheckError {
    pub(crate) fn invalid_address(address: &str, reason: impl ToString) -> Self {
        CheckError::InvalidProxyAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transport(err: impl ToString) -> Self {
        CheckError::TransportFailure(err.to_string())
    }
}

impl From<reqwest::Error> for CheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CheckError::Timeout
        } else if err.is_connect() {
            CheckError::ConnectFailure(err.to_string())
        } else {
            CheckError::TransportFailure(err.to_string())
        }
    }
}

/// Fatal condition that prevents a validation run from starting
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no proxies provided")]
    NoProxies,

    #[error("regex cannot be empty")]
    EmptyPattern,

    #[error("invalid regex: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("timeout must be greater than 0")]
    InvalidTimeout,

    #[error("invalid target url {url:?}: {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target url must use http or https, got {0:?}")]
    UnsupportedTarget(String),

    #[error("work queue closed before all proxies were enqueued")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_error_display() {
        let err = CheckError::invalid_address("1.2.3.4:abc", "invalid port number");
        assert_eq!(
            err.to_string(),
            "invalid proxy address \"1.2.3.4:abc\": invalid port number"
        );
        assert_eq!(
            CheckError::UnsupportedScheme("ftp".to_string()).to_string(),
            "unsupported proxy scheme: ftp"
        );
    }

    #[test]
    fn test_engine_error_from_regex() {
        let err: EngineError = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, EngineError::InvalidPattern(_)));
        assert!(err.to_string().starts_with("invalid regex:"));
    }
}
