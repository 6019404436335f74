//! Response matcher

use crate::error::EngineError;
use crate::proxy::fetcher::CapturedResponse;
use regex::bytes::Regex;

/// Pattern used when the caller does not supply one
pub const DEFAULT_PATTERN: &str = ".*";

/// Precompiled pattern applied to captured response bytes
///
/// The regex engine runs in linear time, so a hostile pattern cannot stall a
/// worker once it has compiled.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: Regex,
}

impl Matcher {
    pub fn compile(pattern: &str) -> Result<Self, EngineError> {
        if pattern.is_empty() {
            return Err(EngineError::EmptyPattern);
        }
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Unanchored search over the raw bytes, which need not be UTF-8
    pub fn is_match(&self, bytes: &[u8]) -> bool {
        self.pattern.is_match(bytes)
    }

    pub fn matches(&self, response: &CapturedResponse) -> bool {
        self.is_match(response.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}
