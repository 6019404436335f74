//! Bounded fetcher
//!
//! Fetches the target through a connector under a hard time budget and keeps
//! at most [`READ_LIMIT_BYTES`] of the body.

use crate::error::CheckError;
use crate::proxy::connector::{Connector, ResponseBody};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;
use url::Url;

/// Most body bytes captured per attempt
pub const READ_LIMIT_BYTES: usize = 64 * 1024;

/// Body prefix captured by one attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedResponse {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CapturedResponse {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the capture reached the byte limit
    ///
    /// A body of exactly the limit counts as truncated: reading stops there
    /// without waiting for end of body.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Fetch `url` through `connector` within `budget`
pub async fn fetch(
    connector: &Connector,
    url: &Url,
    budget: Duration,
) -> Result<CapturedResponse, CheckError> {
    fetch_until(connector, url, Instant::now() + budget).await
}

/// Fetch `url` through `connector`, giving up at `deadline`
///
/// Hitting the byte limit is not an error: the prefix read so far is
/// returned for matching as-is.
pub async fn fetch_until(
    connector: &Connector,
    url: &Url,
    deadline: Instant,
) -> Result<CapturedResponse, CheckError> {
    let attempt = async {
        let mut body = connector.get(url, deadline).await?;
        trace!(status = %body.status(), "response headers received");
        capture(&mut body, READ_LIMIT_BYTES).await
    };

    match tokio::time::timeout_at(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(CheckError::Timeout),
    }
}

async fn capture(body: &mut ResponseBody, limit: usize) -> Result<CapturedResponse, CheckError> {
    let mut bytes = Vec::new();
    let mut truncated = false;

    while bytes.len() < limit {
        let Some(chunk) = body.chunk().await? else {
            break;
        };
        let room = limit - bytes.len();
        if chunk.len() > room {
            bytes.extend_from_slice(&chunk[..room]);
            truncated = true;
        } else {
            bytes.extend_from_slice(&chunk);
        }
    }
    if bytes.len() == limit {
        truncated = true;
    }

    Ok(CapturedResponse { bytes, truncated })
}
