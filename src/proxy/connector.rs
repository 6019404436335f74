//! Connector factory
//!
//! One connector is built per attempt from a resolved endpoint and routes the
//! attempt's request through that proxy. HTTP and HTTPS proxies use the
//! client's own forward-proxy support; SOCKS proxies go through
//! [`SocksConnector`].

use crate::error::CheckError;
use crate::proxy::models::{ProxyEndpoint, Scheme};
use crate::proxy::target::ValidationTarget;
use crate::proxy::tunnel::{SocksConnector, TunnelResponse, MAX_REDIRECTS};
use bytes::Bytes;
use reqwest::{redirect, Client, Proxy as ReqwestProxy, StatusCode};
use tokio::time::Instant;
use url::Url;

/// Per-proxy connector, selected once by scheme
pub enum Connector {
    Forward(ForwardConnector),
    Socks(SocksConnector),
}

impl Connector {
    /// Build the connector for `endpoint`
    pub fn build(endpoint: &ProxyEndpoint, target: &ValidationTarget) -> Result<Self, CheckError> {
        match endpoint.scheme {
            Scheme::Http | Scheme::Https => {
                ForwardConnector::new(endpoint, target).map(Connector::Forward)
            }
            Scheme::Socks4 | Scheme::Socks4a | Scheme::Socks5 => {
                SocksConnector::new(endpoint, target.accept_invalid_certs()).map(Connector::Socks)
            }
        }
    }

    /// Issue a GET for `url`; the returned body has not been read yet
    pub async fn get(&self, url: &Url, deadline: Instant) -> Result<ResponseBody, CheckError> {
        match self {
            Connector::Forward(forward) => forward.get(url).await.map(ResponseBody::Forward),
            Connector::Socks(socks) => socks.get(url, deadline).await.map(ResponseBody::Tunnel),
        }
    }
}

/// HTTP forward-proxy connector
pub struct ForwardConnector {
    client: Client,
}

impl ForwardConnector {
    pub fn new(endpoint: &ProxyEndpoint, target: &ValidationTarget) -> Result<Self, CheckError> {
        let proxy = ReqwestProxy::all(endpoint.url())
            .map_err(|e| CheckError::invalid_address(&endpoint.url(), e))?;

        // idle pooling is off so the socket closes with the attempt
        let client = Client::builder()
            .proxy(proxy)
            .timeout(target.timeout())
            .danger_accept_invalid_certs(target.accept_invalid_certs())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .pool_max_idle_per_host(0)
            .build()
            .map_err(CheckError::transport)?;

        Ok(Self { client })
    }

    pub async fn get(&self, url: &Url) -> Result<reqwest::Response, CheckError> {
        Ok(self.client.get(url.clone()).send().await?)
    }
}

/// Response whose body is still to be read
pub enum ResponseBody {
    Forward(reqwest::Response),
    Tunnel(TunnelResponse),
}

impl ResponseBody {
    pub fn status(&self) -> StatusCode {
        match self {
            ResponseBody::Forward(response) => response.status(),
            ResponseBody::Tunnel(response) => response.status(),
        }
    }

    /// Next body chunk, or `None` at end of body
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, CheckError> {
        match self {
            ResponseBody::Forward(response) => Ok(response.chunk().await?),
            ResponseBody::Tunnel(response) => response.chunk().await,
        }
    }
}
