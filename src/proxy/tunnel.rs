//! SOCKS tunnel connector
//!
//! Dials the target through a SOCKS4, SOCKS4a or SOCKS5 proxy, optionally
//! wraps the tunnel in TLS, and speaks HTTP/1.1 over it with hyper. Redirects
//! are followed here because every hop may name a different host and so
//! needs a fresh tunnel.

use crate::error::CheckError;
use crate::proxy::models::{ProxyEndpoint, Scheme};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, CONNECTION, HOST, LOCATION, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_socks::tcp::{Socks4Stream, Socks5Stream};
use tracing::{debug, trace};
use url::{Host, Position, Url};

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// User agent sent on tunneled requests
const TUNNEL_USER_AGENT: &str = concat!("proxyra/", env!("CARGO_PKG_VERSION"));

/// Byte stream carrying HTTP to the target, plain or TLS
trait TunnelIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> TunnelIo for T {}

/// Aborts the wrapped task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// SOCKS protocol flavour, fixed when the connector is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocksVersion {
    /// Target resolved locally, IPv4 only
    V4,
    /// Target name resolved by the proxy
    V4a,
    V5,
}

/// Connector that reaches the target through a SOCKS CONNECT tunnel
#[derive(Debug, Clone)]
pub struct SocksConnector {
    proxy: String,
    version: SocksVersion,
    accept_invalid_certs: bool,
}

impl SocksConnector {
    pub fn new(endpoint: &ProxyEndpoint, accept_invalid_certs: bool) -> Result<Self, CheckError> {
        let version = match endpoint.scheme {
            Scheme::Socks4 => SocksVersion::V4,
            Scheme::Socks4a => SocksVersion::V4a,
            Scheme::Socks5 => SocksVersion::V5,
            Scheme::Http | Scheme::Https => {
                return Err(CheckError::UnsupportedScheme(endpoint.scheme.to_string()))
            }
        };
        if endpoint.auth.is_some() {
            debug!(proxy = %endpoint, "proxy credentials are not used for socks tunnels");
        }

        Ok(Self {
            proxy: endpoint.authority(),
            version,
            accept_invalid_certs,
        })
    }

    /// GET `url` through the tunnel, following redirects
    pub async fn get(&self, url: &Url, deadline: Instant) -> Result<TunnelResponse, CheckError> {
        let mut current = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            let response = self.exchange(&current, deadline).await?;
            match redirect_target(&current, &response) {
                Some(next) => {
                    trace!(from = %current, to = %next, "following redirect");
                    current = next;
                }
                None => return Ok(response),
            }
        }
        Err(CheckError::TransportFailure(format!(
            "too many redirects (limit {})",
            MAX_REDIRECTS
        )))
    }

    /// One request/response over a freshly dialed tunnel
    async fn exchange(&self, url: &Url, deadline: Instant) -> Result<TunnelResponse, CheckError> {
        let host = url
            .host()
            .map(|host| match host {
                Host::Domain(domain) => domain.to_string(),
                Host::Ipv4(ip) => ip.to_string(),
                Host::Ipv6(ip) => ip.to_string(),
            })
            .ok_or_else(|| CheckError::transport(format!("url has no host: {}", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| CheckError::transport(format!("url has no port: {}", url)))?;

        let stream = self.dial(&host, port, deadline).await?;
        let io: Box<dyn TunnelIo> = if url.scheme() == "https" {
            Box::new(self.wrap_tls(&host, stream).await?)
        } else {
            Box::new(stream)
        };

        let (mut sender, conn) = http1::handshake(TokioIo::new(io))
            .await
            .map_err(CheckError::transport)?;

        let driver = AbortOnDrop(tokio::spawn(async move {
            if let Err(err) = conn.await {
                trace!("tunnel connection closed: {}", err);
            }
        }));

        let request = Request::builder()
            .method(Method::GET)
            .uri(&url[Position::BeforePath..Position::AfterQuery])
            .header(HOST, &url[Position::BeforeHost..Position::AfterPort])
            .header(USER_AGENT, TUNNEL_USER_AGENT)
            .header(ACCEPT, "*/*")
            .header(CONNECTION, "close")
            .body(Empty::<Bytes>::new())
            .map_err(CheckError::transport)?;

        let response = sender
            .send_request(request)
            .await
            .map_err(CheckError::transport)?;

        Ok(TunnelResponse {
            response,
            _driver: driver,
        })
    }

    /// Race the SOCKS handshake against the attempt deadline
    ///
    /// The handshake runs in its own task. A stream that arrives after the
    /// deadline finds the receiver gone and is dropped there, and the task
    /// itself is aborted as soon as this future stops waiting for it.
    async fn dial(
        &self,
        host: &str,
        port: u16,
        deadline: Instant,
    ) -> Result<TcpStream, CheckError> {
        let (tx, rx) = oneshot::channel();
        let proxy = self.proxy.clone();
        let version = self.version;
        let host = host.to_string();

        let _dial = AbortOnDrop(tokio::spawn(async move {
            let outcome = socks_connect(&proxy, version, &host, port).await;
            if let Err(Ok(late)) = tx.send(outcome) {
                debug!(proxy = %proxy, "closing socks connection that arrived after the deadline");
                drop(late);
            }
        }));

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CheckError::ConnectFailure(
                "dial task ended without a result".to_string(),
            )),
            Err(_) => Err(CheckError::Timeout),
        }
    }

    async fn wrap_tls(
        &self,
        host: &str,
        stream: TcpStream,
    ) -> Result<tokio_native_tls::TlsStream<TcpStream>, CheckError> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .danger_accept_invalid_hostnames(self.accept_invalid_certs)
            .build()
            .map_err(|e| CheckError::transport(format!("TLS connector creation failed: {}", e)))?;

        tokio_native_tls::TlsConnector::from(connector)
            .connect(host, stream)
            .await
            .map_err(|e| CheckError::transport(format!("TLS handshake failed: {}", e)))
    }
}

/// Perform the SOCKS handshake and return the raw tunneled stream
async fn socks_connect(
    proxy: &str,
    version: SocksVersion,
    host: &str,
    port: u16,
) -> Result<TcpStream, CheckError> {
    let proxy: SocketAddr = tokio::net::lookup_host(proxy)
        .await
        .map_err(|e| CheckError::ConnectFailure(format!("cannot resolve proxy {}: {}", proxy, e)))?
        .next()
        .ok_or_else(|| CheckError::ConnectFailure(format!("no address for proxy {}", proxy)))?;

    let stream = match version {
        SocksVersion::V5 => Socks5Stream::connect(proxy, (host, port))
            .await
            .map(Socks5Stream::into_inner),
        SocksVersion::V4a => Socks4Stream::connect(proxy, (host, port))
            .await
            .map(Socks4Stream::into_inner),
        SocksVersion::V4 => {
            let addr = resolve_ipv4(host, port).await?;
            Socks4Stream::connect(proxy, addr)
                .await
                .map(Socks4Stream::into_inner)
        }
    };
    stream.map_err(|e| CheckError::ConnectFailure(format!("socks handshake via {}: {}", proxy, e)))
}

/// SOCKS4 carries only IPv4 destinations
async fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, CheckError> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| CheckError::ConnectFailure(format!("cannot resolve {}: {}", host, e)))?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| CheckError::ConnectFailure(format!("no IPv4 address for {}", host)))
}

fn redirect_target(current: &Url, response: &TunnelResponse) -> Option<Url> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }
    let location = response.response.headers().get(LOCATION)?.to_str().ok()?;
    current
        .join(location)
        .ok()
        .filter(|next| matches!(next.scheme(), "http" | "https"))
}

/// Response read over a tunnel
///
/// Owns the connection driver, so dropping it closes the tunnel.
pub struct TunnelResponse {
    response: Response<Incoming>,
    _driver: AbortOnDrop<()>,
}

impl TunnelResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Next body chunk, or `None` at end of body
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, CheckError> {
        loop {
            match self.response.body_mut().frame().await {
                None => return Ok(None),
                Some(Err(err)) => return Err(CheckError::transport(err)),
                Some(Ok(frame)) => {
                    // trailers carry no body bytes
                    if let Ok(data) = frame.into_data() {
                        return Ok(Some(data));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::resolver::SchemeResolver;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn test_connector_rejects_http_endpoint() {
        let endpoint = SchemeResolver::resolve("http://127.0.0.1:8080").unwrap();
        assert!(matches!(
            SocksConnector::new(&endpoint, true),
            Err(CheckError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_connector_version_selection() {
        for (address, version) in [
            ("socks4://127.0.0.1:1080", SocksVersion::V4),
            ("socks4a://127.0.0.1:1080", SocksVersion::V4a),
            ("127.0.0.1:1080", SocksVersion::V5),
        ] {
            let endpoint = SchemeResolver::resolve(address).unwrap();
            let connector = SocksConnector::new(&endpoint, true).unwrap();
            assert_eq!(connector.version, version);
            assert_eq!(connector.proxy, "127.0.0.1:1080");
        }
    }

    #[tokio::test]
    async fn test_dial_abandoned_at_deadline() {
        // accepts the TCP connection but never answers the greeting
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let endpoint = SchemeResolver::resolve(&addr.to_string()).unwrap();
        let connector = SocksConnector::new(&endpoint, true).unwrap();
        let start = Instant::now();
        let result = connector
            .dial("example.com", 80, start + Duration::from_millis(300))
            .await;

        assert!(matches!(result, Err(CheckError::Timeout)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_dial_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = SchemeResolver::resolve(&format!("socks5://{}", addr)).unwrap();
        let connector = SocksConnector::new(&endpoint, true).unwrap();
        let result = connector
            .dial("example.com", 80, Instant::now() + Duration::from_secs(2))
            .await;

        assert!(matches!(result, Err(CheckError::ConnectFailure(_))));
    }
}
