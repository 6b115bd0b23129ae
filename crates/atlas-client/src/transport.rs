//! HTTP transport.
//!
//! `HyperTransport` opens one connection per request (TCP, plus rustls for
//! `https`), drives a hyper http1 exchange and collects the whole body.
//! It reports only whether a response was obtained; deciding what the
//! response means is the normalizer's job.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, Uri};
use http_body_util::{BodyExt, Full};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// A request as the client layer describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, sent with `content-type: application/json`.
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// A response that made it back over the wire, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }
}

/// Why no response was obtained.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("tls failed: {0}")]
    Tls(String),

    #[error("http handshake failed: {0}")]
    Handshake(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("reading response body failed: {0}")]
    Body(String),
}

/// Boxed future returned by transports.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send + 'a>>;

/// Sends one request and hands back the raw response.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// hyper + rustls transport.
#[derive(Clone)]
pub struct HyperTransport {
    tls: tokio_rustls::TlsConnector,
    user_agent: String,
}

impl HyperTransport {
    /// Create a transport trusting the Mozilla root certificate store.
    pub fn new() -> Result<Self, TransportError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(format!("tls protocol version error: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            tls: tokio_rustls::TlsConnector::from(Arc::new(config)),
            user_agent: format!("atlasgrid/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    async fn round_trip(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let uri: Uri = request
            .url
            .parse()
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", request.url)))?;
        let https = match uri.scheme_str() {
            Some("https") | None => true,
            Some("http") => false,
            Some(other) => {
                return Err(TransportError::InvalidUrl(format!("unsupported scheme `{other}`")));
            }
        };
        let host = uri
            .host()
            .ok_or_else(|| TransportError::InvalidUrl(format!("no host in {}", request.url)))?
            .to_string();
        let default_port = if https { 443 } else { 80 };
        let port = uri.port_u16().unwrap_or(default_port);
        let host_header = if port == default_port {
            host.clone()
        } else {
            format!("{host}:{port}")
        };
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| TransportError::Connect(format!("{host}:{port}: {e}")))?;

        let req = self.build_request(&request, &host_header, &path)?;

        if https {
            let server_name = rustls::pki_types::ServerName::try_from(host.clone())
                .map_err(|e| {
                    TransportError::Tls(format!("invalid tls server name '{host}': {e}"))
                })?;
            let tls_stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            exchange(tls_stream, req).await
        } else {
            exchange(stream, req).await
        }
    }

    fn build_request(
        &self,
        request: &ApiRequest,
        host_header: &str,
        path: &str,
    ) -> Result<http::Request<Full<Bytes>>, TransportError> {
        let mut builder = http::Request::builder()
            .method(request.method.clone())
            .uri(path)
            .header(http::header::HOST, host_header)
            .header(http::header::USER_AGENT, self.user_agent.as_str())
            .header(http::header::ACCEPT, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let body = match &request.body {
            Some(bytes) => {
                builder = builder.header(http::header::CONTENT_TYPE, "application/json");
                Full::new(Bytes::from(bytes.clone()))
            }
            None => Full::new(Bytes::new()),
        };
        builder
            .body(body)
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

impl HttpTransport for HyperTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
        Box::pin(self.round_trip(request))
    }
}

/// Run one http1 exchange over an established stream.
async fn exchange<I>(
    io: I,
    req: http::Request<Full<Bytes>>,
) -> Result<RawResponse, TransportError>
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = hyper_util::rt::TokioIo::new(io);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "connection closed with error");
        }
    });

    let uri = req.uri().clone();
    let response = sender
        .send_request(req)
        .await
        .map_err(|e| TransportError::Request(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| TransportError::Body(e.to_string()))?
        .to_bytes();
    debug!(%uri, status, bytes = body.len(), "response received");
    Ok(RawResponse { status, body })
}

/// Transport that replays queued outcomes and records requests (for testing).
///
/// Clones share the queue and the request log, so a test can keep one
/// handle while the client owns another.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    replies: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Result<RawResponse, TransportError>) -> &Self {
        self.inner
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    pub fn push_json(&self, status: u16, value: serde_json::Value) -> &Self {
        self.push(Ok(RawResponse::json(status, &value)))
    }

    pub fn push_failure(&self) -> &Self {
        self.push(Err(TransportError::Connect("connection refused".into())))
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let reply = self
            .inner
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no scripted reply left".into())));
        Box::pin(async move { reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP/1.1 response on a random port.
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn hyper_transport_returns_status_and_body() {
        let (base, server) = one_shot_server(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 13\r\nconnection: close\r\n\r\n{\"probes\":[]}",
        )
        .await;
        let transport = HyperTransport::new().unwrap();

        let response = transport
            .send(
                ApiRequest::get(format!("{base}/api/v2/probes/all"))
                    .header("authorization", "Key k"),
            )
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"{\"probes\":[]}");

        let seen = server.await.unwrap();
        assert!(seen.starts_with("GET /api/v2/probes/all HTTP/1.1"));
        assert!(seen.to_lowercase().contains("authorization: key k"));
    }

    #[tokio::test]
    async fn hyper_transport_keeps_non_2xx_responses() {
        let (base, server) = one_shot_server(
            "HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n",
        )
        .await;
        let transport = HyperTransport::new().unwrap();

        let response = transport
            .send(ApiRequest::new(Method::DELETE, format!("{base}/api/v2/measurements/1")))
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn hyper_transport_reports_refused_connections() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HyperTransport::new().unwrap();
        let result = transport.send(ApiRequest::get(format!("http://{addr}/"))).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn hyper_transport_rejects_unknown_schemes() {
        let transport = HyperTransport::new().unwrap();
        let result = transport.send(ApiRequest::get("ftp://example.org/x")).await;
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(200, serde_json::json!({"a": 1}))
            .push_failure();

        let first = transport.send(ApiRequest::get("https://x/1")).await.unwrap();
        assert_eq!(first.status, 200);
        assert!(transport.send(ApiRequest::get("https://x/2")).await.is_err());
        // Exhausted queue behaves like a dead network.
        assert!(transport.send(ApiRequest::get("https://x/3")).await.is_err());

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["https://x/1", "https://x/2", "https://x/3"]);
    }
}
