/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! [`HttpClient`] implementation backed by hyper and native-tls.
//!
//! The connector stack, outermost first:
//! - [`TrackedConnector`]: records activity on every connection so the idle connection reaper
//!   can close the ones that sat unused.
//! - `HttpsConnector`: TLS via `hyper-tls`.
//! - [`ProxyConnector`]: plain TCP, optionally through an HTTP proxy.

use crate::config::{ClientConfiguration, ProxyError};
use crate::conn::{BoxFuture, HttpClient};
use crate::reaper::{ConnectionPool, IdleConnectionReaper};
use http::header::{HeaderValue, PROXY_AUTHORIZATION};
use http::Uri;
use hyper::client::connect::{Connected, Connection};
use hyper::client::HttpConnector;
use hyper_tls::HttpsConnector;
use pin_project_lite::pin_project;
use smithy_http::body::SdkBody;
use smithy_http::error::BoxError;
use smithy_http::request::HttpRequest;
use smithy_http::response::HttpResponse;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tower::Service;

const MAX_TUNNEL_RESPONSE_HEAD: usize = 8 * 1024;

/// No response head arrived within the socket timeout
#[derive(Debug, thiserror::Error)]
#[error("no response received within {0:?}")]
pub struct ResponseTimeoutError(Duration);

struct ProxyTarget {
    uri: Uri,
    basic_auth: Option<String>,
}

impl Debug for ProxyTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyTarget")
            .field("uri", &self.uri)
            .field("basic_auth", &self.basic_auth.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Opens TCP connections, directly or through an HTTP proxy.
///
/// `https` destinations are tunneled through the proxy with `CONNECT`, so TLS runs end to end.
/// Connections for `http` destinations are marked as proxied and hyper sends absolute-form
/// requests over them.
#[derive(Clone, Debug)]
pub struct ProxyConnector {
    http: HttpConnector,
    proxy: Option<Arc<ProxyTarget>>,
}

impl ProxyConnector {
    fn new(config: &ClientConfiguration) -> Result<Self, ProxyError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(config.connection_timeout()));
        let proxy = match config.proxy() {
            Some(proxy) => Some(Arc::new(ProxyTarget {
                uri: proxy.uri()?,
                basic_auth: proxy.basic_auth(),
            })),
            None => None,
        };
        Ok(ProxyConnector { http, proxy })
    }
}

impl Service<Uri> for ProxyConnector {
    type Response = ProxyStream;
    type Error = BoxError;
    type Future = BoxFuture<Result<ProxyStream, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.http.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let proxy = match &self.proxy {
            Some(proxy) => proxy.clone(),
            None => {
                let connecting = self.http.call(dst);
                return Box::pin(async move {
                    Ok::<_, BoxError>(ProxyStream {
                        inner: connecting.await?,
                        proxied: false,
                    })
                });
            }
        };
        let connecting = self.http.call(proxy.uri.clone());
        Box::pin(async move {
            let mut stream = connecting.await?;
            if dst.scheme_str() == Some("https") {
                tunnel(&mut stream, &dst, proxy.basic_auth.as_deref()).await?;
                Ok::<_, BoxError>(ProxyStream {
                    inner: stream,
                    proxied: false,
                })
            } else {
                Ok::<_, BoxError>(ProxyStream {
                    inner: stream,
                    proxied: true,
                })
            }
        })
    }
}

/// Asks the proxy to open a tunnel to `dst` and waits for it to accept
async fn tunnel<S>(stream: &mut S, dst: &Uri, basic_auth: Option<&str>) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let host = dst
        .host()
        .ok_or_else(|| ProxyError::InvalidAddress(dst.to_string()))?;
    let port = dst.port_u16().unwrap_or(443);
    let mut head = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n",
        host = host,
        port = port
    );
    if let Some(auth) = basic_auth {
        head.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;

    let mut response = Vec::with_capacity(128);
    let mut chunk = [0_u8; 512];
    while !response.windows(4).any(|window| window == b"\r\n\r\n") {
        if response.len() > MAX_TUNNEL_RESPONSE_HEAD {
            return Err(ProxyError::TunnelRejected(
                "response head too large".to_string(),
            ));
        }
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(ProxyError::TunnelClosed);
        }
        response.extend_from_slice(&chunk[..read]);
    }
    let status_line = String::from_utf8_lossy(&response)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    let accepted = status_line
        .split_whitespace()
        .nth(1)
        .map(|status| status == "200")
        .unwrap_or(false);
    if accepted {
        tracing::trace!(%host, port, "proxy tunnel established");
        Ok(())
    } else {
        Err(ProxyError::TunnelRejected(status_line))
    }
}

pin_project! {
    /// A TCP connection, possibly to a proxy
    #[derive(Debug)]
    pub struct ProxyStream {
        #[pin]
        inner: TcpStream,
        proxied: bool,
    }
}

impl Connection for ProxyStream {
    fn connected(&self) -> Connected {
        self.inner.connected().proxy(self.proxied)
    }
}

impl AsyncRead for ProxyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().inner.poll_read(cx, buf)
    }
}

impl AsyncWrite for ProxyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

#[derive(Debug)]
struct StreamState {
    last_activity: Mutex<Instant>,
    closed: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl StreamState {
    fn new() -> Self {
        StreamState {
            last_activity: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
            waker: Mutex::new(None),
        }
    }

    fn touch(&self) {
        *lock(&self.last_activity) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        lock(&self.last_activity).elapsed()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn register(&self, waker: &Waker) {
        let mut current = lock(&self.waker);
        match &*current {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *current = Some(waker.clone()),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(waker) = lock(&self.waker).take() {
            waker.wake();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pin_project! {
    /// A connection whose last activity is tracked.
    ///
    /// Once closed by its [`TrackedPool`], reads return EOF and writes fail, which makes hyper
    /// drop the connection from its pool.
    pub struct TrackedStream<T> {
        #[pin]
        inner: T,
        state: Arc<StreamState>,
    }
}

impl<T: Connection> Connection for TrackedStream<T> {
    fn connected(&self) -> Connected {
        self.inner.connected()
    }
}

impl<T: AsyncRead> AsyncRead for TrackedStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        // registered before the check so a concurrent close always wakes this task
        this.state.register(cx.waker());
        if this.state.is_closed() {
            return Poll::Ready(Ok(()));
        }
        let before = buf.filled().len();
        let result = this.inner.poll_read(cx, buf);
        if buf.filled().len() > before {
            this.state.touch();
        }
        result
    }
}

impl<T: AsyncWrite> AsyncWrite for TrackedStream<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        if this.state.is_closed() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection closed as idle",
            )));
        }
        let result = this.inner.poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &result {
            if *written > 0 {
                this.state.touch();
            }
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

#[derive(Debug, Default)]
struct Registry {
    streams: Mutex<Vec<Weak<StreamState>>>,
}

impl Registry {
    fn track(&self) -> Arc<StreamState> {
        let state = Arc::new(StreamState::new());
        let mut streams = lock(&self.streams);
        streams.retain(|stream| stream.strong_count() > 0);
        streams.push(Arc::downgrade(&state));
        state
    }

    fn live(&self) -> Vec<Arc<StreamState>> {
        let mut streams = lock(&self.streams);
        streams.retain(|stream| stream.strong_count() > 0);
        streams.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Wraps a connector so every connection it opens is tracked by a [`TrackedPool`]
#[derive(Clone, Debug)]
pub struct TrackedConnector<C> {
    inner: C,
    registry: Arc<Registry>,
}

impl<C> TrackedConnector<C> {
    /// Wraps `inner`, returning the connector and the pool of its connections
    pub fn new(inner: C) -> (Self, TrackedPool) {
        let registry = Arc::new(Registry::default());
        let pool = TrackedPool {
            registry: registry.clone(),
        };
        (TrackedConnector { inner, registry }, pool)
    }
}

impl<C> Service<Uri> for TrackedConnector<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Error: Send + 'static,
    C::Future: Send + 'static,
{
    type Response = TrackedStream<C::Response>;
    type Error = C::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connecting = self.inner.call(dst);
        let registry = self.registry.clone();
        Box::pin(async move {
            let inner = connecting.await?;
            Ok::<_, C::Error>(TrackedStream {
                inner,
                state: registry.track(),
            })
        })
    }
}

/// The connections opened by a [`TrackedConnector`]
#[derive(Clone, Debug)]
pub struct TrackedPool {
    registry: Arc<Registry>,
}

impl TrackedPool {
    /// Number of connections that are still open
    pub fn open_connections(&self) -> usize {
        self.registry
            .live()
            .iter()
            .filter(|stream| !stream.is_closed())
            .count()
    }

    /// Closes every connection, busy or not
    pub fn close_all(&self) {
        for stream in self.registry.live() {
            stream.close();
        }
    }
}

impl ConnectionPool for TrackedPool {
    fn close_idle_connections(&self, idle: Duration) -> Result<(), BoxError> {
        let mut closed = 0;
        for stream in self.registry.live() {
            if !stream.is_closed() && stream.idle_for() >= idle {
                stream.close();
                closed += 1;
            }
        }
        if closed > 0 {
            tracing::debug!(closed, "closed idle connections");
        }
        Ok(())
    }
}

type Connector = TrackedConnector<HttpsConnector<ProxyConnector>>;

/// The default transport: a pooling hyper client with TLS, proxy support and idle connection
/// reaping.
pub struct HyperClient {
    client: hyper::Client<Connector, SdkBody>,
    pool: TrackedPool,
    reaper: Option<(IdleConnectionReaper, Arc<dyn ConnectionPool>)>,
    socket_timeout: Duration,
    proxy_authorization: Option<HeaderValue>,
}

impl Debug for HyperClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperClient")
            .field("pool", &self.pool)
            .field("reaper", &self.reaper.as_ref().map(|(reaper, _)| reaper))
            .field("socket_timeout", &self.socket_timeout)
            .finish()
    }
}

impl HyperClient {
    /// Builds the transport. When the configuration enables it, connections are reaped by a
    /// reaper owned by this client.
    pub fn new(config: &ClientConfiguration) -> Result<Self, BoxError> {
        let reaper = if config.use_reaper() {
            Some(IdleConnectionReaper::new())
        } else {
            None
        };
        Self::build(config, reaper)
    }

    /// Builds the transport, registering its connections with a shared `reaper` when the
    /// configuration enables reaping.
    pub fn with_reaper(
        config: &ClientConfiguration,
        reaper: IdleConnectionReaper,
    ) -> Result<Self, BoxError> {
        let reaper = if config.use_reaper() {
            Some(reaper)
        } else {
            None
        };
        Self::build(config, reaper)
    }

    fn build(
        config: &ClientConfiguration,
        reaper: Option<IdleConnectionReaper>,
    ) -> Result<Self, BoxError> {
        let mut tls = native_tls::TlsConnector::builder();
        if config.trust_all_certificates() {
            tls.danger_accept_invalid_certs(true);
            tls.danger_accept_invalid_hostnames(true);
        }
        for pem in config.additional_root_certificates() {
            tls.add_root_certificate(native_tls::Certificate::from_pem(pem)?);
        }
        let tls = tokio_native_tls::TlsConnector::from(tls.build()?);
        let https = HttpsConnector::from((ProxyConnector::new(config)?, tls));
        let (connector, pool) = TrackedConnector::new(https);

        let client = hyper::Client::builder()
            .pool_max_idle_per_host(config.max_connections())
            .retry_canceled_requests(false)
            .build::<_, SdkBody>(connector);

        let proxy_authorization = match config.proxy().and_then(|proxy| proxy.basic_auth()) {
            Some(auth) => Some(HeaderValue::from_str(&auth)?),
            None => None,
        };

        let reaper = reaper.map(|reaper| {
            let registered: Arc<dyn ConnectionPool> = Arc::new(pool.clone());
            reaper.register(registered.clone());
            (reaper, registered)
        });

        Ok(HyperClient {
            client,
            pool,
            reaper,
            socket_timeout: config.socket_timeout(),
            proxy_authorization,
        })
    }

    /// The connections of this client
    pub fn pool(&self) -> &TrackedPool {
        &self.pool
    }

    fn unregister(&self) {
        if let Some((reaper, pool)) = &self.reaper {
            reaper.unregister(pool);
        }
    }
}

/// Converts a transport response, keeping the reason phrase the server sent.
///
/// hyper only records the phrase when it differs from the canonical one for the status.
pub(crate) fn sdk_response<B: Into<SdkBody>>(response: http::Response<B>) -> HttpResponse {
    let reason = response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned());
    let response = HttpResponse::from(response);
    match reason {
        Some(reason) => response.with_status_text(reason),
        None => response,
    }
}

impl HttpClient for HyperClient {
    fn execute(&self, request: HttpRequest) -> BoxFuture<Result<HttpResponse, BoxError>> {
        let mut request = request.into_http();
        if let Some(auth) = &self.proxy_authorization {
            // tunneled requests authenticate in the CONNECT handshake instead
            if request.uri().scheme_str() == Some("http") {
                request
                    .headers_mut()
                    .insert(PROXY_AUTHORIZATION, auth.clone());
            }
        }
        let client = self.client.clone();
        let timeout = self.socket_timeout;
        Box::pin(async move {
            tracing::trace!(method = %request.method(), uri = %request.uri(), "sending request");
            let response = tokio::time::timeout(timeout, client.request(request))
                .await
                .map_err(|_| ResponseTimeoutError(timeout))??;
            Ok::<_, BoxError>(sdk_response(response))
        })
    }

    fn shutdown(&self) {
        self.pool.close_all();
        self.unregister();
    }
}

impl Drop for HyperClient {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{Protocol, ProxyConfig};
    use tokio::net::TcpListener;

    async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
        let mut head = Vec::new();
        let mut chunk = [0_u8; 256];
        while !head.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = stream.read(&mut chunk).await.expect("read");
            assert_ne!(read, 0, "closed before the end of the head");
            head.extend_from_slice(&chunk[..read]);
        }
        String::from_utf8(head).expect("utf-8 head")
    }

    fn config() -> crate::config::Builder {
        ClientConfiguration::builder()
            .protocol(Protocol::Http)
            .use_reaper(false)
    }

    fn get(uri: &str) -> HttpRequest {
        HttpRequest::from(
            http::Request::builder()
                .uri(uri)
                .body(SdkBody::empty())
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn tunnel_sends_connect_with_credentials() {
        let (mut client, mut proxy) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let head = read_head(&mut proxy).await;
            proxy
                .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                .await
                .unwrap();
            head
        });
        let dst = Uri::from_static("https://dynamodb.us-east-1.amazonaws.com");
        tunnel(&mut client, &dst, Some("Basic dXNlcjpwYXNz"))
            .await
            .expect("tunnel established");
        let head = server.await.unwrap();
        assert!(head.starts_with("CONNECT dynamodb.us-east-1.amazonaws.com:443 HTTP/1.1\r\n"));
        assert!(head.contains("Proxy-Authorization: Basic dXNlcjpwYXNz\r\n"));
    }

    #[tokio::test]
    async fn tunnel_rejection_is_an_error() {
        let (mut client, mut proxy) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            read_head(&mut proxy).await;
            proxy
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();
        });
        let dst = Uri::from_static("https://example.com:8443");
        let err = tunnel(&mut client, &dst, None).await.expect_err("rejected");
        assert!(
            matches!(&err, ProxyError::TunnelRejected(line) if line.contains("407")),
            "{:?}",
            err
        );
    }

    #[tokio::test]
    async fn tunnel_closed_by_proxy() {
        let (mut client, mut proxy) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            read_head(&mut proxy).await;
        });
        let dst = Uri::from_static("https://example.com");
        let err = tunnel(&mut client, &dst, None).await.expect_err("closed");
        assert!(matches!(err, ProxyError::TunnelClosed), "{:?}", err);
    }

    #[tokio::test]
    async fn plain_http_request_and_idle_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let head = read_head(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                .await
                .unwrap();
            // the client closes the pooled connection once it is reaped
            let mut rest = [0_u8; 16];
            let read = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut rest)).await;
            (head, read.map(|read| read.unwrap_or(0)))
        });

        let client = HyperClient::new(&config().build()).unwrap();
        let mut response = client
            .execute(get(&format!("http://127.0.0.1:{}/ping", port)))
            .await
            .expect("response");
        response.load_body().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.raw_content(), Some(&b"ok"[..]));
        assert_eq!(client.pool().open_connections(), 1);

        client
            .pool()
            .close_idle_connections(Duration::from_secs(0))
            .unwrap();
        let (head, read) = server.await.unwrap();
        assert!(head.starts_with("GET /ping HTTP/1.1\r\n"));
        assert_eq!(read.expect("connection closed before the timeout"), 0);
    }

    async fn serve_once(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_head(&mut socket).await;
            socket.write_all(reply).await.unwrap();
        });
        format!("http://127.0.0.1:{}/", port)
    }

    #[tokio::test]
    async fn server_reason_phrase_is_kept() {
        let client = HyperClient::new(&config().build()).unwrap();

        let uri = serve_once(b"HTTP/1.1 503 Slow Down\r\nContent-Length: 0\r\n\r\n").await;
        let slow_down = client.execute(get(&uri)).await.expect("response");
        assert_eq!(slow_down.status().as_u16(), 503);
        assert_eq!(slow_down.status_text(), "Slow Down");

        let uri =
            serve_once(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n").await;
        let unavailable = client.execute(get(&uri)).await.expect("response");
        assert_eq!(unavailable.status_text(), "Service Unavailable");
    }

    #[tokio::test]
    async fn http_through_proxy_uses_absolute_form() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let proxy = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let head = read_head(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\n\r\n")
                .await
                .unwrap();
            head
        });
        let config = config()
            .proxy(ProxyConfig::new("127.0.0.1", port).with_basic_auth("user", "pass"))
            .build();
        let client = HyperClient::new(&config).unwrap();
        let response = client
            .execute(get("http://example.com/path"))
            .await
            .expect("response");
        assert_eq!(response.status().as_u16(), 204);
        let head = proxy.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get http://example.com/path http/1.1\r\n"), "{}", head);
        assert!(head.contains("proxy-authorization: basic dxnlcjpwyxnz\r\n"), "{}", head);
    }

    #[tokio::test]
    async fn socket_timeout_bounds_waiting_for_a_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_head(&mut socket).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let config = config().socket_timeout(Duration::from_millis(100)).build();
        let client = HyperClient::new(&config).unwrap();
        let err = client
            .execute(get(&format!("http://127.0.0.1:{}/", port)))
            .await
            .expect_err("times out");
        assert!(err.downcast_ref::<ResponseTimeoutError>().is_some(), "{}", err);
    }

    #[tokio::test]
    async fn shutdown_unregisters_from_reaper() {
        let reaper = IdleConnectionReaper::with_settings(Duration::from_secs(3600), Duration::from_secs(60));
        let config = ClientConfiguration::builder().build();
        let client = HyperClient::with_reaper(&config, reaper.clone()).unwrap();
        let other = HyperClient::with_reaper(&config, reaper.clone()).unwrap();
        assert_eq!(reaper.pool_count(), 2);
        assert!(reaper.is_running());
        client.shutdown();
        assert_eq!(reaper.pool_count(), 1);
        drop(other);
        assert_eq!(reaper.pool_count(), 0);
        assert!(!reaper.is_running());
        drop(client);
    }
}
