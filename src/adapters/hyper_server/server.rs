use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::upgrade::Upgraded;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ServerBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::upgrade::{accept_key, switching_protocols};
use crate::domain::{
    ConnectionBridge, ConnectionKind, ErrorCategory, PeerIdentity, Result, ServerConfig, TunnelError, TunnelSettings,
};
use crate::ports::{ActiveConnection, MetricsPort};

type Body = BoxBody<Bytes, hyper::Error>;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// HTTP listener upgrading requests to WebSocket and relaying each one to a
/// fixed backend TCP address.
pub struct TunnelServer {
    config: ServerConfig,
    settings: TunnelSettings,
    metrics: Arc<dyn MetricsPort>,
}

impl TunnelServer {
    pub fn new(config: ServerConfig, settings: TunnelSettings, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            config,
            settings,
            metrics,
        }
    }

    pub async fn listen_and_serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen)
            .await
            .map_err(|source| TunnelError::Startup {
                addr: self.config.listen.clone(),
                source,
            })?;
        self.serve(listener).await
    }

    /// Runs the accept loop on an already bound listener. Only returns on
    /// task cancellation.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        match listener.local_addr() {
            Ok(addr) => info!("Listening to {} (backend {})", addr, self.config.backend),
            Err(_) => info!("Listening to {} (backend {})", self.config.listen, self.config.backend),
        }
        let server = Arc::new(self);
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let server = server.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let server = server.clone();
                            async move { Ok::<_, Infallible>(server.handle(req, remote)) }
                        });

                        if let Err(err) = ServerBuilder::new(TokioExecutor::new())
                            .serve_connection_with_upgrades(io, service)
                            .await
                        {
                            debug!("HTTP connection from {} ended: {}", remote, err);
                        }
                    });
                }
                Err(e) => {
                    warn!("could not accept the connection: {}", e);
                    sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    fn handle(self: &Arc<Self>, req: Request<Incoming>, remote: SocketAddr) -> Response<Body> {
        if req.uri().path() == "/metrics" {
            return self.metrics_response();
        }
        self.upgrade(req, remote)
    }

    fn metrics_response(&self) -> Response<Body> {
        match self.metrics.render() {
            Some(text) => {
                let mut response = full(StatusCode::OK, text);
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
                response
            }
            None => empty(StatusCode::NOT_FOUND),
        }
    }

    fn upgrade(self: &Arc<Self>, mut req: Request<Incoming>, remote: SocketAddr) -> Response<Body> {
        let active = ActiveConnection::new(self.metrics.clone());
        let header = self.config.real_ip_header.as_deref();
        let value = header
            .and_then(|name| req.headers().get(name))
            .and_then(|v| v.to_str().ok());
        let peer = PeerIdentity::resolve(remote, header, value);
        let span = info_span!("tunnel", id = %Uuid::new_v4(), peer = %peer);

        let response = accept_key(req.method(), req.headers())
            .and_then(|key| switching_protocols(&key, empty_body()));
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.metrics.error(ErrorCategory::Upgrade);
                span.in_scope(|| warn!("Error while upgrading: {}", e));
                return full(StatusCode::BAD_REQUEST, "Bad Request\n");
            }
        };

        let on_upgrade = hyper::upgrade::on(&mut req);
        let server = self.clone();
        tokio::spawn(
            async move {
                let _active = active;
                match on_upgrade.await {
                    Ok(upgraded) => server.tunnel(upgraded).await,
                    Err(e) => {
                        server.metrics.error(ErrorCategory::Upgrade);
                        warn!("Error while upgrading: {}", e);
                    }
                }
            }
            .instrument(span),
        );
        response
    }

    async fn tunnel(&self, upgraded: Upgraded) {
        let mut messages = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await;
        self.metrics.connection_opened(ConnectionKind::Http);
        info!("Client connected");

        let backend = match self.dial_backend().await {
            Ok(backend) => backend,
            Err(e) => {
                self.metrics.error(ErrorCategory::DialTcp);
                warn!("Error while dialing: {}", e);
                if let Err(e) = timeout(self.settings.close_grace(), messages.close(None))
                    .await
                    .unwrap_or(Ok(()))
                {
                    debug!("websocket close: {}", e);
                }
                return;
            }
        };
        self.metrics.connection_opened(ConnectionKind::Tcp);
        info!("Connected to TCP: {}", self.config.backend);

        // No idle timeout here: the HTTP connection bounds the tunnel.
        let summary = ConnectionBridge::from_settings(&self.settings, self.metrics.clone())
            .run(backend, messages)
            .await;
        info!("Client disconnected: {}", summary);
    }

    async fn dial_backend(&self) -> Result<TcpStream> {
        let backend = &self.config.backend;
        match timeout(self.settings.dial_timeout(), TcpStream::connect(backend)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(TunnelError::dial(backend, e)),
            Err(_) => Err(TunnelError::dial(backend, "connect timed out")),
        }
    }
}

fn empty_body() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

fn full(status: StatusCode, body: impl Into<Bytes>) -> Response<Body> {
    let mut response = Response::new(Full::new(body.into()).map_err(|never| match never {}).boxed());
    *response.status_mut() = status;
    response
}
