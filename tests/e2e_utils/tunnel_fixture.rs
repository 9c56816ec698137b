#![cfg(test)]
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use wsbridge::adapters::{RecordingMetrics, TunnelClient, TunnelServer};
use wsbridge::domain::{ClientConfig, ServerConfig, TunnelSettings};

/// Returns a port nothing listens on.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// Polls `check` until it holds, panicking after five seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..100 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {}", what);
}

pub fn test_settings() -> TunnelSettings {
    TunnelSettings {
        dial_timeout_secs: 5,
        close_grace_ms: 200,
        ..TunnelSettings::default()
    }
}

/// Server side of a tunnel, bound on an ephemeral port.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub metrics: Arc<RecordingMetrics>,
    _handle: JoinHandle<()>,
}

impl ServerHandle {
    pub async fn start(backend: SocketAddr, settings: TunnelSettings) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with_real_ip_header(backend, None, settings).await
    }

    pub async fn start_with_real_ip_header(
        backend: SocketAddr,
        real_ip_header: Option<&str>,
        settings: TunnelSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let metrics = Arc::new(RecordingMetrics::default());

        let config = ServerConfig::new(addr.to_string(), backend.to_string())
            .with_real_ip_header(real_ip_header.map(str::to_string));
        let server = TunnelServer::new(config, settings, metrics.clone());
        let handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Ok(Self {
            addr,
            metrics,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

/// Client side of a tunnel, bound on an ephemeral port.
pub struct ClientHandle {
    pub addr: SocketAddr,
    pub metrics: Arc<RecordingMetrics>,
    _handle: JoinHandle<()>,
}

impl ClientHandle {
    pub async fn start(target: &str, settings: TunnelSettings) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_on(0, target, settings).await
    }

    pub async fn start_on(port: u16, target: &str, settings: TunnelSettings) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;
        let metrics = Arc::new(RecordingMetrics::default());

        let client = TunnelClient::new(ClientConfig::new(addr.to_string(), target), settings, metrics.clone())?;
        let handle = tokio::spawn(async move {
            let _ = client.serve(listener).await;
        });

        Ok(Self {
            addr,
            metrics,
            _handle: handle,
        })
    }
}

/// A client tunnelling to a server which relays to `backend`.
pub struct TunnelFixture {
    pub server: ServerHandle,
    pub client: ClientHandle,
}

impl TunnelFixture {
    pub async fn setup(backend: SocketAddr) -> Result<Self, Box<dyn std::error::Error>> {
        let server = ServerHandle::start(backend, test_settings()).await?;
        let client = ClientHandle::start(&server.url(), test_settings()).await?;
        Ok(Self { server, client })
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client.addr
    }
}
