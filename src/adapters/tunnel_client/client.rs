use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::dialer::TungsteniteDialer;
use crate::domain::{
    dial_following_redirects, ClientConfig, ConnectionBridge, ConnectionKind, Result, TunnelError, TunnelSettings,
};
use crate::ports::{ActiveConnection, MessageStream, MetricsPort, WebSocketDialer};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Local TCP listener that tunnels every accepted connection over a fresh
/// WebSocket connection.
pub struct TunnelClient<D> {
    config: ClientConfig,
    settings: TunnelSettings,
    dialer: Arc<D>,
    metrics: Arc<dyn MetricsPort>,
}

impl TunnelClient<TungsteniteDialer> {
    pub fn new(config: ClientConfig, settings: TunnelSettings, metrics: Arc<dyn MetricsPort>) -> Result<Self> {
        let dialer = TungsteniteDialer::new(config.insecure)?;
        Ok(Self::with_dialer(config, settings, dialer, metrics))
    }
}

impl<D> TunnelClient<D>
where
    D: WebSocketDialer + 'static,
    D::Stream: MessageStream,
{
    pub fn with_dialer(config: ClientConfig, settings: TunnelSettings, dialer: D, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            config,
            settings,
            dialer: Arc::new(dialer),
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
            Ok(addr) => info!("Listening to {} (tunnel to {})", addr, self.config.target),
            Err(_) => info!("Listening to {} (tunnel to {})", self.config.listen, self.config.target),
        }
        let client = Arc::new(self);
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let client = client.clone();
                    let span = info_span!("tunnel", id = %Uuid::new_v4(), peer = %peer);
                    tokio::spawn(async move { client.handle(stream, peer).await }.instrument(span));
                }
                Err(e) => {
                    warn!("could not accept the connection: {}", e);
                    sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let _active = ActiveConnection::new(self.metrics.clone());
        self.metrics.connection_opened(ConnectionKind::Tcp);
        info!("Client connected from {}", peer);

        let messages = match dial_following_redirects(self.dialer.as_ref(), &self.config.target, &self.settings).await {
            Ok(messages) => messages,
            Err(e) => {
                if let Some(category) = e.category() {
                    self.metrics.error(category);
                }
                warn!("Error while dialing {}: {}", self.config.target, e);
                return;
            }
        };
        self.metrics.connection_opened(ConnectionKind::Http);
        info!("Connected to {}", self.config.target);

        let summary = ConnectionBridge::from_settings(&self.settings, self.metrics.clone())
            .with_idle_timeout(self.settings.idle_timeout())
            .run(stream, messages)
            .await;
        info!("Client disconnected: {}", summary);
    }
}
