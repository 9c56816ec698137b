use std::sync::Arc;

use async_trait::async_trait;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::{header::LOCATION, StatusCode};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::tls::client_config;
use crate::domain::{Result, TunnelError};
use crate::ports::{DialOutcome, WebSocketDialer};

pub type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// tokio-tungstenite dialer carrying its own TLS configuration.
#[derive(Clone)]
pub struct TungsteniteDialer {
    tls: Arc<ClientConfig>,
}

impl TungsteniteDialer {
    pub fn new(insecure: bool) -> Result<Self> {
        Ok(Self {
            tls: client_config(insecure)?,
        })
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

#[async_trait]
impl WebSocketDialer for TungsteniteDialer {
    type Stream = ClientStream;

    async fn dial(&self, url: &Url) -> Result<DialOutcome<ClientStream>> {
        let connector = Connector::Rustls(self.tls.clone());
        match connect_async_tls_with_config(url.as_str(), None, false, Some(connector)).await {
            Ok((stream, _)) => Ok(DialOutcome::Connected(stream)),
            Err(WsError::Http(response)) if is_followed_redirect(response.status()) => {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok(DialOutcome::Redirect {
                    status: response.status().as_u16(),
                    location,
                })
            }
            Err(WsError::Http(response)) => Err(TunnelError::dial(
                url.as_str(),
                format!("handshake rejected with status {}", response.status()),
            )),
            Err(e) => Err(TunnelError::dial(url.as_str(), e)),
        }
    }
}
