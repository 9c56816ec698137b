use async_trait::async_trait;
use url::Url;

use crate::domain::Result;

/// Result of a single WebSocket handshake attempt.
#[derive(Debug)]
pub enum DialOutcome<S> {
    Connected(S),
    /// The endpoint answered with a 3xx redirect.
    Redirect { status: u16, location: Option<String> },
}

/// Port for opening outbound WebSocket connections
#[async_trait]
pub trait WebSocketDialer: Send + Sync {
    type Stream: Send;

    /// Performs one handshake against `url` without following redirects.
    async fn dial(&self, url: &Url) -> Result<DialOutcome<Self::Stream>>;
}
