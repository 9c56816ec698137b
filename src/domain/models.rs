use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport label for the total connections counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Http,
    Tcp,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Http => "http",
            ConnectionKind::Tcp => "tcp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Upgrade,
    DialTcp,
    DialWs,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Upgrade => "upgrade",
            ErrorCategory::DialTcp => "dial_tcp",
            ErrorCategory::DialWs => "dial_ws",
        }
    }
}

/// Direction of a byte transfer through a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// TCP side to WebSocket side.
    StreamToMessage,
    /// WebSocket side to TCP side.
    MessageToStream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::StreamToMessage => "stream_to_message",
            Direction::MessageToStream => "message_to_stream",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    pub backend: String,
    pub real_ip_header: Option<String>,
}

impl ServerConfig {
    pub fn new(listen: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            backend: backend.into(),
            real_ip_header: None,
        }
    }

    pub fn with_real_ip_header(mut self, header: Option<String>) -> Self {
        self.real_ip_header = header.filter(|h| !h.is_empty());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub listen: String,
    pub target: String,
    pub insecure: bool,
}

impl ClientConfig {
    pub fn new(listen: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            target: target.into(),
            insecure: false,
        }
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// Tunables shared by both roles, loadable from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    pub idle_timeout_secs: u64,
    pub max_redirects: usize,
    pub dial_timeout_secs: u64,
    pub buffer_size: usize,
    pub close_grace_ms: u64,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 10,
            max_redirects: 10,
            dial_timeout_secs: 30,
            buffer_size: 32 * 1024,
            close_grace_ms: 1000,
        }
    }
}

impl TunnelSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Where the logical peer address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSource {
    Socket,
    Header,
}

/// Logical remote address used in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    pub addr: SocketAddr,
    pub source: PeerSource,
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Why a bridge stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The byte stream reached end-of-file.
    StreamClosed,
    StreamFailed(String),
    /// The WebSocket peer sent a close frame or the stream ended.
    PeerClosed,
    MessageFailed(String),
    IdleTimeout,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::StreamClosed => write!(f, "tcp side closed"),
            Termination::StreamFailed(e) => write!(f, "tcp side failed: {}", e),
            Termination::PeerClosed => write!(f, "websocket side closed"),
            Termination::MessageFailed(e) => write!(f, "websocket side failed: {}", e),
            Termination::IdleTimeout => write!(f, "idle timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSummary {
    /// Bytes read from the stream and sent as messages.
    pub sent: u64,
    /// Bytes received as messages and written to the stream.
    pub received: u64,
    pub termination: Termination,
}

impl fmt::Display for BridgeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (sent={} received={})",
            self.termination, self.sent, self.received
        )
    }
}
