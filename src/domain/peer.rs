use std::net::{IpAddr, SocketAddr};

use tracing::warn;

use super::{PeerIdentity, PeerSource};

impl PeerIdentity {
    pub fn from_socket(addr: SocketAddr) -> Self {
        Self {
            addr,
            source: PeerSource::Socket,
        }
    }

    /// Resolves the logical peer of a request.
    ///
    /// When a trusted header is configured, its value must parse as a bare IP
    /// address; it is then paired with the port of the socket peer. Anything
    /// else falls back to the socket address with a warning.
    pub fn resolve(remote: SocketAddr, header_name: Option<&str>, header_value: Option<&str>) -> Self {
        let Some(name) = header_name else {
            return Self::from_socket(remote);
        };
        let value = header_value.unwrap_or_default();
        match value.parse::<IpAddr>() {
            Ok(ip) => Self {
                addr: SocketAddr::new(ip, remote.port()),
                source: PeerSource::Header,
            },
            Err(_) => {
                warn!("failed to parse data {:?} in real ip header {}", value, name);
                Self::from_socket(remote)
            }
        }
    }
}
