use tokio::time::timeout;
use tracing::info;

use super::address::to_websocket_url;
use super::{Result, TunnelError, TunnelSettings};
use crate::ports::{DialOutcome, WebSocketDialer};

/// Dials `target`, following HTTP redirects until a handshake succeeds.
///
/// Each hop goes through [`to_websocket_url`] first, so a redirect to an
/// `https://` location is dialed as `wss://`. Relative locations are resolved
/// against the URL that produced them.
pub async fn dial_following_redirects<D>(dialer: &D, target: &str, settings: &TunnelSettings) -> Result<D::Stream>
where
    D: WebSocketDialer + ?Sized,
{
    let mut current = target.to_string();
    let mut redirects = 0;
    loop {
        let url = to_websocket_url(&current)?;
        info!("Connecting to {}", url);

        let outcome = timeout(settings.dial_timeout(), dialer.dial(&url))
            .await
            .map_err(|_| TunnelError::dial(url.as_str(), "handshake timed out"))??;

        match outcome {
            DialOutcome::Connected(stream) => return Ok(stream),
            DialOutcome::Redirect { status, location } => {
                if redirects >= settings.max_redirects {
                    return Err(TunnelError::TooManyRedirects {
                        limit: settings.max_redirects,
                    });
                }
                redirects += 1;

                let location = location.ok_or_else(|| TunnelError::RedirectResolution {
                    from: url.to_string(),
                    reason: format!("{} response without Location header", status),
                })?;
                let next = url.join(&location).map_err(|e| TunnelError::RedirectResolution {
                    from: url.to_string(),
                    reason: format!("invalid Location {:?}: {}", location, e),
                })?;
                info!("Redirect to {}", next);
                current = next.to_string();
            }
        }
    }
}
