use url::Url;

use super::{Result, TunnelError};

/// Rewrites an `http`/`https` URL to its `ws`/`wss` counterpart. Other schemes
/// are returned as parsed.
pub fn to_websocket_url(input: &str) -> Result<Url> {
    let parsed = parse(input)?;
    let scheme = match parsed.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Ok(parsed),
    };
    let rest = &parsed.as_str()[parsed.scheme().len()..];
    parse(&format!("{scheme}{rest}"))
}

fn parse(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|source| TunnelError::InvalidUrl {
        url: input.to_string(),
        source,
    })
}
