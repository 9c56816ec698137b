use hyper::header::{
    HeaderMap, HeaderValue, CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE,
};
use hyper::{Method, Response, StatusCode};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use crate::domain::{Result, TunnelError};

/// Validates a WebSocket opening handshake and returns the
/// `Sec-WebSocket-Accept` value for it. The origin is not checked.
pub(crate) fn accept_key(method: &Method, headers: &HeaderMap) -> Result<String> {
    if *method != Method::GET {
        return Err(TunnelError::Upgrade(format!("request method {} is not GET", method)));
    }
    if !has_token(headers, CONNECTION, "upgrade") {
        return Err(TunnelError::Upgrade("'upgrade' token not found in 'Connection' header".into()));
    }
    if !has_token(headers, UPGRADE, "websocket") {
        return Err(TunnelError::Upgrade("'websocket' token not found in 'Upgrade' header".into()));
    }
    if !has_token(headers, SEC_WEBSOCKET_VERSION, "13") {
        return Err(TunnelError::Upgrade("unsupported websocket version".into()));
    }
    match headers.get(SEC_WEBSOCKET_KEY) {
        Some(key) if !key.is_empty() => Ok(derive_accept_key(key.as_bytes())),
        _ => Err(TunnelError::Upgrade("'Sec-WebSocket-Key' header is missing".into())),
    }
}

pub(crate) fn switching_protocols<B>(accept_key: &str, body: B) -> Result<Response<B>> {
    let accept = HeaderValue::from_str(accept_key).map_err(|e| TunnelError::Upgrade(e.to_string()))?;
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(SEC_WEBSOCKET_ACCEPT, accept);
    Ok(response)
}

fn has_token(headers: &HeaderMap, name: hyper::header::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}
