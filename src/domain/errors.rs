use std::io;

use super::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("could not listen on {addr}: {source}")]
    Startup { addr: String, source: io::Error },

    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("could not dial {target}: {reason}")]
    Dial { target: String, reason: String },

    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),

    #[error("redirect from {from} cannot be followed: {reason}")]
    RedirectResolution { from: String, reason: String },

    #[error("too many redirects (limit is {limit})")]
    TooManyRedirects { limit: usize },

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TunnelError {
    pub fn dial(target: impl Into<String>, reason: impl ToString) -> Self {
        TunnelError::Dial {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Metric label when this error aborts a client-side tunnel. The server
    /// labels its backend dial failures itself.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            TunnelError::Upgrade(_) => Some(ErrorCategory::Upgrade),
            TunnelError::Dial { .. }
            | TunnelError::InvalidUrl { .. }
            | TunnelError::RedirectResolution { .. }
            | TunnelError::TooManyRedirects { .. } => Some(ErrorCategory::DialWs),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TunnelError>;
