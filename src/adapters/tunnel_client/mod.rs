mod client;
mod dialer;
mod tls;

pub use client::TunnelClient;
pub use dialer::{ClientStream, TungsteniteDialer};
