pub mod hyper_server;
pub mod metrics;
pub mod tunnel_client;

pub use hyper_server::TunnelServer;
pub use metrics::{NoopMetrics, PrometheusMetrics, RecordingMetrics};
pub use tunnel_client::{TungsteniteDialer, TunnelClient};
