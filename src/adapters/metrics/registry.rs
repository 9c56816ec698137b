use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::domain::{ConnectionKind, Direction, ErrorCategory, Result};
use crate::ports::MetricsPort;

const SUBSYSTEM: &str = "http_to_tcp";

/// Prometheus-backed sink. Owns its registry instead of using the global one.
pub struct PrometheusMetrics {
    registry: Registry,
    connections: IntCounterVec,
    active_connections: IntGauge,
    errors: IntCounterVec,
    transferred_bytes: IntCounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let connections = IntCounterVec::new(
            Opts::new("connections", "The total number of connections open").subsystem(SUBSYSTEM),
            &["type"],
        )?;
        let active_connections = IntGauge::with_opts(
            Opts::new("active_connections", "The total number of active connections").subsystem(SUBSYSTEM),
        )?;
        let errors = IntCounterVec::new(
            Opts::new("error", "The total number of errors").subsystem(SUBSYSTEM),
            &["type"],
        )?;
        let transferred_bytes = IntCounterVec::new(
            Opts::new("transferred_bytes", "Bytes relayed through tunnels").subsystem(SUBSYSTEM),
            &["direction"],
        )?;

        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(transferred_bytes.clone()))?;

        Ok(Self {
            registry,
            connections,
            active_connections,
            errors,
            transferred_bytes,
        })
    }
}

impl MetricsPort for PrometheusMetrics {
    fn connection_opened(&self, kind: ConnectionKind) {
        self.connections.with_label_values(&[kind.as_str()]).inc();
    }

    fn connection_started(&self) {
        self.active_connections.inc();
    }

    fn connection_finished(&self) {
        self.active_connections.dec();
    }

    fn error(&self, category: ErrorCategory) {
        self.errors.with_label_values(&[category.as_str()]).inc();
    }

    fn bytes_transferred(&self, direction: Direction, bytes: u64) {
        self.transferred_bytes
            .with_label_values(&[direction.as_str()])
            .inc_by(bytes);
    }

    fn render(&self) -> Option<String> {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            warn!("failed to encode metrics: {}", e);
            return None;
        }
        String::from_utf8(buffer).ok()
    }
}
