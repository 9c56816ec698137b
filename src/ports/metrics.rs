use std::sync::Arc;

use crate::domain::{ConnectionKind, Direction, ErrorCategory};

/// Port receiving connection and error events.
///
/// Implementations must never block: they are called from the data path.
pub trait MetricsPort: Send + Sync {
    fn connection_opened(&self, kind: ConnectionKind);

    fn connection_started(&self);

    fn connection_finished(&self);

    fn error(&self, category: ErrorCategory);

    fn bytes_transferred(&self, direction: Direction, bytes: u64);

    /// Text exposition of the current values, if this sink supports it.
    fn render(&self) -> Option<String> {
        None
    }
}

/// Keeps the active connections gauge raised while alive.
pub struct ActiveConnection {
    metrics: Arc<dyn MetricsPort>,
}

impl ActiveConnection {
    pub fn new(metrics: Arc<dyn MetricsPort>) -> Self {
        metrics.connection_started();
        Self { metrics }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.metrics.connection_finished();
    }
}
