use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::domain::{ConnectionKind, Direction, ErrorCategory};
use crate::ports::MetricsPort;

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsPort for NoopMetrics {
    fn connection_opened(&self, _: ConnectionKind) {}

    fn connection_started(&self) {}

    fn connection_finished(&self) {}

    fn error(&self, _: ErrorCategory) {}

    fn bytes_transferred(&self, _: Direction, _: u64) {}
}

/// In-memory sink, mostly useful to assert on events in tests.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    opened: Mutex<HashMap<ConnectionKind, u64>>,
    active: AtomicI64,
    errors: Mutex<HashMap<ErrorCategory, u64>>,
    bytes: Mutex<HashMap<Direction, u64>>,
}

impl RecordingMetrics {
    pub fn opened(&self, kind: ConnectionKind) -> u64 {
        read(&self.opened, &kind)
    }

    pub fn active(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn errors(&self, category: ErrorCategory) -> u64 {
        read(&self.errors, &category)
    }

    pub fn bytes(&self, direction: Direction) -> u64 {
        read(&self.bytes, &direction)
    }
}

fn read<K: Eq + std::hash::Hash>(map: &Mutex<HashMap<K, u64>>, key: &K) -> u64 {
    map.lock().map(|m| m.get(key).copied().unwrap_or(0)).unwrap_or(0)
}

fn add<K: Eq + std::hash::Hash>(map: &Mutex<HashMap<K, u64>>, key: K, n: u64) {
    if let Ok(mut m) = map.lock() {
        *m.entry(key).or_insert(0) += n;
    }
}

impl MetricsPort for RecordingMetrics {
    fn connection_opened(&self, kind: ConnectionKind) {
        add(&self.opened, kind, 1);
    }

    fn connection_started(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn connection_finished(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn error(&self, category: ErrorCategory) {
        add(&self.errors, category, 1);
    }

    fn bytes_transferred(&self, direction: Direction, bytes: u64) {
        add(&self.bytes, direction, bytes);
    }
}
