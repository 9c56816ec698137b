mod recording;
mod registry;

pub use recording::{NoopMetrics, RecordingMetrics};
pub use registry::PrometheusMetrics;
