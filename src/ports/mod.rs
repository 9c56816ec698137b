pub mod dialer;
pub mod metrics;
pub mod transport;

pub use dialer::{DialOutcome, WebSocketDialer};
pub use metrics::{ActiveConnection, MetricsPort};
pub use transport::{ByteStream, MessageStream};
