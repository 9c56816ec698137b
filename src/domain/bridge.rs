use std::future::pending;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use super::{BridgeSummary, Direction, Termination, TunnelSettings};
use crate::ports::{ByteStream, MessageStream, MetricsPort};

/// Duplex pump between a byte stream and a WebSocket connection.
///
/// Both directions run concurrently until either one ends or the idle timer
/// fires. Whatever stops first, the bridge then closes both endpoints and
/// returns a summary. Transport failures are reported as a [`Termination`],
/// never as an error.
pub struct ConnectionBridge {
    idle_timeout: Duration,
    buffer_size: usize,
    close_grace: Duration,
    metrics: Arc<dyn MetricsPort>,
}

impl ConnectionBridge {
    pub fn from_settings(settings: &TunnelSettings, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            idle_timeout: Duration::ZERO,
            buffer_size: settings.buffer_size.max(1),
            close_grace: settings.close_grace(),
            metrics,
        }
    }

    /// Tears the bridge down after `idle_timeout` without traffic in either
    /// direction. Zero disables the timer.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub async fn run<S, M>(&self, stream: S, messages: M) -> BridgeSummary
    where
        S: ByteStream,
        M: MessageStream,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let (mut sink, mut source) = messages.split();
        let activity = Activity::new();
        let mut sent = 0;
        let mut received = 0;

        let termination = tokio::select! {
            t = self.stream_to_messages(&mut reader, &mut sink, &activity, &mut sent) => t,
            t = self.messages_to_stream(&mut source, &mut writer, &activity, &mut received) => t,
            _ = activity.expired(self.idle_timeout) => Termination::IdleTimeout,
        };
        debug!("bridge stopping: {}", termination);

        // The surviving direction was dropped with the select; close what is left.
        if let Err(e) = timeout(self.close_grace, sink.close()).await.unwrap_or(Ok(())) {
            debug!("websocket close: {}", e);
        }
        if let Err(e) = timeout(self.close_grace, writer.shutdown()).await.unwrap_or(Ok(())) {
            debug!("tcp shutdown: {}", e);
        }

        BridgeSummary {
            sent,
            received,
            termination,
        }
    }

    async fn stream_to_messages<R, K>(&self, reader: &mut R, sink: &mut K, activity: &Activity, sent: &mut u64) -> Termination
    where
        R: AsyncRead + Unpin,
        K: Sink<Message, Error = WsError> + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return Termination::StreamClosed,
                Ok(n) => n,
                Err(e) => return Termination::StreamFailed(e.to_string()),
            };
            activity.touch();
            if let Err(e) = sink.send(Message::Binary(buf[..n].to_vec())).await {
                return Termination::MessageFailed(e.to_string());
            }
            *sent += n as u64;
            self.metrics.bytes_transferred(Direction::StreamToMessage, n as u64);
        }
    }

    async fn messages_to_stream<T, W>(&self, source: &mut T, writer: &mut W, activity: &Activity, received: &mut u64) -> Termination
    where
        T: Stream<Item = Result<Message, WsError>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(next) = source.next().await {
            activity.touch();
            let payload = match next {
                Ok(Message::Binary(data)) => data,
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Close(_)) => return Termination::PeerClosed,
                // Pings are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Termination::MessageFailed(e.to_string()),
            };
            if payload.is_empty() {
                continue;
            }
            if let Err(e) = writer.write_all(&payload).await {
                return Termination::StreamFailed(e.to_string());
            }
            *received += payload.len() as u64;
            self.metrics.bytes_transferred(Direction::MessageToStream, payload.len() as u64);
        }
        Termination::PeerClosed
    }
}

/// Last time either direction moved data, relative to the bridge start.
struct Activity {
    origin: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed, Ordering::Relaxed);
    }

    async fn expired(&self, idle_timeout: Duration) {
        if idle_timeout.is_zero() {
            return pending().await;
        }
        loop {
            let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
            let deadline = self.origin + last + idle_timeout;
            if Instant::now() >= deadline {
                return;
            }
            sleep_until(deadline).await;
        }
    }
}
