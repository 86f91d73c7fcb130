//! Line-delimited stdio transport: one JSON message per line, `\n`
//! terminated, UTF-8. Blank lines and malformed lines are logged and
//! skipped rather than treated as fatal.
//!
//! State lives behind a plain `Mutex` and I/O behind `tokio::sync::Mutex`
//! so the read/write halves can be driven from independent tasks without
//! holding a lock across an await on unrelated state.

use async_trait::async_trait;
use mcpkit_core::Message;
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_stream::StreamExt;
use futures::SinkExt;

use crate::error::{TransportError, TransportResult};
use crate::traits::{Transport, TransportMetrics, TransportState};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct StdioTransport {
    reader: AsyncMutex<FramedRead<BoxedReader, LinesCodec>>,
    writer: AsyncMutex<FramedWrite<BoxedWriter, LinesCodec>>,
    state: SyncMutex<TransportState>,
    metrics: SyncMutex<TransportMetrics>,
}

impl StdioTransport {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            reader: AsyncMutex::new(FramedRead::new(Box::new(reader), LinesCodec::new())),
            writer: AsyncMutex::new(FramedWrite::new(Box::new(writer), LinesCodec::new())),
            state: SyncMutex::new(TransportState::Disconnected),
            metrics: SyncMutex::new(TransportMetrics::default()),
        }
    }

    /// Wire up against the process's own stdin/stdout — the common case
    /// for an MCP server launched as a child process.
    pub fn from_process_stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> TransportResult<()> {
        *self.state.lock() = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        let mut state = self.state.lock();
        if *state == TransportState::Disconnected {
            return Ok(());
        }
        *state = TransportState::Disconnected;
        Ok(())
    }

    async fn send(&self, message: Message) -> TransportResult<()> {
        if self.state() != TransportState::Connected {
            return Err(TransportError::Disconnected);
        }
        let line = serde_json::to_string(&message)?;
        let bytes = line.len() as u64;
        let mut writer = self.writer.lock().await;
        writer
            .send(line)
            .await
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        let mut metrics = self.metrics.lock();
        metrics.messages_sent += 1;
        metrics.bytes_sent += bytes;
        Ok(())
    }

    async fn receive(&self) -> TransportResult<Option<Message>> {
        loop {
            if self.state() != TransportState::Connected {
                return Err(TransportError::Disconnected);
            }
            let mut reader = self.reader.lock().await;
            let Some(next) = reader.next().await else {
                drop(reader);
                *self.state.lock() = TransportState::Disconnected;
                return Ok(None);
            };
            let line = match next {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "stdio line decode failed, skipping");
                    continue;
                }
            };
            drop(reader);

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Message>(&line) {
                Ok(message) => {
                    let mut metrics = self.metrics.lock();
                    metrics.messages_received += 1;
                    metrics.bytes_received += line.len() as u64;
                    return Ok(Some(message));
                }
                Err(e) => {
                    tracing::warn!(error = %e, line = %line, "malformed stdio message, skipping");
                    continue;
                }
            }
        }
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }

    fn metrics(&self) -> TransportMetrics {
        *self.metrics.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_core::{Notification, Request};
    use tokio::io::duplex;

    fn make_pair() -> (StdioTransport, StdioTransport) {
        let (client_read, server_write) = duplex(4096);
        let (server_read, client_write) = duplex(4096);
        let client = StdioTransport::new(client_read, client_write);
        let server = StdioTransport::new(server_read, server_write);
        (client, server)
    }

    #[tokio::test]
    async fn round_trips_a_request() {
        let (client, server) = make_pair();
        client.connect().await.unwrap();
        server.connect().await.unwrap();

        client
            .send(Request::new(1, "ping", None).into())
            .await
            .unwrap();

        let received = server.receive().await.unwrap().unwrap();
        assert_eq!(received.method(), Some("ping"));
    }

    #[tokio::test]
    async fn skips_blank_lines() {
        let (client_read, mut server_write) = duplex(4096);
        let (_server_read, client_write) = duplex(4096);
        let client = StdioTransport::new(client_read, client_write);
        client.connect().await.unwrap();

        use tokio::io::AsyncWriteExt;
        server_write.write_all(b"\n").await.unwrap();
        server_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n")
            .await
            .unwrap();

        let received = client.receive().await.unwrap().unwrap();
        assert_eq!(received.method(), Some("notifications/initialized"));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (client, _server) = make_pair();
        client.connect().await.unwrap();
        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
        assert_eq!(client.state(), TransportState::Disconnected);
    }

    #[test]
    fn notification_helper_builds_expected_message() {
        let n = Notification::new("notifications/progress", None);
        assert_eq!(n.method, "notifications/progress");
    }
}
