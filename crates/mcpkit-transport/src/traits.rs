//! The [`Transport`] contract every concrete transport implements:
//! serialize/deliver [`Message`]s in both directions, expose connection
//! state and basic counters, and tear down idempotently.

use async_trait::async_trait;
use mcpkit_core::Message;

use crate::error::TransportResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A duplex conduit for [`Message`]s. Implementations own framing
/// (stdio lines, SSE events, HTTP request/response bodies) but not
/// correlation or dispatch — that's the endpoint engine's job.
///
/// Methods take `&self`, not `&mut self`: implementations hold their I/O
/// halves behind independent interior-mutable locks so a blocked
/// `receive` never starves a concurrent `send` (and vice versa). This
/// lets the endpoint engine share one transport as `Arc<dyn Transport>`
/// between its read loop and every task that wants to write a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> TransportResult<()>;

    /// Idempotent: a second `disconnect` on an already-disconnected
    /// transport is a no-op, not an error.
    async fn disconnect(&self) -> TransportResult<()>;

    async fn send(&self, message: Message) -> TransportResult<()>;

    /// Returns the next inbound message, or `Ok(None)` once the remote
    /// end-of-stream has been observed.
    async fn receive(&self) -> TransportResult<Option<Message>>;

    fn state(&self) -> TransportState;

    fn metrics(&self) -> TransportMetrics;

    /// Opaque session identifier used by multiplexed transports
    /// (Streamable HTTP) to correlate related connections. `None` for
    /// transports with no such concept (stdio).
    fn session_id(&self) -> Option<&str> {
        None
    }

    fn is_connected(&self) -> bool {
        self.state() == TransportState::Connected
    }
}

/// A transport that additionally supports the server initiating
/// requests toward the client (sampling, roots, elicitation). Not every
/// transport mode can do this — Streamable HTTP in stateless mode
/// cannot, since a server-to-client request might need to arrive on a
/// process other than the one that holds the waiting POST.
pub trait BidirectionalTransport: Transport {
    fn supports_server_requests(&self) -> bool;
}
