//! The [`Transport`] contract and its three concrete implementations:
//! line-delimited stdio, the deprecated legacy-SSE push model, and
//! Streamable HTTP.

pub mod error;
pub mod sse;
pub mod stdio;
pub mod traits;

#[cfg(feature = "legacy-sse")]
pub mod legacy_sse;
#[cfg(feature = "streamable-http")]
pub mod streamable_http;

pub use error::{TransportError, TransportResult};
pub use sse::{MessageFilter, NeverClose, SseEncoder, SseEvent, SseEventBuilder, SseItem, SseParser, SseWriter};
pub use stdio::StdioTransport;
pub use traits::{BidirectionalTransport, Transport, TransportMetrics, TransportState};
