//! Server-Sent Events encode/parse plus the ordered writer queue shared
//! by the legacy-SSE and Streamable-HTTP transports.
//!
//! [`SseEncoder`]/[`SseParser`] work over raw wire events (`id`/`event`/
//! `data`/`retry`); [`SseItem`] and [`SseWriter`] sit one layer up and
//! speak in terms of [`Message`] plus the one non-Message item a stream
//! can carry (the legacy transport's initial `endpoint` announcement).

use std::time::{SystemTime, UNIX_EPOCH};

use mcpkit_core::Message;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};

/// One parsed SSE wire event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
    pub retry: Option<u64>,
}

pub struct SseEventBuilder {
    event: SseEvent,
    has_data: bool,
}

impl SseEventBuilder {
    pub fn new() -> Self {
        Self {
            event: SseEvent::default(),
            has_data: false,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.event.id = Some(id.into());
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event.event = Some(event.into());
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.event.data = data.into();
        self.has_data = true;
        self
    }

    pub fn retry(mut self, retry: u64) -> Self {
        self.event.retry = Some(retry);
        self
    }

    pub fn try_build(self) -> Option<SseEvent> {
        self.has_data.then_some(self.event)
    }

    /// # Panics
    /// Panics if `.data(..)` was never called — mirrors the contract a
    /// caller that knows it always sets data accepts for brevity.
    pub fn build(self) -> SseEvent {
        self.try_build().expect("SseEventBuilder used without .data(...)")
    }
}

impl Default for SseEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SseEncoder;

impl SseEncoder {
    pub fn encode(event: &SseEvent) -> String {
        let mut out = String::new();
        if let Some(id) = &event.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        if let Some(kind) = &event.event {
            out.push_str("event: ");
            out.push_str(kind);
            out.push('\n');
        }
        if let Some(retry) = event.retry {
            out.push_str("retry: ");
            out.push_str(&retry.to_string());
            out.push('\n');
        }
        for line in event.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    pub fn encode_string(data: impl Into<String>) -> String {
        Self::encode(&SseEventBuilder::new().data(data).build())
    }

    pub fn encode_comment(comment: &str) -> String {
        format!(":{comment}\n\n")
    }

    pub fn encode_keepalive() -> &'static [u8] {
        b":\n\n"
    }
}

/// Deterministic-enough event id derived from a monotonically increasing
/// sequence number and wall-clock nanoseconds, not from randomness, so
/// `Last-Event-ID` reconnection logic has something to compare.
pub fn generate_event_id(sequence: u64) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{sequence}-{nanos}")
}

/// Stateful incremental SSE parser: feed it arbitrary byte chunks (as
/// they arrive off a socket) and it emits complete events as soon as
/// their trailing blank line arrives.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    current_id: Option<String>,
    current_event: Option<String>,
    current_data: Vec<String>,
    current_retry: Option<u64>,
    last_event_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(data));
        let mut emitted = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.emit_event() {
                    emitted.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue; // comment/keepalive
            }

            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };

            match field {
                "id" => self.current_id = Some(value.to_string()),
                "event" => self.current_event = Some(value.to_string()),
                "data" => self.current_data.push(value.to_string()),
                "retry" => self.current_retry = value.parse().ok(),
                _ => {}
            }
        }

        emitted
    }

    fn emit_event(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() && self.current_event.is_none() && self.current_id.is_none()
        {
            self.reset();
            return None;
        }
        let event = SseEvent {
            id: self.current_id.clone(),
            event: self.current_event.clone(),
            data: self.current_data.join("\n"),
            retry: self.current_retry,
        };
        if event.id.is_some() {
            self.last_event_id = event.id.clone();
        }
        self.reset();
        Some(event)
    }

    fn reset(&mut self) {
        self.current_id = None;
        self.current_event = None;
        self.current_data.clear();
        self.current_retry = None;
    }
}

/// An item written to an SSE response body: either the legacy
/// transport's one-time endpoint announcement or a protocol [`Message`].
#[derive(Debug, Clone)]
pub enum SseItem {
    Endpoint(String),
    Message(Message),
}

impl SseItem {
    fn into_event(self, sequence: u64) -> TransportResult<SseEvent> {
        let event = match self {
            SseItem::Endpoint(url) => SseEventBuilder::new()
                .event("endpoint")
                .data(url)
                .id(generate_event_id(sequence))
                .build(),
            SseItem::Message(message) => SseEventBuilder::new()
                .event("message")
                .data(serde_json::to_string(&message)?)
                .id(generate_event_id(sequence))
                .build(),
        };
        Ok(event)
    }
}

/// A stream-scoped predicate letting the Streamable HTTP transport close
/// an SSE body once every request id it is responsible for has a
/// response.
pub trait MessageFilter: Send {
    /// Called after an item is written; return `true` to close the
    /// stream now.
    fn should_close(&mut self, item: &SseItem) -> bool;
}

/// No-op filter: never closes early (used by the legacy transport's
/// long-lived push channel).
pub struct NeverClose;
impl MessageFilter for NeverClose {
    fn should_close(&mut self, _item: &SseItem) -> bool {
        false
    }
}

/// Single-reader, multi-writer bounded queue of [`SseItem`]s. Senders are
/// cheap to clone (handlers each get one); the writer side drains in
/// order and formats onto any `AsyncWrite`.
pub struct SseWriter {
    sender: mpsc::Sender<SseItem>,
    receiver: mpsc::Receiver<SseItem>,
}

impl SseWriter {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self { sender, receiver }
    }

    pub fn sender(&self) -> mpsc::Sender<SseItem> {
        self.sender.clone()
    }

    /// Drain the queue, writing each item as an SSE event until the
    /// queue closes (all senders dropped) or `filter` signals the stream
    /// should end.
    pub async fn write_all<W: AsyncWrite + Unpin>(
        mut self,
        mut sink: W,
        mut filter: impl MessageFilter,
    ) -> TransportResult<()> {
        let mut sequence: u64 = 0;
        while let Some(item) = self.receiver.recv().await {
            let should_close = filter.should_close(&item);
            let event = item.into_event(sequence)?;
            sequence += 1;
            let encoded = SseEncoder::encode(&event);
            sink.write_all(encoded.as_bytes())
                .await
                .map_err(TransportError::Io)?;
            sink.flush().await.map_err(TransportError::Io)?;
            if should_close {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_core::Request;

    #[test]
    fn encodes_multiline_data_as_repeated_data_fields() {
        let event = SseEventBuilder::new().data("a\nb").build();
        let encoded = SseEncoder::encode(&event);
        assert_eq!(encoded, "data: a\ndata: b\n\n");
    }

    #[test]
    fn keepalive_is_a_bare_comment() {
        assert_eq!(SseEncoder::encode_keepalive(), b":\n\n");
    }

    #[test]
    fn builder_without_data_has_no_build() {
        let builder = SseEventBuilder::new().event("ping");
        assert!(builder.try_build().is_none());
    }

    #[test]
    fn parser_round_trips_an_encoded_event() {
        let original = SseEventBuilder::new()
            .id("1")
            .event("message")
            .data("hello")
            .build();
        let encoded = SseEncoder::encode(&original);

        let mut parser = SseParser::new();
        let events = parser.feed(encoded.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], original);
        assert_eq!(parser.last_event_id(), Some("1"));
    }

    #[test]
    fn parser_handles_chunked_feed() {
        let encoded = SseEncoder::encode(&SseEventBuilder::new().data("chunked").build());
        let mid = encoded.len() / 2;
        let mut parser = SseParser::new();
        assert!(parser.feed(encoded[..mid].as_bytes()).is_empty());
        let events = parser.feed(encoded[mid..].as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "chunked");
    }

    #[test]
    fn parser_skips_comment_lines() {
        let mut parser = SseParser::new();
        assert!(parser.feed(SseEncoder::encode_keepalive()).is_empty());
    }

    #[tokio::test]
    async fn writer_emits_items_in_order_and_closes_on_filter() {
        let writer = SseWriter::new(8);
        let sender = writer.sender();
        sender
            .send(SseItem::Message(Request::new(1, "ping", None).into()))
            .await
            .unwrap();
        sender
            .send(SseItem::Message(Request::new(2, "ping", None).into()))
            .await
            .unwrap();
        drop(sender);

        struct CloseAfterTwo(u32);
        impl MessageFilter for CloseAfterTwo {
            fn should_close(&mut self, _item: &SseItem) -> bool {
                self.0 += 1;
                self.0 >= 2
            }
        }

        let mut out = Vec::new();
        writer.write_all(&mut out, CloseAfterTwo(0)).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("event: message").count(), 2);
    }
}
