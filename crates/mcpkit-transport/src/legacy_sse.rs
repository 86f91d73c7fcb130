//! The deprecated legacy-SSE transport: one long-lived server-to-client
//! `GET` stream (whose first event announces the URL to POST to) plus
//! one-shot client-to-server POSTs answered with a bare `202 Accepted`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use mcpkit_core::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct LegacySseConfig {
    pub post_path: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Default for LegacySseConfig {
    fn default() -> Self {
        Self {
            post_path: "/messages".to_string(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

pub struct LegacySseServer {
    config: LegacySseConfig,
    inbound: mpsc::Sender<Message>,
    outbound: mpsc::Sender<Message>,
    outbound_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Message>>>,
}

impl LegacySseServer {
    pub fn new(config: LegacySseConfig, inbound: mpsc::Sender<Message>) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::channel(32);
        Arc::new(Self {
            config,
            inbound,
            outbound,
            outbound_rx: tokio::sync::Mutex::new(Some(outbound_rx)),
        })
    }

    pub fn outbound_sender(&self) -> mpsc::Sender<Message> {
        self.outbound.clone()
    }

    pub fn router(self: Arc<Self>, announce_url: String) -> Router {
        Router::new()
            .route("/sse", get(move |state| handle_sse(state, announce_url.clone())))
            .route(&self.config.post_path.clone(), post(handle_post))
            .with_state(self)
    }
}

async fn handle_sse(
    State(server): State<Arc<LegacySseServer>>,
    announce_url: String,
) -> Response {
    let mut guard = server.outbound_rx.lock().await;
    let Some(rx) = guard.take() else {
        return StatusCode::CONFLICT.into_response();
    };
    drop(guard);

    let announce = futures::stream::once(async move {
        Ok::<_, std::convert::Infallible>(Event::default().event("endpoint").data(announce_url))
    });
    let messages = ReceiverStream::new(rx)
        .map(|m| Ok::<_, std::convert::Infallible>(Event::default().event("message").data(
            serde_json::to_string(&m).unwrap_or_default(),
        )));

    Sse::new(announce.chain(messages))
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_post(State(server): State<Arc<LegacySseServer>>, body: Bytes) -> Response {
    let message: Message = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid message").into_response(),
    };
    if server.inbound.send(message).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

/// Client side of the legacy transport: connect the `GET` stream, learn
/// the POST URL from the first `endpoint` event, then post outbound
/// messages there. Reconnects the `GET` stream up to
/// `max_reconnect_attempts` times with `reconnect_delay` between
/// attempts before failing permanently.
pub struct LegacySseClient {
    http: reqwest::Client,
    sse_url: String,
    config: LegacySseConfig,
    post_url: tokio::sync::Mutex<Option<String>>,
    parser: tokio::sync::Mutex<crate::sse::SseParser>,
}

impl LegacySseClient {
    pub fn new(sse_url: impl Into<String>, config: LegacySseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            sse_url: sse_url.into(),
            config,
            post_url: tokio::sync::Mutex::new(None),
            parser: tokio::sync::Mutex::new(crate::sse::SseParser::new()),
        }
    }

    /// Connect to the SSE stream and block until the server's `endpoint`
    /// announcement has been observed, retrying per `max_reconnect_attempts`.
    pub async fn connect(&self) -> crate::error::TransportResult<()> {
        let mut attempts = 0;
        loop {
            match self.try_connect_once().await {
                Ok(()) => return Ok(()),
                Err(e) if attempts < self.config.max_reconnect_attempts => {
                    attempts += 1;
                    tracing::warn!(error = %e, attempt = attempts, "legacy SSE connect failed, retrying");
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_connect_once(&self) -> crate::error::TransportResult<()> {
        let response = self
            .http
            .get(&self.sse_url)
            .send()
            .await
            .map_err(|e| crate::error::TransportError::Codec(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| crate::error::TransportError::Codec(e.to_string()))?;
        let events = self.parser.lock().await.feed(&bytes);
        for event in events {
            if event.event.as_deref() == Some("endpoint") {
                *self.post_url.lock().await = Some(event.data);
                return Ok(());
            }
        }
        Err(crate::error::TransportError::Codec(
            "server never sent an endpoint announcement".to_string(),
        ))
    }

    pub async fn send(&self, message: &Message) -> crate::error::TransportResult<()> {
        let url = self
            .post_url
            .lock()
            .await
            .clone()
            .ok_or(crate::error::TransportError::Disconnected)?;
        let response = self
            .http
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|e| crate::error::TransportError::Codec(e.to_string()))?;
        if response.status() != reqwest::StatusCode::ACCEPTED {
            return Err(crate::error::TransportError::Codec(format!(
                "server rejected message with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_reconnect_bounds() {
        let config = LegacySseConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn post_rejects_malformed_body() {
        let (tx, _rx) = mpsc::channel(1);
        let server = LegacySseServer::new(LegacySseConfig::default(), tx);
        let response = handle_post(State(server), Bytes::from_static(b"not json")).await;
        assert_eq!(response.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn client_send_before_endpoint_announcement_fails() {
        let client = LegacySseClient::new("http://localhost:0/sse", LegacySseConfig::default());
        let result = client
            .send(&mcpkit_core::Notification::new("notifications/initialized", None).into())
            .await;
        assert!(matches!(
            result,
            Err(crate::error::TransportError::Disconnected)
        ));
    }
}
