//! The per-connection message loop: dispatch inbound requests and
//! notifications, correlate outbound requests with their responses, and
//! propagate cancellation in both directions.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use mcpkit_core::{
    JsonRpcErrorCode, JsonRpcErrorObject, Message, Notification, ProgressToken, Request,
    RequestId, Response,
};
use mcpkit_transport::Transport;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::cancel::CancelToken;
use crate::error::{EndpointError, EndpointResult};

pub type RequestHandler =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<Value, JsonRpcErrorObject>> + Send + Sync>;
pub type NotificationHandler = Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

/// What a registered request handler receives: the call's parameters, a
/// progress sink bound to the caller's `progressToken` (a no-op if none
/// was supplied), and a token that fires if the caller cancels.
pub struct RequestContext {
    pub params: Option<Value>,
    pub progress: ProgressReporter,
    pub cancel: CancelToken,
}

#[derive(Clone)]
pub struct ProgressReporter {
    token: Option<ProgressToken>,
    transport: Arc<dyn Transport>,
}

impl ProgressReporter {
    fn new(token: Option<ProgressToken>, transport: Arc<dyn Transport>) -> Self {
        Self { token, transport }
    }

    /// No-op if the originating request carried no `progressToken`.
    pub async fn report(&self, progress: Value) {
        let Some(token) = &self.token else { return };
        let payload = serde_json::json!({
            "progressToken": token,
            "progress": progress,
        });
        let _ = self
            .transport
            .send(Notification::new("notifications/progress", Some(payload)).into())
            .await;
    }
}

/// One logical connection's request correlation table, handler tables,
/// and message loop.
pub struct Session {
    transport: Arc<dyn Transport>,
    pending: DashMap<RequestId, oneshot::Sender<Result<Value, JsonRpcErrorObject>>>,
    next_id: AtomicI64,
    request_handlers: DashMap<String, RequestHandler>,
    notification_handlers: DashMap<String, Vec<NotificationHandler>>,
    inbound_cancel: DashMap<RequestId, CancelToken>,
    initialized: AtomicBool,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            pending: DashMap::new(),
            next_id: AtomicI64::new(1),
            request_handlers: DashMap::new(),
            notification_handlers: DashMap::new(),
            inbound_cancel: DashMap::new(),
            initialized: AtomicBool::new(false),
        })
    }

    pub fn on_request(&self, method: impl Into<String>, handler: RequestHandler) {
        self.request_handlers.insert(method.into(), handler);
    }

    pub fn on_notification(&self, method: impl Into<String>, handler: NotificationHandler) {
        self.notification_handlers
            .entry(method.into())
            .or_default()
            .push(handler);
    }

    /// Mark the session already initialized without going through
    /// `initialize` dispatch — used by the client side, which sends
    /// `initialize` as an outbound request rather than receiving one.
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    /// Drive the message loop until the transport reaches end-of-stream
    /// or a fatal transport error occurs. Every inbound Request or
    /// Notification is dispatched onto its own task so a slow handler
    /// never blocks reading the next message.
    pub async fn run(self: &Arc<Self>) -> EndpointResult<()> {
        loop {
            match self.transport.receive().await {
                Ok(Some(message)) => self.dispatch(message),
                Ok(None) => {
                    self.teardown().await;
                    return Ok(());
                }
                Err(e) => {
                    self.teardown().await;
                    return Err(e.into());
                }
            }
        }
    }

    fn dispatch(self: &Arc<Self>, message: Message) {
        match message {
            Message::Response(response) => self.complete_outbound(response),
            Message::Request(request) => {
                let session = self.clone();
                tokio::spawn(async move { session.handle_request(request).await });
            }
            Message::Notification(notification) if notification.method == "notifications/cancelled" => {
                self.handle_cancel_notification(notification);
            }
            Message::Notification(notification) => {
                let session = self.clone();
                tokio::spawn(async move { session.fan_out_notification(notification).await });
            }
        }
    }

    fn complete_outbound(&self, response: Response) {
        let id = response.id.clone();
        let Some((_, sender)) = self.pending.remove(&id) else {
            tracing::warn!(%id, "response for unknown or already-completed request id, dropping");
            return;
        };
        let _ = sender.send(response.into_result());
    }

    fn handle_cancel_notification(&self, notification: Notification) {
        let Some(params) = notification.params else {
            return;
        };
        let Some(id_value) = params.get("requestId") else {
            return;
        };
        let Ok(id) = serde_json::from_value::<RequestId>(id_value.clone()) else {
            return;
        };
        if let Some(token) = self.inbound_cancel.get(&id) {
            token.cancel();
        }
    }

    async fn handle_request(self: Arc<Self>, request: Request) {
        if request.method == "initialize" {
            if self.initialized.swap(true, Ordering::SeqCst) {
                self.send_response(Response::error(
                    request.id,
                    JsonRpcErrorObject::new(JsonRpcErrorCode::InvalidRequest, "initialize already completed"),
                ))
                .await;
                return;
            }
        } else if !self.initialized.load(Ordering::SeqCst) {
            self.send_response(Response::error(
                request.id,
                JsonRpcErrorObject::new(
                    JsonRpcErrorCode::InvalidRequest,
                    "initialize must complete before other requests are honored",
                ),
            ))
            .await;
            return;
        }

        let Some(handler) = self.request_handlers.get(&request.method).map(|h| h.clone()) else {
            self.send_response(Response::error(
                request.id,
                JsonRpcErrorObject::new(JsonRpcErrorCode::MethodNotFound, "method not found"),
            ))
            .await;
            return;
        };

        let cancel = CancelToken::new();
        self.inbound_cancel.insert(request.id.clone(), cancel.clone());
        let progress = ProgressReporter::new(request.progress_token().cloned(), self.transport.clone());
        let context = RequestContext {
            params: request.params,
            progress,
            cancel,
        };

        let result = handler(context).await;
        self.inbound_cancel.remove(&request.id);

        let response = match result {
            Ok(value) => Response::success(request.id, value),
            Err(error) => Response::error(request.id, error),
        };
        self.send_response(response).await;
    }

    async fn fan_out_notification(&self, notification: Notification) {
        let Some(handlers) = self.notification_handlers.get(&notification.method) else {
            return;
        };
        let handlers: Vec<_> = handlers.clone();
        join_all(handlers.into_iter().map(|handler| handler(notification.params.clone()))).await;
    }

    async fn send_response(&self, response: Response) {
        if let Err(e) = self.transport.send(response.into()).await {
            tracing::warn!(error = %e, "failed to send response");
        }
    }

    /// Issue an outbound request and await its correlated response.
    /// Passing a `cancel` token lets the caller abandon the wait: the
    /// local waiter is faulted with [`EndpointError::Cancelled`] and a
    /// best-effort `notifications/cancelled` is sent to the peer.
    pub async fn request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        cancel: Option<CancelToken>,
    ) -> EndpointResult<Value> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let request = Request::new(id.clone(), method, params);
        if let Err(e) = self.transport.send(request.into()).await {
            self.pending.remove(&id);
            return Err(e.into());
        }

        let outcome = match cancel {
            Some(cancel) => {
                tokio::select! {
                    result = rx => result,
                    _ = cancel.cancelled() => {
                        self.pending.remove(&id);
                        let _ = self.transport.send(
                            Notification::new(
                                "notifications/cancelled",
                                Some(serde_json::json!({"requestId": id})),
                            )
                            .into(),
                        ).await;
                        return Err(EndpointError::Cancelled);
                    }
                }
            }
            None => rx.await,
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(EndpointError::Remote(error)),
            Err(_) => Err(EndpointError::Disconnected),
        }
    }

    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> EndpointResult<()> {
        self.transport
            .send(Notification::new(method, params).into())
            .await
            .map_err(EndpointError::from)
    }

    /// Idempotent teardown: fault every outstanding outbound waiter with
    /// [`EndpointError::Disconnected`] and disconnect the transport.
    pub async fn dispose(&self) {
        self.teardown().await;
    }

    async fn teardown(&self) {
        self.pending.clear();
        let _ = self.transport.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_transport::StdioTransport;
    use tokio::io::duplex;

    fn session_pair() -> (Arc<Session>, Arc<Session>) {
        let (client_read, server_write) = duplex(8192);
        let (server_read, client_write) = duplex(8192);
        let client_transport: Arc<dyn Transport> = Arc::new(StdioTransport::new(client_read, client_write));
        let server_transport: Arc<dyn Transport> = Arc::new(StdioTransport::new(server_read, server_write));
        (Session::new(client_transport), Session::new(server_transport))
    }

    #[tokio::test]
    async fn ping_round_trips_through_session() {
        let (client, server) = session_pair();
        client.transport.connect().await.unwrap();
        server.transport.connect().await.unwrap();
        client.mark_initialized();
        server.mark_initialized();

        server.on_request(
            "ping",
            Arc::new(|_ctx: RequestContext| Box::pin(async { Ok(serde_json::json!({})) })),
        );

        let server_run = server.clone();
        tokio::spawn(async move {
            let _ = server_run.run().await;
        });

        let result = client.request("ping", None, None).await.unwrap();
        assert_eq!(result, serde_json::json!({}));
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let (client, server) = session_pair();
        client.transport.connect().await.unwrap();
        server.transport.connect().await.unwrap();
        client.mark_initialized();
        server.mark_initialized();

        let server_run = server.clone();
        tokio::spawn(async move {
            let _ = server_run.run().await;
        });

        let err = client.request("no/such/method", None, None).await.unwrap_err();
        match err {
            EndpointError::Remote(e) => assert_eq!(e.code, JsonRpcErrorCode::MethodNotFound.code()),
            other => panic!("expected Remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_before_initialize_are_rejected() {
        let (client, server) = session_pair();
        client.transport.connect().await.unwrap();
        server.transport.connect().await.unwrap();
        client.mark_initialized();
        // server is deliberately NOT marked initialized

        server.on_request(
            "tools/list",
            Arc::new(|_ctx: RequestContext| Box::pin(async { Ok(serde_json::json!({"tools": []})) })),
        );

        let server_run = server.clone();
        tokio::spawn(async move {
            let _ = server_run.run().await;
        });

        let err = client.request("tools/list", None, None).await.unwrap_err();
        match err {
            EndpointError::Remote(e) => assert_eq!(e.code, JsonRpcErrorCode::InvalidRequest.code()),
            other => panic!("expected Remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_initialize_is_rejected() {
        let (client, server) = session_pair();
        client.transport.connect().await.unwrap();
        server.transport.connect().await.unwrap();
        client.mark_initialized();

        server.on_request(
            "initialize",
            Arc::new(|_ctx: RequestContext| Box::pin(async { Ok(serde_json::json!({"ok": true})) })),
        );

        let server_run = server.clone();
        tokio::spawn(async move {
            let _ = server_run.run().await;
        });

        let first = client.request("initialize", None, None).await.unwrap();
        assert_eq!(first, serde_json::json!({"ok": true}));

        let second = client.request("initialize", None, None).await.unwrap_err();
        match second {
            EndpointError::Remote(e) => assert_eq!(e.code, JsonRpcErrorCode::InvalidRequest.code()),
            other => panic!("expected Remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn notification_fans_out_to_all_handlers() {
        let (client, server) = session_pair();
        client.transport.connect().await.unwrap();
        server.transport.connect().await.unwrap();

        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = counter.clone();
            server.on_notification(
                "notifications/initialized",
                Arc::new(move |_params| {
                    let counter = counter.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                }),
            );
        }

        let server_run = server.clone();
        let handle = tokio::spawn(async move {
            let _ = server_run.run().await;
        });

        client.notify("notifications/initialized", None).await.unwrap();
        // give the fire-and-forget dispatch a chance to land
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.dispose().await;
        let _ = handle.await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let (client, _server) = session_pair();
        client.transport.connect().await.unwrap();
        client.dispose().await;
        client.dispose().await;
    }
}
