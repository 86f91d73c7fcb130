//! The MCP client core: the `initialize` handshake and the typed
//! request helper every convenience operation builds on.

use std::sync::{Arc, OnceLock};

use mcpkit_core::{ClientCapabilities, Implementation, InitializeResult, ServerCapabilities};
use mcpkit_endpoint::{EndpointError, Session};
use mcpkit_transport::Transport;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// What `initialize` settled on: the negotiated protocol version, the
/// server's identity and advertised capabilities, and any instructions
/// it chose to surface.
#[derive(Debug, Clone)]
pub struct InitializeOutcome {
    pub protocol_version: String,
    pub server_info: Implementation,
    pub capabilities: ServerCapabilities,
    pub instructions: Option<String>,
}

pub struct Client {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    config: ClientConfig,
    outcome: OnceLock<InitializeOutcome>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Arc<Self> {
        Arc::new(Self {
            session: Session::new(transport.clone()),
            transport,
            config,
            outcome: OnceLock::new(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn is_initialized(&self) -> bool {
        self.outcome.get().is_some()
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.outcome.get().map(|o| &o.server_info)
    }

    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.outcome.get().map(|o| &o.capabilities)
    }

    pub fn instructions(&self) -> Option<&str> {
        self.outcome.get().and_then(|o| o.instructions.as_deref())
    }

    /// Connect the transport, start the background read loop, and run
    /// the `initialize` handshake: request with a timeout, validate the
    /// negotiated version is one this client accepts, then send
    /// `notifications/initialized`.
    pub async fn connect(self: &Arc<Self>) -> ClientResult<&InitializeOutcome> {
        if self.outcome.get().is_some() {
            return Err(ClientError::AlreadyInitialized);
        }

        self.transport.connect().await.map_err(EndpointError::from)?;

        let session = self.session.clone();
        tokio::spawn(async move {
            if let Err(e) = session.run().await {
                tracing::warn!(error = %e, "client session loop ended");
            }
        });

        let params = serde_json::json!({
            "protocolVersion": self.config.protocol_version,
            "capabilities": self.config.capabilities,
            "clientInfo": self.config.client_info,
        });

        let response = tokio::time::timeout(self.config.initialize_timeout, self.session.request("initialize", Some(params), None))
            .await
            .map_err(|_| ClientError::Timeout)??;

        let result: InitializeResult =
            serde_json::from_value(response).map_err(|e| ClientError::Endpoint(EndpointError::Remote(invalid_response(e))))?;

        if !self.config.acceptable_versions.iter().any(|v| v == &result.protocol_version) {
            return Err(ClientError::UnsupportedProtocolVersion(result.protocol_version));
        }

        self.session.mark_initialized();
        self.session.notify("notifications/initialized", None).await?;

        let _ = self.outcome.set(InitializeOutcome {
            protocol_version: result.protocol_version,
            server_info: result.server_info,
            capabilities: result.capabilities,
            instructions: result.instructions,
        });

        Ok(self.outcome.get().expect("outcome was just set"))
    }

    pub(crate) fn require_capability(&self, has: impl Fn(&ServerCapabilities) -> bool, name: &'static str) -> ClientResult<()> {
        let caps = self.server_capabilities().ok_or(ClientError::NotInitialized)?;
        if has(caps) {
            Ok(())
        } else {
            Err(ClientError::CapabilityNotSupported(name))
        }
    }

    pub(crate) async fn typed_request<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> ClientResult<R> {
        if self.outcome.get().is_none() {
            return Err(ClientError::NotInitialized);
        }
        let params = serde_json::to_value(params).map_err(|e| ClientError::Endpoint(EndpointError::Remote(invalid_response(e))))?;
        let value = self.session.request(method, Some(params), None).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Endpoint(EndpointError::Remote(invalid_response(e))))
    }
}

fn invalid_response(e: serde_json::Error) -> mcpkit_core::JsonRpcErrorObject {
    mcpkit_core::JsonRpcErrorObject::new(mcpkit_core::JsonRpcErrorCode::InternalError, e.to_string())
}
