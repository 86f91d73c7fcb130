//! Wires the fixed method-dispatch table from §4.5 onto a [`Session`]:
//! `initialize` negotiates capabilities and version, the primitive
//! methods route through the matching registry (falling through to a
//! user handler on a miss), and registry mutations are forwarded as
//! list-changed notifications.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use futures::future::BoxFuture;
use mcpkit_core::{
    CallToolParams, CallToolResult, ClientCapabilities, GetPromptParams, Implementation, InitializeParams, InitializeResult,
    JsonRpcErrorCode, JsonRpcErrorObject, ListParams, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, ReadResourceParams, ReadResourceResult, SubscribeParams, Tool,
};
use mcpkit_endpoint::{RequestContext as EndpointContext, Session};
use mcpkit_registry::{PromptCollection, ResourceCollection, ToolCollection};
use mcpkit_transport::Transport;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::capabilities;
use crate::config::{negotiate_protocol_version, ServerConfig};
use crate::error::ServerResult;
use crate::handler::{
    CompletionHandlerFn, HandlerContext, PromptError, PromptFallthrough, PromptHandler, ResourceError, ResourceFallthrough,
    ResourceHandler, SubscriptionHandlerFn, ToolError, ToolFallthrough, ToolHandler,
};
use crate::logging::{LevelFilter, LogLevel};

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcErrorObject> {
    serde_json::from_value(params.unwrap_or_else(|| serde_json::json!({})))
        .map_err(|e| JsonRpcErrorObject::new(JsonRpcErrorCode::InvalidParams, e.to_string()))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, JsonRpcErrorObject> {
    serde_json::to_value(value).map_err(|e| JsonRpcErrorObject::new(JsonRpcErrorCode::InternalError, e.to_string()))
}

pub struct McpServer {
    session: Arc<Session>,
    config: ServerConfig,
    tools: ToolCollection,
    tool_handlers: DashMap<String, Arc<dyn ToolHandler>>,
    tool_fallthrough: Mutex<Option<ToolFallthrough>>,
    prompts: PromptCollection,
    prompt_handlers: DashMap<String, Arc<dyn PromptHandler>>,
    prompt_fallthrough: Mutex<Option<PromptFallthrough>>,
    resources: ResourceCollection,
    resource_handlers: DashMap<String, Arc<dyn ResourceHandler>>,
    resource_fallthrough: Mutex<Option<ResourceFallthrough>>,
    completion_handler: Mutex<Option<CompletionHandlerFn>>,
    subscribe_handler: Mutex<Option<SubscriptionHandlerFn>>,
    unsubscribe_handler: Mutex<Option<SubscriptionHandlerFn>>,
    client_capabilities: ArcSwapOption<ClientCapabilities>,
    log_level: LevelFilter,
}

impl McpServer {
    pub fn new(transport: Arc<dyn Transport>, config: ServerConfig) -> Arc<Self> {
        let server = Arc::new(Self {
            session: Session::new(transport),
            config,
            tools: ToolCollection::new(),
            tool_handlers: DashMap::new(),
            tool_fallthrough: Mutex::new(None),
            prompts: PromptCollection::new(),
            prompt_handlers: DashMap::new(),
            prompt_fallthrough: Mutex::new(None),
            resources: ResourceCollection::new(),
            resource_handlers: DashMap::new(),
            resource_fallthrough: Mutex::new(None),
            completion_handler: Mutex::new(None),
            subscribe_handler: Mutex::new(None),
            unsubscribe_handler: Mutex::new(None),
            client_capabilities: ArcSwapOption::from(None),
            log_level: LevelFilter::default(),
        });
        server.wire();
        server
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.client_capabilities.load_full().map(|c| (*c).clone())
    }

    /// Drive the server's message loop until the transport disconnects.
    pub async fn serve(&self) -> mcpkit_endpoint::EndpointResult<()> {
        self.session.run().await
    }

    pub fn register_tool(&self, handler: Arc<dyn ToolHandler>) -> ServerResult<()> {
        let descriptor = handler.definition();
        self.tools.add(descriptor.clone())?;
        self.tool_handlers.insert(descriptor.name, handler);
        Ok(())
    }

    pub fn register_prompt(&self, handler: Arc<dyn PromptHandler>) -> ServerResult<()> {
        let descriptor = handler.definition();
        self.prompts.add(descriptor.clone())?;
        self.prompt_handlers.insert(descriptor.name, handler);
        Ok(())
    }

    pub fn register_resource(&self, handler: Arc<dyn ResourceHandler>) -> ServerResult<()> {
        let descriptor = handler.definition();
        self.resources.add(descriptor.clone())?;
        self.resource_handlers.insert(descriptor.uri_template, handler);
        Ok(())
    }

    pub fn set_tool_fallthrough(&self, handler: ToolFallthrough) {
        *self.tool_fallthrough.lock() = Some(handler);
    }

    pub fn set_prompt_fallthrough(&self, handler: PromptFallthrough) {
        *self.prompt_fallthrough.lock() = Some(handler);
    }

    pub fn set_resource_fallthrough(&self, handler: ResourceFallthrough) {
        *self.resource_fallthrough.lock() = Some(handler);
    }

    pub fn set_completion_handler(&self, handler: CompletionHandlerFn) {
        *self.completion_handler.lock() = Some(handler);
    }

    pub fn set_subscribe_handler(&self, handler: SubscriptionHandlerFn) {
        *self.subscribe_handler.lock() = Some(handler);
    }

    pub fn set_unsubscribe_handler(&self, handler: SubscriptionHandlerFn) {
        *self.unsubscribe_handler.lock() = Some(handler);
    }

    fn wire(self: &Arc<Self>) {
        macro_rules! route {
            ($method:expr, $handler:ident) => {{
                let server = Arc::clone(self);
                self.session.on_request(
                    $method,
                    Arc::new(move |ctx: EndpointContext| {
                        let server = Arc::clone(&server);
                        Box::pin(async move { server.$handler(ctx).await }) as BoxFuture<'static, Result<Value, JsonRpcErrorObject>>
                    }),
                );
            }};
        }

        route!("initialize", handle_initialize);
        route!("ping", handle_ping);
        route!("tools/list", handle_tools_list);
        route!("tools/call", handle_tools_call);
        route!("prompts/list", handle_prompts_list);
        route!("prompts/get", handle_prompts_get);
        route!("resources/list", handle_resources_list);
        route!("resources/templates/list", handle_resources_templates_list);
        route!("resources/read", handle_resources_read);
        route!("resources/subscribe", handle_resources_subscribe);
        route!("resources/unsubscribe", handle_resources_unsubscribe);
        route!("logging/setLevel", handle_logging_set_level);
        route!("completion/complete", handle_completion_complete);

        if !self.config.stateless {
            spawn_list_changed_forwarder(Arc::clone(self), self.tools.subscribe(), "notifications/tools/list_changed");
            spawn_list_changed_forwarder(Arc::clone(self), self.prompts.subscribe(), "notifications/prompts/list_changed");
            spawn_list_changed_forwarder(Arc::clone(self), self.resources.subscribe(), "notifications/resources/list_changed");
        }
    }

    fn handler_context(&self, ctx: &EndpointContext) -> HandlerContext {
        HandlerContext::new(self.session.clone(), ctx.progress.clone(), ctx.cancel.clone())
    }

    async fn handle_initialize(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let params: InitializeParams = parse_params(ctx.params)?;
        let negotiated = negotiate_protocol_version(&params.protocol_version, &self.config.protocol)
            .map_err(|msg| JsonRpcErrorObject::new(JsonRpcErrorCode::InvalidParams, msg))?;
        self.client_capabilities.store(Some(Arc::new(params.capabilities)));

        to_value(InitializeResult {
            protocol_version: negotiated,
            capabilities: capabilities::compute(&self.tools, &self.prompts, &self.resources),
            server_info: Implementation {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
                title: self.config.title.clone(),
            },
            instructions: self.config.instructions.clone(),
        })
    }

    async fn handle_ping(self: Arc<Self>, _ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        Ok(serde_json::json!({}))
    }

    async fn handle_tools_list(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let params: ListParams = parse_params(ctx.params)?;
        let tools: Vec<Tool> = if params.cursor.is_none() {
            self.tools.snapshot().iter().map(|t| (**t).clone()).collect()
        } else {
            Vec::new()
        };
        to_value(ListToolsResult { tools, next_cursor: None })
    }

    async fn handle_tools_call(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let handler_context = self.handler_context(&ctx);
        let params: CallToolParams = parse_params(ctx.params)?;

        if let Some(handler) = self.tool_handlers.get(&params.name).map(|h| h.clone()) {
            let output_schema = handler.definition().output_schema;
            let outcome = handler.call(params.arguments, handler_context).await;
            let result = match outcome {
                Ok(ret) => ret.coerce(output_schema.as_ref()),
                Err(ToolError(message)) => CallToolResult::error(message),
            };
            return to_value(result);
        }

        let fallthrough = self.tool_fallthrough.lock().clone();
        if let Some(fallthrough) = fallthrough {
            let outcome = fallthrough(params.name.clone(), params.arguments, handler_context).await;
            let result = match outcome {
                Ok(ret) => ret.coerce(None),
                Err(ToolError(message)) => CallToolResult::error(message),
            };
            return to_value(result);
        }

        Err(JsonRpcErrorObject::new(
            JsonRpcErrorCode::InvalidParams,
            format!("unknown tool '{}'", params.name),
        ))
    }

    async fn handle_prompts_list(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let params: ListParams = parse_params(ctx.params)?;
        let prompts = if params.cursor.is_none() {
            self.prompts.snapshot().iter().map(|p| (**p).clone()).collect()
        } else {
            Vec::new()
        };
        to_value(ListPromptsResult { prompts, next_cursor: None })
    }

    async fn handle_prompts_get(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let handler_context = self.handler_context(&ctx);
        let params: GetPromptParams = parse_params(ctx.params)?;

        if let Some(handler) = self.prompt_handlers.get(&params.name).map(|h| h.clone()) {
            let description = handler.definition().description;
            let outcome = handler
                .get(params.arguments, handler_context)
                .await
                .map_err(|PromptError(message)| JsonRpcErrorObject::new(JsonRpcErrorCode::InternalError, message))?;
            return to_value(outcome.coerce(description));
        }

        let fallthrough = self.prompt_fallthrough.lock().clone();
        if let Some(fallthrough) = fallthrough {
            let outcome = fallthrough(params.name.clone(), params.arguments, handler_context)
                .await
                .map_err(|PromptError(message)| JsonRpcErrorObject::new(JsonRpcErrorCode::InternalError, message))?;
            return to_value(outcome.coerce(None));
        }

        Err(JsonRpcErrorObject::new(
            JsonRpcErrorCode::InvalidParams,
            format!("unknown prompt '{}'", params.name),
        ))
    }

    async fn handle_resources_list(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let params: ListParams = parse_params(ctx.params)?;
        let resources = if params.cursor.is_none() {
            self.resources.direct_resources().iter().map(|r| (**r).clone()).collect()
        } else {
            Vec::new()
        };
        to_value(ListResourcesResult { resources, next_cursor: None })
    }

    async fn handle_resources_templates_list(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let params: ListParams = parse_params(ctx.params)?;
        let resource_templates = if params.cursor.is_none() {
            self.resources.templates().iter().map(|r| (**r).clone()).collect()
        } else {
            Vec::new()
        };
        to_value(ListResourceTemplatesResult {
            resource_templates,
            next_cursor: None,
        })
    }

    async fn handle_resources_read(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let handler_context = self.handler_context(&ctx);
        let params: ReadResourceParams = parse_params(ctx.params)?;
        let resolved = self.resources.resolve(&params.uri);

        if let Some(resolved) = &resolved {
            if let Some(handler) = self.resource_handlers.get(&resolved.template.uri_template).map(|h| h.clone()) {
                let mime_type = resolved.template.mime_type.clone();
                let outcome = handler
                    .read(&params.uri, resolved.variables.clone(), handler_context)
                    .await
                    .map_err(|ResourceError(message)| JsonRpcErrorObject::new(JsonRpcErrorCode::InternalError, message))?;
                let contents = outcome.coerce(&params.uri, mime_type.as_deref());
                return to_value(ReadResourceResult { contents });
            }
        }

        let fallthrough = self.resource_fallthrough.lock().clone();
        if let Some(fallthrough) = fallthrough {
            let variables = resolved.map(|m| m.variables).unwrap_or_default();
            let outcome = fallthrough(params.uri.clone(), variables, handler_context)
                .await
                .map_err(|ResourceError(message)| JsonRpcErrorObject::new(JsonRpcErrorCode::InternalError, message))?;
            let contents = outcome.coerce(&params.uri, None);
            return to_value(ReadResourceResult { contents });
        }

        Err(JsonRpcErrorObject::new(
            JsonRpcErrorCode::InvalidParams,
            format!("no resource matches '{}'", params.uri),
        ))
    }

    async fn handle_resources_subscribe(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let handler_context = self.handler_context(&ctx);
        let params: SubscribeParams = parse_params(ctx.params)?;
        let handler = self.subscribe_handler.lock().clone();
        if let Some(handler) = handler {
            handler(params.uri, handler_context).await?;
        }
        Ok(serde_json::json!({}))
    }

    async fn handle_resources_unsubscribe(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let handler_context = self.handler_context(&ctx);
        let params: SubscribeParams = parse_params(ctx.params)?;
        let handler = self.unsubscribe_handler.lock().clone();
        if let Some(handler) = handler {
            handler(params.uri, handler_context).await?;
        }
        Ok(serde_json::json!({}))
    }

    async fn handle_logging_set_level(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        #[derive(serde::Deserialize)]
        struct SetLevelParams {
            level: LogLevel,
        }
        let params: SetLevelParams = parse_params(ctx.params)?;
        self.log_level.set(params.level);
        Ok(serde_json::json!({}))
    }

    async fn handle_completion_complete(self: Arc<Self>, ctx: EndpointContext) -> Result<Value, JsonRpcErrorObject> {
        let handler_context = self.handler_context(&ctx);
        let params = ctx.params.unwrap_or_else(|| serde_json::json!({}));
        let handler = self.completion_handler.lock().clone();
        if let Some(handler) = handler {
            return handler(params, handler_context).await;
        }
        Err(JsonRpcErrorObject::new(
            JsonRpcErrorCode::MethodNotFound,
            "no completion handler registered",
        ))
    }
}

fn spawn_list_changed_forwarder(server: Arc<McpServer>, mut changed: broadcast::Receiver<()>, method: &'static str) {
    tokio::spawn(async move {
        while changed.recv().await.is_ok() {
            if let Err(e) = server.session.notify(method, None).await {
                tracing::warn!(error = %e, method, "failed to forward list-changed notification");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_core::{ContentBlock, Role};
    use mcpkit_transport::StdioTransport;
    use serde_json::json;

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolHandler for EchoTool {
        async fn call(&self, arguments: Option<Value>, _ctx: HandlerContext) -> Result<crate::handler::ToolReturn, ToolError> {
            let text = arguments
                .as_ref()
                .and_then(|v| v.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(crate::handler::ToolReturn::Text(text))
        }

        fn definition(&self) -> Tool {
            Tool {
                name: "echo".to_string(),
                title: None,
                description: None,
                input_schema: json!({"type": "object"}),
                output_schema: None,
                annotations: None,
            }
        }
    }

    fn transport_pair() -> (Arc<dyn Transport>, Arc<dyn Transport>) {
        let (client_read, server_write) = tokio::io::duplex(8192);
        let (server_read, client_write) = tokio::io::duplex(8192);
        (
            Arc::new(StdioTransport::new(client_read, client_write)),
            Arc::new(StdioTransport::new(server_read, server_write)),
        )
    }

    #[tokio::test]
    async fn initialize_then_tool_call_round_trips() {
        let (client_transport, server_transport) = transport_pair();
        client_transport.connect().await.unwrap();
        server_transport.connect().await.unwrap();

        let server = McpServer::new(server_transport, ServerConfig::default());
        server.register_tool(Arc::new(EchoTool)).unwrap();

        let client_session = Session::new(client_transport);
        let server_run = server.clone();
        tokio::spawn(async move {
            let _ = server_run.serve().await;
        });

        let init_result = client_session
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": {},
                    "clientInfo": {"name": "test", "version": "0"}
                })),
                None,
            )
            .await
            .unwrap();
        assert_eq!(init_result["protocolVersion"], "2025-03-26");
        client_session.mark_initialized();

        let call_result = client_session
            .request(
                "tools/call",
                Some(json!({"name": "echo", "arguments": {"text": "hi"}})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(call_result["content"][0]["text"], "hi");
        assert_eq!(call_result["isError"], false);
    }

    #[tokio::test]
    async fn unknown_tool_without_fallthrough_is_invalid_params() {
        let (client_transport, server_transport) = transport_pair();
        client_transport.connect().await.unwrap();
        server_transport.connect().await.unwrap();

        let server = McpServer::new(server_transport, ServerConfig::default());
        server.session().mark_initialized();
        let client_session = Session::new(client_transport);
        client_session.mark_initialized();
        let server_run = server.clone();
        tokio::spawn(async move {
            let _ = server_run.serve().await;
        });

        let err = client_session
            .request("tools/call", Some(json!({"name": "missing"})), None)
            .await
            .unwrap_err();
        match err {
            mcpkit_endpoint::EndpointError::Remote(e) => assert_eq!(e.code, JsonRpcErrorCode::InvalidParams.code()),
            other => panic!("expected Remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tools_capability_absent_until_a_tool_is_registered() {
        let (_client_transport, server_transport) = transport_pair();
        server_transport.connect().await.unwrap();
        let server = McpServer::new(server_transport, ServerConfig::default());
        let caps = capabilities::compute(&server.tools, &server.prompts, &server.resources);
        assert!(caps.tools.is_none());
        server
            .register_tool(Arc::new(EchoTool))
            .expect("registering a fresh tool name succeeds");
        let caps = capabilities::compute(&server.tools, &server.prompts, &server.resources);
        assert!(caps.tools.is_some());
    }

    #[test]
    fn prompt_message_role_round_trips_through_json() {
        let message = mcpkit_core::PromptMessage {
            role: Role::User,
            content: ContentBlock::text("hi"),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
    }
}
