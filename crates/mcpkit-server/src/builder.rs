//! Fluent construction of an [`McpServer`]: configuration, then handler
//! registration, then a transport to bind it to.

use std::sync::Arc;

use mcpkit_transport::Transport;

use crate::config::{ProtocolVersionConfig, ServerConfig};
use crate::error::ServerResult;
use crate::handler::{
    CompletionHandlerFn, PromptFallthrough, PromptHandler, ResourceFallthrough, ResourceHandler, SubscriptionHandlerFn,
    ToolFallthrough, ToolHandler,
};
use crate::server::McpServer;

pub struct ServerBuilder {
    config: ServerConfig,
    tools: Vec<Arc<dyn ToolHandler>>,
    prompts: Vec<Arc<dyn PromptHandler>>,
    resources: Vec<Arc<dyn ResourceHandler>>,
    tool_fallthrough: Option<ToolFallthrough>,
    prompt_fallthrough: Option<PromptFallthrough>,
    resource_fallthrough: Option<ResourceFallthrough>,
    completion_handler: Option<CompletionHandlerFn>,
    subscribe_handler: Option<SubscriptionHandlerFn>,
    unsubscribe_handler: Option<SubscriptionHandlerFn>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            tools: Vec::new(),
            prompts: Vec::new(),
            resources: Vec::new(),
            tool_fallthrough: None,
            prompt_fallthrough: None,
            resource_fallthrough: None,
            completion_handler: None,
            subscribe_handler: None,
            unsubscribe_handler: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    pub fn stateless(mut self, stateless: bool) -> Self {
        self.config.stateless = stateless;
        self
    }

    pub fn protocol(mut self, protocol: ProtocolVersionConfig) -> Self {
        self.config.protocol = protocol;
        self
    }

    pub fn tool(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.tools.push(Arc::new(handler));
        self
    }

    pub fn prompt(mut self, handler: impl PromptHandler + 'static) -> Self {
        self.prompts.push(Arc::new(handler));
        self
    }

    pub fn resource(mut self, handler: impl ResourceHandler + 'static) -> Self {
        self.resources.push(Arc::new(handler));
        self
    }

    pub fn tool_fallthrough(mut self, handler: ToolFallthrough) -> Self {
        self.tool_fallthrough = Some(handler);
        self
    }

    pub fn prompt_fallthrough(mut self, handler: PromptFallthrough) -> Self {
        self.prompt_fallthrough = Some(handler);
        self
    }

    pub fn resource_fallthrough(mut self, handler: ResourceFallthrough) -> Self {
        self.resource_fallthrough = Some(handler);
        self
    }

    pub fn on_completion(mut self, handler: CompletionHandlerFn) -> Self {
        self.completion_handler = Some(handler);
        self
    }

    pub fn on_resource_subscribe(mut self, handler: SubscriptionHandlerFn) -> Self {
        self.subscribe_handler = Some(handler);
        self
    }

    pub fn on_resource_unsubscribe(mut self, handler: SubscriptionHandlerFn) -> Self {
        self.unsubscribe_handler = Some(handler);
        self
    }

    /// Build the server bound to `transport`. Fails if two registered
    /// tools, prompts, or resource templates share the same key.
    pub fn build(self, transport: Arc<dyn Transport>) -> ServerResult<Arc<McpServer>> {
        let server = McpServer::new(transport, self.config);

        for tool in self.tools {
            server.register_tool(tool)?;
        }
        for prompt in self.prompts {
            server.register_prompt(prompt)?;
        }
        for resource in self.resources {
            server.register_resource(resource)?;
        }
        if let Some(handler) = self.tool_fallthrough {
            server.set_tool_fallthrough(handler);
        }
        if let Some(handler) = self.prompt_fallthrough {
            server.set_prompt_fallthrough(handler);
        }
        if let Some(handler) = self.resource_fallthrough {
            server.set_resource_fallthrough(handler);
        }
        if let Some(handler) = self.completion_handler {
            server.set_completion_handler(handler);
        }
        if let Some(handler) = self.subscribe_handler {
            server.set_subscribe_handler(handler);
        }
        if let Some(handler) = self.unsubscribe_handler {
            server.set_unsubscribe_handler(handler);
        }

        Ok(server)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcpkit_core::Tool;
    use mcpkit_transport::StdioTransport;
    use serde_json::{json, Value};

    use crate::handler::{HandlerContext, ToolError, ToolReturn};

    struct NoopTool;

    #[async_trait]
    impl ToolHandler for NoopTool {
        async fn call(&self, _arguments: Option<Value>, _ctx: HandlerContext) -> Result<ToolReturn, ToolError> {
            Ok(ToolReturn::Empty)
        }

        fn definition(&self) -> Tool {
            Tool {
                name: "noop".to_string(),
                title: None,
                description: None,
                input_schema: json!({"type": "object"}),
                output_schema: None,
                annotations: None,
            }
        }
    }

    #[test]
    fn builder_registers_tools_so_the_capability_turns_on() {
        let transport: Arc<dyn Transport> = Arc::new(StdioTransport::from_process_stdio());
        let server = ServerBuilder::new().name("demo").tool(NoopTool).build(transport).unwrap();
        assert!(server.client_capabilities().is_none());
    }

    #[test]
    fn building_twice_with_the_same_tool_name_fails() {
        let transport: Arc<dyn Transport> = Arc::new(StdioTransport::from_process_stdio());
        let result = ServerBuilder::new().tool(NoopTool).tool(NoopTool).build(transport);
        assert!(result.is_err());
    }
}
