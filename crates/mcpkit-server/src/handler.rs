//! The primitive handler contract (§4.7): a concrete `(context, params)
//! -> result` shape per primitive kind, replacing reflection-based
//! handler authoring, plus the return-value coercion rules that turn a
//! handler's domain-shaped answer into the matching protocol result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use mcpkit_core::{
    CallToolResult, ChatMessage, ContentBlock, GetPromptResult, JsonRpcErrorObject, Prompt, PromptMessage, ResourceContents,
    ResourceTemplate, Tool,
};
use mcpkit_endpoint::{CancelToken, EndpointResult, ProgressReporter, Session};
use serde_json::Value;

/// Everything a registered handler needs: access back to the session (to
/// send notifications or issue server-to-client requests), the
/// negotiated client's capabilities, a progress sink bound to the
/// caller's `progressToken`, and a cancellation token.
#[derive(Clone)]
pub struct HandlerContext {
    session: Arc<Session>,
    pub progress: ProgressReporter,
    pub cancel: CancelToken,
}

impl HandlerContext {
    pub(crate) fn new(session: Arc<Session>, progress: ProgressReporter, cancel: CancelToken) -> Self {
        Self {
            session,
            progress,
            cancel,
        }
    }

    pub async fn send_notification(&self, method: impl Into<String>, params: Option<Value>) -> EndpointResult<()> {
        self.session.notify(method, params).await
    }

    pub async fn send_request(&self, method: impl Into<String>, params: Option<Value>) -> EndpointResult<Value> {
        self.session.request(method, params, Some(self.cancel.clone())).await
    }
}

/// A tool handler's non-cancellation failure: caught by the dispatcher
/// and turned into a `CallToolResult { is_error: true }` rather than a
/// JSON-RPC error, per the handler invocation contract.
#[derive(Debug, Clone)]
pub struct ToolError(pub String);

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ToolError {}

/// The shapes a tool handler may return; [`ToolReturn::coerce`]
/// implements the return-shape table from §4.7.
pub enum ToolReturn {
    Empty,
    Text(String),
    Block(ContentBlock),
    Blocks(Vec<ContentBlock>),
    Result(CallToolResult),
    Json(Value),
}

impl ToolReturn {
    pub fn coerce(self, output_schema: Option<&Value>) -> CallToolResult {
        match self {
            ToolReturn::Empty => CallToolResult::default(),
            ToolReturn::Text(text) => CallToolResult::text(text),
            ToolReturn::Block(block) => CallToolResult {
                content: vec![block],
                is_error: false,
                structured_content: None,
            },
            ToolReturn::Blocks(blocks) => CallToolResult {
                content: blocks,
                is_error: false,
                structured_content: None,
            },
            ToolReturn::Result(result) => result,
            ToolReturn::Json(value) => {
                let wraps_object = output_schema
                    .and_then(|schema| schema.get("type"))
                    .and_then(Value::as_str)
                    .map(|ty| ty == "object")
                    .unwrap_or(true);
                let structured = if wraps_object {
                    value.clone()
                } else {
                    serde_json::json!({ "result": value })
                };
                CallToolResult {
                    content: vec![ContentBlock::text(serde_json::to_string(&value).unwrap_or_default())],
                    is_error: false,
                    structured_content: Some(structured),
                }
            }
        }
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Option<Value>, ctx: HandlerContext) -> Result<ToolReturn, ToolError>;

    fn definition(&self) -> Tool;
}

/// A prompt handler's failure always propagates as a JSON-RPC error —
/// unlike tools, there is no `isError` envelope for prompts.
#[derive(Debug, Clone)]
pub struct PromptError(pub String);

impl std::fmt::Display for PromptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PromptError {}

pub enum PromptReturn {
    Text(String),
    Message(PromptMessage),
    Messages(Vec<PromptMessage>),
    Chat(ChatMessage),
    Chats(Vec<ChatMessage>),
}

impl PromptReturn {
    pub fn coerce(self, description: Option<String>) -> GetPromptResult {
        let messages = match self {
            PromptReturn::Text(text) => vec![PromptMessage {
                role: mcpkit_core::Role::User,
                content: ContentBlock::text(text),
            }],
            PromptReturn::Message(message) => vec![message],
            PromptReturn::Messages(messages) => messages,
            PromptReturn::Chat(chat) => vec![chat.into()],
            PromptReturn::Chats(chats) => chats.into_iter().map(PromptMessage::from).collect(),
        };
        GetPromptResult { description, messages }
    }
}

#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(&self, arguments: Option<Value>, ctx: HandlerContext) -> Result<PromptReturn, PromptError>;

    fn definition(&self) -> Prompt;
}

#[derive(Debug, Clone)]
pub struct ResourceError(pub String);

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ResourceError {}

pub enum ResourceReturn {
    Contents(ResourceContents),
    ManyContents(Vec<ResourceContents>),
    Text(String),
    Blob { data: String, mime_type: Option<String> },
}

impl ResourceReturn {
    pub fn coerce(self, uri: &str, default_mime_type: Option<&str>) -> Vec<ResourceContents> {
        match self {
            ResourceReturn::Contents(contents) => vec![contents],
            ResourceReturn::ManyContents(contents) => contents,
            ResourceReturn::Text(text) => vec![ResourceContents::Text {
                uri: uri.to_string(),
                mime_type: default_mime_type.map(str::to_string),
                text,
            }],
            ResourceReturn::Blob { data, mime_type } => vec![ResourceContents::Blob {
                uri: uri.to_string(),
                mime_type: mime_type.or_else(|| default_mime_type.map(str::to_string)),
                blob: data,
            }],
        }
    }
}

#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, uri: &str, variables: HashMap<String, String>, ctx: HandlerContext) -> Result<ResourceReturn, ResourceError>;

    fn definition(&self) -> ResourceTemplate;
}

/// Invoked for `tools/call` when the name isn't in the `ToolCollection`;
/// lets an embedder serve tools that aren't pre-registered descriptors.
pub type ToolFallthrough =
    Arc<dyn Fn(String, Option<Value>, HandlerContext) -> BoxFuture<'static, Result<ToolReturn, ToolError>> + Send + Sync>;

pub type PromptFallthrough =
    Arc<dyn Fn(String, Option<Value>, HandlerContext) -> BoxFuture<'static, Result<PromptReturn, PromptError>> + Send + Sync>;

pub type ResourceFallthrough = Arc<
    dyn Fn(String, HashMap<String, String>, HandlerContext) -> BoxFuture<'static, Result<ResourceReturn, ResourceError>> + Send + Sync,
>;

/// `completion/complete` and the resource subscribe/unsubscribe pair
/// have no registry of their own to dispatch against — they always
/// delegate straight to a user-supplied handler.
pub type CompletionHandlerFn = Arc<dyn Fn(Value, HandlerContext) -> BoxFuture<'static, Result<Value, JsonRpcErrorObject>> + Send + Sync>;

pub type SubscriptionHandlerFn = Arc<dyn Fn(String, HandlerContext) -> BoxFuture<'static, Result<(), JsonRpcErrorObject>> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_return_wraps_non_object_schema_under_result_key() {
        let schema = json!({"type": "string"});
        let result = ToolReturn::Json(json!(42)).coerce(Some(&schema));
        assert_eq!(result.structured_content, Some(json!({"result": 42})));
    }

    #[test]
    fn json_return_passes_through_object_schema() {
        let schema = json!({"type": "object"});
        let result = ToolReturn::Json(json!({"a": 1})).coerce(Some(&schema));
        assert_eq!(result.structured_content, Some(json!({"a": 1})));
    }

    #[test]
    fn chat_message_coerces_into_a_prompt_message() {
        let result = PromptReturn::Chat(ChatMessage {
            role: mcpkit_core::Role::Assistant,
            text: "hi".to_string(),
        })
        .coerce(None);
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, mcpkit_core::Role::Assistant);
    }

    #[test]
    fn resource_text_return_uses_default_mime_type() {
        let contents = ResourceReturn::Text("hello".into()).coerce("resource://x", Some("text/plain"));
        match &contents[0] {
            ResourceContents::Text { mime_type, .. } => assert_eq!(mime_type.as_deref(), Some("text/plain")),
            _ => panic!("expected text contents"),
        }
    }
}
