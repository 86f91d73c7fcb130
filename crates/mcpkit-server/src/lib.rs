//! Server-side capability negotiation, dispatch table, and handler
//! invocation contract for mcpkit.

pub mod builder;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod server;

pub use builder::ServerBuilder;
pub use config::{ProtocolVersionConfig, ServerConfig, ServerConfigBuilder};
pub use error::{ServerError, ServerResult};
pub use handler::{
    CompletionHandlerFn, HandlerContext, PromptError, PromptFallthrough, PromptHandler, PromptReturn, ResourceError,
    ResourceFallthrough, ResourceHandler, ResourceReturn, SubscriptionHandlerFn, ToolError, ToolFallthrough, ToolHandler,
    ToolReturn,
};
pub use logging::{LevelFilter, LogLevel};
pub use server::McpServer;
