//! Message model, primitive types, and capability types shared by every
//! mcpkit crate.

pub mod error;
pub mod jsonrpc;
pub mod protocol;
pub mod types;

pub use error::{Error, Result};
pub use jsonrpc::{
    JsonRpcErrorCode, JsonRpcErrorObject, JsonRpcVersion, Message, Notification, ProgressToken,
    Request, RequestId, RequestMeta, Response,
};
pub use protocol::{
    CallToolParams, Cursor, GetPromptParams, GetPromptResult, InitializeParams, InitializeResult,
    ListParams, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, ReadResourceParams, ReadResourceResult, SubscribeParams,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
pub use types::*;
