//! Tool listing and invocation, gated on the server's `tools` capability.

use mcpkit_core::{CallToolParams, CallToolResult, ListParams, ListToolsResult, Tool};
use serde_json::Value;

use crate::client::Client;
use crate::error::ClientResult;

impl Client {
    pub async fn list_tools(&self) -> ClientResult<Vec<Tool>> {
        self.require_capability(|c| c.tools.is_some(), "tools")?;
        let result: ListToolsResult = self.typed_request("tools/list", ListParams::default()).await?;
        Ok(result.tools)
    }

    pub async fn call_tool(&self, name: impl Into<String>, arguments: Option<Value>) -> ClientResult<CallToolResult> {
        self.require_capability(|c| c.tools.is_some(), "tools")?;
        self.typed_request(
            "tools/call",
            CallToolParams {
                name: name.into(),
                arguments,
            },
        )
        .await
    }
}
