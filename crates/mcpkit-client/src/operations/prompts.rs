//! Prompt listing and retrieval, gated on the server's `prompts` capability.

use mcpkit_core::{GetPromptParams, GetPromptResult, ListParams, ListPromptsResult, Prompt};
use serde_json::Value;

use crate::client::Client;
use crate::error::ClientResult;

impl Client {
    pub async fn list_prompts(&self) -> ClientResult<Vec<Prompt>> {
        self.require_capability(|c| c.prompts.is_some(), "prompts")?;
        let result: ListPromptsResult = self.typed_request("prompts/list", ListParams::default()).await?;
        Ok(result.prompts)
    }

    pub async fn get_prompt(&self, name: impl Into<String>, arguments: Option<Value>) -> ClientResult<GetPromptResult> {
        self.require_capability(|c| c.prompts.is_some(), "prompts")?;
        self.typed_request(
            "prompts/get",
            GetPromptParams {
                name: name.into(),
                arguments,
            },
        )
        .await
    }
}
