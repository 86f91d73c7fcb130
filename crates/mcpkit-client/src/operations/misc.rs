//! Health checks, log-level negotiation, and completion — operations
//! with no registry of their own on the server side.

use mcpkit_core::LogLevel;
use serde_json::Value;

use crate::client::Client;
use crate::error::ClientResult;

impl Client {
    pub async fn ping(&self) -> ClientResult<()> {
        let _: Value = self.typed_request("ping", serde_json::json!({})).await?;
        Ok(())
    }

    pub async fn set_log_level(&self, level: LogLevel) -> ClientResult<()> {
        let _: Value = self.typed_request("logging/setLevel", serde_json::json!({ "level": level })).await?;
        Ok(())
    }

    /// `completion/complete` has no fixed request/result shape at the
    /// core level — both are passed through as raw JSON.
    pub async fn complete(&self, params: Value) -> ClientResult<Value> {
        self.require_capability(|c| c.completions.is_some(), "completions")?;
        self.typed_request("completion/complete", params).await
    }
}
