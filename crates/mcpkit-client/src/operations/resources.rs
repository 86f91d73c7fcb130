//! Resource listing, reading, and subscription, gated on the server's
//! `resources` capability (and its `subscribe` sub-flag for the
//! subscribe/unsubscribe pair).

use mcpkit_core::{ListParams, ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult, ResourceTemplate, SubscribeParams};

use crate::client::Client;
use crate::error::ClientResult;

impl Client {
    pub async fn list_resources(&self) -> ClientResult<Vec<ResourceTemplate>> {
        self.require_capability(|c| c.resources.is_some(), "resources")?;
        let result: ListResourcesResult = self.typed_request("resources/list", ListParams::default()).await?;
        Ok(result.resources)
    }

    pub async fn list_resource_templates(&self) -> ClientResult<Vec<ResourceTemplate>> {
        self.require_capability(|c| c.resources.is_some(), "resources")?;
        let result: ListResourceTemplatesResult = self.typed_request("resources/templates/list", ListParams::default()).await?;
        Ok(result.resource_templates)
    }

    pub async fn read_resource(&self, uri: impl Into<String>) -> ClientResult<ReadResourceResult> {
        self.require_capability(|c| c.resources.is_some(), "resources")?;
        self.typed_request("resources/read", ReadResourceParams { uri: uri.into() }).await
    }

    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> ClientResult<()> {
        self.require_capability(|c| c.resources.as_ref().is_some_and(|r| r.subscribe == Some(true)), "resources.subscribe")?;
        let _: serde_json::Value = self.typed_request("resources/subscribe", SubscribeParams { uri: uri.into() }).await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> ClientResult<()> {
        self.require_capability(|c| c.resources.as_ref().is_some_and(|r| r.subscribe == Some(true)), "resources.subscribe")?;
        let _: serde_json::Value = self.typed_request("resources/unsubscribe", SubscribeParams { uri: uri.into() }).await?;
        Ok(())
    }
}
