//! Server capability computation: a primitive category is advertised
//! only once at least one primitive of that kind is registered, so
//! clients don't see e.g. `tools: {}` from a tool-less server.

use mcpkit_core::{ListChangedCapability, ResourcesCapability, ServerCapabilities};
use mcpkit_registry::{PromptCollection, ResourceCollection, ToolCollection};

pub fn compute(tools: &ToolCollection, prompts: &PromptCollection, resources: &ResourceCollection) -> ServerCapabilities {
    ServerCapabilities {
        tools: if tools.is_empty() {
            None
        } else {
            Some(ListChangedCapability { list_changed: Some(true) })
        },
        prompts: if prompts.is_empty() {
            None
        } else {
            Some(ListChangedCapability { list_changed: Some(true) })
        },
        resources: if resources.is_empty() {
            None
        } else {
            Some(ResourcesCapability {
                list_changed: Some(true),
                subscribe: Some(true),
            })
        },
        completions: None,
        logging: Some(serde_json::json!({})),
        experimental: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_core::Tool;
    use serde_json::json;

    #[test]
    fn empty_collections_advertise_no_capability() {
        let tools = ToolCollection::new();
        let prompts = PromptCollection::new();
        let resources = ResourceCollection::new();
        let caps = compute(&tools, &prompts, &resources);
        assert!(caps.tools.is_none());
        assert!(caps.prompts.is_none());
        assert!(caps.resources.is_none());
    }

    #[test]
    fn a_registered_tool_turns_on_the_tools_capability() {
        let tools = ToolCollection::new();
        tools
            .add(Tool {
                name: "echo".to_string(),
                title: None,
                description: None,
                input_schema: json!({"type": "object"}),
                output_schema: None,
                annotations: None,
            })
            .unwrap();
        let prompts = PromptCollection::new();
        let resources = ResourceCollection::new();
        let caps = compute(&tools, &prompts, &resources);
        assert!(caps.tools.is_some());
    }
}
