//! Typed primitive collections, and the two-stage resource routing rule:
//! exact URI match first, then first-matching template in insertion
//! order.

use std::sync::Arc;

use mcpkit_core::{Prompt, ResourceTemplate, Tool};
use tokio::sync::broadcast;

use crate::collection::{Collection, Keyed, RegistryResult};
use crate::uri_template::UriTemplate;

impl Keyed for Tool {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for Prompt {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for ResourceTemplate {
    fn key(&self) -> &str {
        &self.uri_template
    }
}

#[derive(Default)]
pub struct ToolCollection(Collection<Tool>);

impl ToolCollection {
    pub fn new() -> Self {
        Self(Collection::new())
    }
    pub fn add(&self, tool: Tool) -> RegistryResult<()> {
        self.0.add(tool)
    }
    pub fn remove(&self, name: &str) -> RegistryResult<()> {
        self.0.remove(name)
    }
    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.0.get(name)
    }
    pub fn snapshot(&self) -> Arc<Vec<Arc<Tool>>> {
        self.0.snapshot()
    }
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.0.subscribe()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Default)]
pub struct PromptCollection(Collection<Prompt>);

impl PromptCollection {
    pub fn new() -> Self {
        Self(Collection::new())
    }
    pub fn add(&self, prompt: Prompt) -> RegistryResult<()> {
        self.0.add(prompt)
    }
    pub fn remove(&self, name: &str) -> RegistryResult<()> {
        self.0.remove(name)
    }
    pub fn get(&self, name: &str) -> Option<Arc<Prompt>> {
        self.0.get(name)
    }
    pub fn snapshot(&self) -> Arc<Vec<Arc<Prompt>>> {
        self.0.snapshot()
    }
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.0.subscribe()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A resolved resource lookup: the matching template descriptor plus any
/// variables extracted from the concrete URI (empty for a direct,
/// non-parameterized resource).
#[derive(Debug, Clone)]
pub struct ResourceMatch {
    pub template: Arc<ResourceTemplate>,
    pub variables: std::collections::HashMap<String, String>,
}

#[derive(Default)]
pub struct ResourceCollection(Collection<ResourceTemplate>);

impl ResourceCollection {
    pub fn new() -> Self {
        Self(Collection::new())
    }

    pub fn add(&self, resource: ResourceTemplate) -> RegistryResult<()> {
        self.0.add(resource)
    }

    pub fn remove(&self, uri_template: &str) -> RegistryResult<()> {
        self.0.remove(uri_template)
    }

    /// All entries whose `uriTemplate` contains no `{variable}` — the
    /// direct resource listing.
    pub fn direct_resources(&self) -> Vec<Arc<ResourceTemplate>> {
        self.0
            .snapshot()
            .iter()
            .filter(|r| !r.is_parameterized())
            .cloned()
            .collect()
    }

    /// All registered entries, parameterized or not.
    pub fn templates(&self) -> Arc<Vec<Arc<ResourceTemplate>>> {
        self.0.snapshot()
    }

    /// Route a concrete URI to the resource/template that should handle
    /// it: an exact `uriTemplate` match first, then the first
    /// insertion-order template whose pattern matches.
    pub fn resolve(&self, uri: &str) -> Option<ResourceMatch> {
        let snapshot = self.0.snapshot();

        if let Some(exact) = snapshot.iter().find(|r| r.uri_template == uri) {
            return Some(ResourceMatch {
                template: exact.clone(),
                variables: Default::default(),
            });
        }

        for resource in snapshot.iter() {
            if !resource.is_parameterized() {
                continue;
            }
            let Ok(parsed) = UriTemplate::parse(&resource.uri_template) else {
                continue;
            };
            if let Some(matched) = parsed.matches(uri) {
                return Some(ResourceMatch {
                    template: resource.clone(),
                    variables: matched.parameters,
                });
            }
        }

        None
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.0.subscribe()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_core::ResourceTemplate;
    use serde_json::json;

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            title: None,
            description: None,
            input_schema: json!({"type": "object"}),
            output_schema: None,
            annotations: None,
        }
    }

    #[test]
    fn tool_collection_rejects_duplicate_names() {
        let tools = ToolCollection::new();
        tools.add(tool("echo")).unwrap();
        assert!(tools.add(tool("echo")).is_err());
    }

    #[test]
    fn resource_resolve_prefers_exact_match_over_templates() {
        let resources = ResourceCollection::new();
        resources
            .add(ResourceTemplate {
                uri_template: "resource://mcp/user/{id}".to_string(),
                name: "user".to_string(),
                title: None,
                description: None,
                mime_type: None,
            })
            .unwrap();
        resources
            .add(ResourceTemplate {
                uri_template: "resource://mcp/user/42".to_string(),
                name: "user-42".to_string(),
                title: None,
                description: None,
                mime_type: None,
            })
            .unwrap();

        let resolved = resources.resolve("resource://mcp/user/42").unwrap();
        assert_eq!(resolved.template.name, "user-42");
        assert!(resolved.variables.is_empty());
    }

    #[test]
    fn resource_resolve_falls_back_to_first_matching_template() {
        let resources = ResourceCollection::new();
        resources
            .add(ResourceTemplate {
                uri_template: "resource://mcp/user/{id}".to_string(),
                name: "user".to_string(),
                title: None,
                description: None,
                mime_type: None,
            })
            .unwrap();

        let resolved = resources.resolve("resource://mcp/user/7").unwrap();
        assert_eq!(resolved.variables.get("id"), Some(&"7".to_string()));
    }

    #[test]
    fn resource_resolve_returns_none_on_miss() {
        let resources = ResourceCollection::new();
        assert!(resources.resolve("resource://mcp/nothing").is_none());
    }

    #[test]
    fn direct_resources_excludes_templates() {
        let resources = ResourceCollection::new();
        resources
            .add(ResourceTemplate {
                uri_template: "resource://mcp/status".to_string(),
                name: "status".to_string(),
                title: None,
                description: None,
                mime_type: None,
            })
            .unwrap();
        resources
            .add(ResourceTemplate {
                uri_template: "resource://mcp/user/{id}".to_string(),
                name: "user".to_string(),
                title: None,
                description: None,
                mime_type: None,
            })
            .unwrap();

        let direct = resources.direct_resources();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].name, "status");
    }
}
