//! Client configuration: the identity and capabilities offered during
//! `initialize`, and the connection-level knobs around it.

use std::time::Duration;

use mcpkit_core::{ClientCapabilities, Implementation, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_info: Implementation,
    pub capabilities: ClientCapabilities,
    /// Protocol version requested during `initialize`.
    pub protocol_version: String,
    /// Versions this client is willing to speak; the server's negotiated
    /// version must be one of these or `connect()` fails.
    pub acceptable_versions: Vec<String>,
    pub initialize_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_info: Implementation {
                name: "mcpkit-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            },
            capabilities: ClientCapabilities::default(),
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            acceptable_versions: SUPPORTED_PROTOCOL_VERSIONS.iter().map(|s| s.to_string()).collect(),
            initialize_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.client_info.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.client_info.version = version.into();
        self
    }

    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    pub fn initialize_timeout(mut self, timeout: Duration) -> Self {
        self.config.initialize_timeout = timeout;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_requests_the_latest_protocol_version() {
        let config = ClientConfig::default();
        assert_eq!(config.protocol_version, LATEST_PROTOCOL_VERSION);
        assert!(config.acceptable_versions.contains(&LATEST_PROTOCOL_VERSION.to_string()));
    }

    #[test]
    fn builder_overrides_identity() {
        let config = ClientConfig::builder().name("demo").version("9.9.9").build();
        assert_eq!(config.client_info.name, "demo");
        assert_eq!(config.client_info.version, "9.9.9");
    }
}
