//! Server configuration: a typed builder struct in place of an external
//! config-file format.

use mcpkit_core::{LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};

/// Protocol-version negotiation policy, applied during `initialize`:
/// prefer the client's requested version if supported, otherwise offer
/// the configured preferred version when fallback is allowed, otherwise
/// reject.
#[derive(Debug, Clone)]
pub struct ProtocolVersionConfig {
    pub preferred: String,
    pub supported: Vec<String>,
    pub allow_fallback: bool,
}

impl Default for ProtocolVersionConfig {
    fn default() -> Self {
        Self {
            preferred: LATEST_PROTOCOL_VERSION.to_string(),
            supported: SUPPORTED_PROTOCOL_VERSIONS.iter().map(|s| s.to_string()).collect(),
            allow_fallback: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub title: Option<String>,
    pub instructions: Option<String>,
    pub protocol: ProtocolVersionConfig,
    /// Streamable HTTP stateless mode: no GET channel, no server-to-client
    /// requests, sampling/roots/elicitation helpers fail outright.
    pub stateless: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mcpkit-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            instructions: None,
            protocol: ProtocolVersionConfig::default(),
            stateless: false,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    pub fn stateless(mut self, stateless: bool) -> Self {
        self.config.stateless = stateless;
        self
    }

    pub fn protocol(mut self, protocol: ProtocolVersionConfig) -> Self {
        self.config.protocol = protocol;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

/// Negotiate a protocol version per §4.5: the client's version if
/// supported, else the configured fallback if allowed, else reject.
pub fn negotiate_protocol_version(client_version: &str, config: &ProtocolVersionConfig) -> Result<String, String> {
    if config.supported.iter().any(|v| v == client_version) {
        return Ok(client_version.to_string());
    }
    if config.allow_fallback {
        return Ok(config.preferred.clone());
    }
    Err(format!(
        "protocol version '{client_version}' is not supported (supported: {:?})",
        config.supported
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_clients_version_when_supported() {
        let config = ProtocolVersionConfig::default();
        let version = negotiate_protocol_version("2024-11-05", &config).unwrap();
        assert_eq!(version, "2024-11-05");
    }

    #[test]
    fn falls_back_to_preferred_when_unsupported_and_allowed() {
        let config = ProtocolVersionConfig::default();
        let version = negotiate_protocol_version("1999-01-01", &config).unwrap();
        assert_eq!(version, config.preferred);
    }

    #[test]
    fn rejects_unsupported_version_when_fallback_disabled() {
        let mut config = ProtocolVersionConfig::default();
        config.allow_fallback = false;
        assert!(negotiate_protocol_version("1999-01-01", &config).is_err());
    }
}
