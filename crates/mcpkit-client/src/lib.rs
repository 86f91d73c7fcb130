//! MCP client core: the `initialize` handshake, capability gating, and
//! convenience request helpers over [`mcpkit_endpoint::Session`].

pub mod client;
pub mod config;
pub mod error;
pub mod operations;

pub use client::{Client, InitializeOutcome};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, ClientResult};
