use thiserror::Error;

/// Errors raised while parsing or constructing protocol messages and types.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed JSON-RPC message: {0}")]
    InvalidMessage(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedProtocolVersion(String),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
