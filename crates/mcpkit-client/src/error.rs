use mcpkit_endpoint::EndpointError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("client is not initialized; call connect() first")]
    NotInitialized,

    #[error("client is already initialized")]
    AlreadyInitialized,

    #[error("server offered unsupported protocol version '{0}'")]
    UnsupportedProtocolVersion(String),

    #[error("initialize did not complete within the configured timeout")]
    Timeout,

    #[error("server does not advertise the '{0}' capability")]
    CapabilityNotSupported(&'static str),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
