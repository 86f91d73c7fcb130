use mcpkit_core::JsonRpcErrorObject;
use mcpkit_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("the peer returned an error: {0:?}")]
    Remote(JsonRpcErrorObject),

    #[error("request was cancelled")]
    Cancelled,

    #[error("session is disconnected")]
    Disconnected,

    #[error("initialize must complete before other requests are honored")]
    NotInitialized,

    #[error("duplicate initialize request")]
    AlreadyInitialized,
}

pub type EndpointResult<T> = std::result::Result<T, EndpointError>;
