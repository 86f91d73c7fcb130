use mcpkit_endpoint::EndpointError;
use mcpkit_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{0} is not supported while the server runs in stateless mode")]
    NotSupportedStateless(&'static str),

    #[error("unknown {kind} {name:?}")]
    UnknownPrimitive { kind: &'static str, name: String },
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;
