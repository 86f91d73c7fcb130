use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is disconnected")]
    Disconnected,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message codec error: {0}")]
    Codec(String),

    #[error("operation not supported by this transport: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
