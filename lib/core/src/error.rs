use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: &'static str, reason: String },

    #[error("{service} timed out")]
    UpstreamTimeout { service: &'static str },

    #[error("Embedding unavailable for term: {0}")]
    EmbeddingUnavailable(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode {what}: {reason}")]
    DecodeFailure { what: &'static str, reason: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn upstream(service: &'static str, reason: impl ToString) -> Self {
        Error::UpstreamUnavailable {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn decode(what: &'static str, reason: impl ToString) -> Self {
        Error::DecodeFailure {
            what,
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
