use thiserror::Error;

/// Top-level error type for the AVEN assistant.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for AvenError` so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AvenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for AvenError {
    fn from(err: toml::de::Error) -> Self {
        AvenError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AvenError {
    fn from(err: toml::ser::Error) -> Self {
        AvenError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AvenError {
    fn from(err: serde_json::Error) -> Self {
        AvenError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for AVEN operations.
pub type Result<T> = std::result::Result<T, AvenError>;
