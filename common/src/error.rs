use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to communicate with AI: {0}")]
    AIError(String),

    #[error("Failed to communicate with external API: {0}")]
    ExternalApiError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl From<config::ConfigError> for AgentError {
    fn from(err: config::ConfigError) -> Self {
        AgentError::InvalidConfig(err.to_string())
    }
}
