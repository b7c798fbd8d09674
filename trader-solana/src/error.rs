use common::AgentError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Jupiter API error: {0}")]
    Jupiter(String),

    #[error("Birdeye API error: {0}")]
    Birdeye(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TraderError>;

impl From<TraderError> for AgentError {
    fn from(err: TraderError) -> Self {
        match err {
            TraderError::MissingConfig(msg) => AgentError::MissingConfig(msg),
            TraderError::InvalidResponse(msg) => AgentError::ParseError(msg),
            TraderError::Json(e) => AgentError::Json(e),
            other => AgentError::ExternalApiError(other.to_string()),
        }
    }
}
