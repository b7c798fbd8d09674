use common::AgentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Instance {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl ManagerError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ManagerError::Agent(AgentError::InvalidConfig(_)) | ManagerError::Agent(AgentError::ParseError(_))
        )
    }
}

pub type ManagerResult<T> = std::result::Result<T, ManagerError>;
